//! End-to-end cut and combine over real MP4 buffers.

use bytes::Bytes;
use clipmux::{
    combine, cut, ContainerFormat, ContainerSink, ContainerSource, Error, MediaKind,
    SampleRecord, TrackDescriptor,
};
use clipmux_isobmff::Mp4Format;

/// A hand-built stsd box with one avc1 entry, opaque to the adapter.
fn video_stsd() -> Bytes {
    let entry_payload = [0xABu8; 20];
    let mut entry = Vec::new();
    entry.extend_from_slice(&(8 + entry_payload.len() as u32).to_be_bytes());
    entry.extend_from_slice(b"avc1");
    entry.extend_from_slice(&entry_payload);

    let mut content = Vec::new();
    content.extend_from_slice(&[0u8; 4]); // fullbox
    content.extend_from_slice(&1u32.to_be_bytes()); // entry count
    content.extend_from_slice(&entry);

    let mut stsd = Vec::new();
    stsd.extend_from_slice(&(8 + content.len() as u32).to_be_bytes());
    stsd.extend_from_slice(b"stsd");
    stsd.extend_from_slice(&content);
    Bytes::from(stsd)
}

fn video_descriptor() -> TrackDescriptor {
    TrackDescriptor {
        id: 1,
        kind: MediaKind::Video,
        timescale: 1000,
        duration: 0,
        width: 1280,
        height: 720,
        sample_rate: 0,
        channels: 0,
        codec_config: video_stsd(),
    }
}

/// Synthesize a single-track MP4: one sample per second for `seconds`.
fn build_source(seconds: u64) -> Vec<u8> {
    let mut sink = Mp4Format.create();
    let id = sink.add_track(&video_descriptor()).unwrap();
    for i in 0..seconds {
        sink.append(
            id,
            SampleRecord {
                dts: i * 1000,
                cts: (i * 1000) as i64,
                duration: 1000,
                is_sync: i % 4 == 0,
                payload: Bytes::from(vec![i as u8; 16]),
            },
        )
        .unwrap();
    }
    sink.finish().unwrap()
}

fn collect_samples(data: &[u8]) -> Vec<SampleRecord> {
    let mut src = Mp4Format.open(data.to_vec()).unwrap();
    let id = src.movie().tracks[0].id;
    src.samples(id).unwrap().map(|r| r.unwrap()).collect()
}

#[test]
fn test_written_mp4_parses_back() {
    let source = build_source(20);
    let src = Mp4Format.open(source.clone()).unwrap();
    let movie = src.movie();

    assert_eq!(movie.timescale, 1000);
    assert_eq!(movie.duration, 20_000);
    assert_eq!(movie.tracks.len(), 1);
    assert_eq!(movie.tracks[0].kind, MediaKind::Video);
    assert_eq!(movie.tracks[0].width, 1280);
    assert_eq!(movie.tracks[0].height, 720);
    assert_eq!(movie.tracks[0].codec_config, video_stsd());

    let samples = collect_samples(&source);
    assert_eq!(samples.len(), 20);
    assert_eq!(samples[7].dts, 7000);
    assert_eq!(samples[7].payload.as_ref(), &[7u8; 16]);
    assert!(samples[8].is_sync);
    assert!(!samples[9].is_sync);
}

#[test]
fn test_cut_splits_into_windows() {
    let source = build_source(20);
    let clips = cut(&Mp4Format, &source, 8.0).unwrap();

    assert_eq!(clips.len(), 3);
    assert_eq!(clips[0].name, "clip_01");
    assert_eq!(clips[2].name, "clip_03");

    let counts: Vec<usize> = clips.iter().map(|c| collect_samples(&c.data).len()).collect();
    assert_eq!(counts, vec![8, 8, 4]);

    for clip in &clips {
        let src = Mp4Format.open(clip.data.clone()).unwrap();
        // Codec configuration is carried into every clip unchanged.
        assert_eq!(src.movie().tracks[0].codec_config, video_stsd());
        for s in collect_samples(&clip.data) {
            assert!(s.dts < 8000);
        }
    }

    // The last, partial clip reports its real (shorter) duration.
    let last = Mp4Format.open(clips[2].data.clone()).unwrap();
    assert_eq!(last.movie().duration, 4000);
}

#[test]
fn test_combine_restores_timeline() {
    let source = build_source(20);
    let clips = cut(&Mp4Format, &source, 8.0).unwrap();
    let buffers: Vec<Vec<u8>> = clips.into_iter().map(|c| c.data).collect();

    let stitched = combine(&Mp4Format, &buffers).unwrap();
    let src = Mp4Format.open(stitched.clone()).unwrap();
    assert_eq!(src.movie().duration, 20_000);

    let samples = collect_samples(&stitched);
    assert_eq!(samples.len(), 20);
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(s.dts, i as u64 * 1000);
        assert_eq!(s.payload.as_ref(), &[i as u8; 16]);
        assert_eq!(s.is_sync, i % 4 == 0);
    }
}

#[test]
fn test_combine_two_clips_offsets_second() {
    let a = build_source(4);
    let b = build_source(4);
    let out = combine(&Mp4Format, &[a, b]).unwrap();

    let src = Mp4Format.open(out.clone()).unwrap();
    assert_eq!(src.movie().duration, 8000);

    let samples = collect_samples(&out);
    assert_eq!(samples.len(), 8);
    assert_eq!(samples[3].dts, 3000);
    assert_eq!(samples[4].dts, 4000);
    assert_eq!(samples[7].dts, 7000);
}

#[test]
fn test_composition_offsets_survive_roundtrip() {
    let mut sink = Mp4Format.create();
    let id = sink.add_track(&video_descriptor()).unwrap();
    // B-frame style reordering: samples 1 and 2 present late.
    let offsets = [0i64, 2000, 500, 0];
    for (i, &off) in offsets.iter().enumerate() {
        let dts = i as u64 * 1000;
        sink.append(
            id,
            SampleRecord {
                dts,
                cts: dts as i64 + off,
                duration: 1000,
                is_sync: i == 0,
                payload: Bytes::from(vec![0x42; 8]),
            },
        )
        .unwrap();
    }
    let data = sink.finish().unwrap();

    let samples = collect_samples(&data);
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(s.cts - s.dts as i64, offsets[i]);
    }
    assert!(samples[0].is_sync);
    assert!(!samples[1].is_sync);
}

#[test]
fn test_cut_rejects_bad_input() {
    assert!(matches!(
        cut(&Mp4Format, &[0u8; 64], 8.0),
        Err(Error::InvalidContainer(_))
    ));

    let source = build_source(20);
    assert!(matches!(
        cut(&Mp4Format, &source, 0.0),
        Err(Error::InvalidDuration { .. })
    ));
}

#[test]
fn test_combine_rejects_mixed_timescales() {
    let a = build_source(4);

    let mut sink = Mp4Format.create();
    let mut descriptor = video_descriptor();
    descriptor.timescale = 90_000;
    let id = sink.add_track(&descriptor).unwrap();
    sink.append(
        id,
        SampleRecord {
            dts: 0,
            cts: 0,
            duration: 90_000,
            is_sync: true,
            payload: Bytes::from_static(&[1, 2, 3]),
        },
    )
    .unwrap();
    let b = sink.finish().unwrap();

    assert!(matches!(
        combine(&Mp4Format, &[a, b]),
        Err(Error::FormatMismatch(_))
    ));
}
