//! Progressive MP4 assembly from mirrored tracks and appended samples.
//!
//! Output layout is ftyp, mdat, moov. Writing moov last means every chunk
//! offset is known exactly when the sample tables are serialized: one chunk
//! per track, payloads contiguous in append order.

use tracing::debug;

use clipmux::{ContainerSink, Error, MediaKind, Result, SampleRecord, TrackDescriptor};

use crate::boxes::{
    write_co64, write_ctts, write_dinf, write_empty_stsd, write_ftyp, write_hdlr,
    write_mdat_header, write_mdhd, write_mvhd, write_nmhd, write_smhd, write_stco, write_stsc,
    write_stss, write_stsz, write_stts, write_tkhd, write_vmhd,
};
use crate::atoms::write_container_box;

struct PendingTrack {
    descriptor: TrackDescriptor,
    samples: Vec<SampleRecord>,
}

impl PendingTrack {
    /// Track duration in its own timescale: the end of the last sample.
    fn duration(&self) -> u64 {
        self.samples
            .iter()
            .map(|s| s.dts + s.duration as u64)
            .max()
            .unwrap_or(0)
    }

    fn payload_len(&self) -> u64 {
        self.samples.iter().map(|s| s.payload.len() as u64).sum()
    }
}

/// An MP4 under construction.
#[derive(Default)]
pub struct Mp4Sink {
    tracks: Vec<PendingTrack>,
}

impl Mp4Sink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerSink for Mp4Sink {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<u32> {
        let id = self.tracks.len() as u32 + 1;
        let mut descriptor = descriptor.clone();
        descriptor.id = id;
        descriptor.duration = 0;
        self.tracks.push(PendingTrack {
            descriptor,
            samples: Vec::new(),
        });
        Ok(id)
    }

    fn append(&mut self, track_id: u32, sample: SampleRecord) -> Result<()> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.descriptor.id == track_id)
            .ok_or_else(|| Error::invalid_container(format!("unknown track {track_id}")))?;
        track.samples.push(sample);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let ftyp = write_ftyp();

        let total_payload: u64 = self.tracks.iter().map(|t| t.payload_len()).sum();
        let mdat_header = write_mdat_header(total_payload);

        // One chunk per track, laid out contiguously in track order.
        let mut chunk_offsets = Vec::with_capacity(self.tracks.len());
        let mut running = (ftyp.len() + mdat_header.len()) as u64;
        for track in &self.tracks {
            chunk_offsets.push(running);
            running += track.payload_len();
        }

        let movie_timescale = self
            .tracks
            .first()
            .map(|t| t.descriptor.timescale)
            .unwrap_or(1000);
        let movie_duration = self
            .tracks
            .iter()
            .map(|t| rescale(t.duration(), t.descriptor.timescale, movie_timescale))
            .max()
            .unwrap_or(0);

        let mvhd = write_mvhd(
            movie_timescale,
            movie_duration,
            self.tracks.len() as u32 + 1,
        );
        let traks: Vec<Vec<u8>> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| write_trak(t, chunk_offsets[i], movie_timescale))
            .collect();

        let mut moov_children: Vec<&[u8]> = vec![&mvhd];
        moov_children.extend(traks.iter().map(|t| t.as_slice()));
        let moov = write_container_box(b"moov", &moov_children);

        let mut out =
            Vec::with_capacity(ftyp.len() + mdat_header.len() + total_payload as usize + moov.len());
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&mdat_header);
        for track in &self.tracks {
            for sample in &track.samples {
                out.extend_from_slice(&sample.payload);
            }
        }
        out.extend_from_slice(&moov);

        debug!(
            tracks = self.tracks.len(),
            bytes = out.len(),
            "serialized mp4"
        );
        Ok(out)
    }
}

fn write_trak(track: &PendingTrack, chunk_offset: u64, movie_timescale: u32) -> Vec<u8> {
    let d = &track.descriptor;
    let duration = track.duration();
    let is_video = d.kind.is_video();

    let tkhd = write_tkhd(
        d.id,
        rescale(duration, d.timescale, movie_timescale),
        is_video,
        d.width,
        d.height,
    );
    let mdhd = write_mdhd(d.timescale, duration);
    let handler_name: &[u8] = match d.kind {
        MediaKind::Video => b"VideoHandler",
        MediaKind::Audio => b"SoundHandler",
        MediaKind::Other(_) => b"Handler",
    };
    let hdlr = write_hdlr(&d.kind.handler(), handler_name);
    let media_header = match d.kind {
        MediaKind::Video => write_vmhd(),
        MediaKind::Audio => write_smhd(),
        MediaKind::Other(_) => write_nmhd(),
    };
    let dinf = write_dinf();
    let stbl = write_stbl(track, chunk_offset);

    let minf = write_container_box(b"minf", &[&media_header, &dinf, &stbl]);
    let mdia = write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);
    write_container_box(b"trak", &[&tkhd, &mdia])
}

fn write_stbl(track: &PendingTrack, chunk_offset: u64) -> Vec<u8> {
    let samples = &track.samples;

    // The source's stsd travels with the descriptor byte for byte.
    let stsd = if track.descriptor.codec_config.is_empty() {
        write_empty_stsd()
    } else {
        track.descriptor.codec_config.to_vec()
    };

    let stts = write_stts(&stts_runs(samples));
    let stsz = write_stsz(&samples.iter().map(|s| s.size() as u32).collect::<Vec<_>>());
    let stsc = write_stsc(samples.len() as u32);
    let chunk_table = if samples.is_empty() {
        write_stco(&[])
    } else if chunk_offset > u32::MAX as u64 {
        write_co64(&[chunk_offset])
    } else {
        write_stco(&[chunk_offset as u32])
    };

    let mut children: Vec<&[u8]> = vec![&stsd, &stts];

    // ctts only when some sample actually reorders.
    let runs = ctts_runs(samples);
    let ctts;
    if runs.iter().any(|&(_, offset)| offset != 0) {
        ctts = write_ctts(&runs);
        children.push(&ctts);
    }

    // stss is omitted when every sample is sync; absence means exactly that.
    let sync: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_sync)
        .map(|(i, _)| i as u32 + 1)
        .collect();
    let stss;
    if sync.len() != samples.len() {
        stss = write_stss(&sync);
        children.push(&stss);
    }

    children.push(&stsz);
    children.push(&stsc);
    children.push(&chunk_table);
    write_container_box(b"stbl", &children)
}

/// Run-length DTS deltas. The last sample has no successor, so its own
/// duration closes the table.
fn stts_runs(samples: &[SampleRecord]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        let delta = match samples.get(i + 1) {
            Some(next) => next.dts.saturating_sub(sample.dts) as u32,
            None => sample.duration,
        };
        match runs.last_mut() {
            Some((count, last)) if *last == delta => *count += 1,
            _ => runs.push((1, delta)),
        }
    }
    runs
}

fn ctts_runs(samples: &[SampleRecord]) -> Vec<(u32, i32)> {
    let mut runs: Vec<(u32, i32)> = Vec::new();
    for sample in samples {
        let offset = sample.composition_offset() as i32;
        match runs.last_mut() {
            Some((count, last)) if *last == offset => *count += 1,
            _ => runs.push((1, offset)),
        }
    }
    runs
}

fn rescale(ticks: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        ticks
    } else {
        (ticks as u128 * to as u128 / from as u128) as u64
    }
}
