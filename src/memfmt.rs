//! In-memory container format used by the engine unit tests.
//!
//! A deliberately simple length-prefixed encoding with the same structural
//! guarantees the engines rely on from a real adapter: movie metadata plus
//! per-track sample lists, verbatim codec config, per-track on-disk sample
//! order, and owned payload copies.

use bytes::Bytes;

use crate::adapter::{ContainerFormat, ContainerSink, ContainerSource, SampleStream};
use crate::{Error, MediaKind, MovieInfo, Result, SampleRecord, TrackDescriptor};

const MAGIC: &[u8; 4] = b"MEMC";

/// In-memory test container format.
pub(crate) struct MemFormat;

impl ContainerFormat for MemFormat {
    type Source = MemSource;
    type Sink = MemSink;

    fn open(&self, data: Vec<u8>) -> Result<Self::Source> {
        MemSource::parse(&data)
    }

    fn create(&self) -> Self::Sink {
        MemSink::default()
    }
}

pub(crate) struct MemSource {
    movie: MovieInfo,
    samples: Vec<Vec<SampleRecord>>,
}

impl ContainerSource for MemSource {
    fn movie(&self) -> &MovieInfo {
        &self.movie
    }

    fn samples(&mut self, track_id: u32) -> Result<SampleStream<'_>> {
        let idx = self
            .movie
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or_else(|| Error::invalid_container(format!("unknown track {track_id}")))?;
        Ok(Box::new(self.samples[idx].iter().cloned().map(Ok)))
    }
}

struct SinkTrack {
    descriptor: TrackDescriptor,
    samples: Vec<SampleRecord>,
}

#[derive(Default)]
pub(crate) struct MemSink {
    tracks: Vec<SinkTrack>,
}

impl ContainerSink for MemSink {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<u32> {
        let id = self.tracks.len() as u32 + 1;
        let mut descriptor = descriptor.clone();
        descriptor.id = id;
        descriptor.duration = 0;
        self.tracks.push(SinkTrack {
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
        let end = sample.dts + sample.duration as u64;
        track.descriptor.duration = track.descriptor.duration.max(end);
        track.samples.push(sample);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let movie_timescale = self
            .tracks
            .first()
            .map(|t| t.descriptor.timescale)
            .unwrap_or(1000);
        let duration = self
            .tracks
            .iter()
            .map(|t| rescale(t.descriptor.duration, t.descriptor.timescale, movie_timescale))
            .max()
            .unwrap_or(0);

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&movie_timescale.to_be_bytes());
        out.extend_from_slice(&duration.to_be_bytes());
        out.extend_from_slice(&(self.tracks.len() as u32).to_be_bytes());
        for track in &self.tracks {
            let d = &track.descriptor;
            out.extend_from_slice(&d.id.to_be_bytes());
            out.extend_from_slice(&d.kind.handler());
            out.extend_from_slice(&d.timescale.to_be_bytes());
            out.extend_from_slice(&d.duration.to_be_bytes());
            out.extend_from_slice(&d.width.to_be_bytes());
            out.extend_from_slice(&d.height.to_be_bytes());
            out.extend_from_slice(&d.sample_rate.to_be_bytes());
            out.extend_from_slice(&d.channels.to_be_bytes());
            out.extend_from_slice(&(d.codec_config.len() as u32).to_be_bytes());
            out.extend_from_slice(&d.codec_config);
            out.extend_from_slice(&(track.samples.len() as u32).to_be_bytes());
            for s in &track.samples {
                out.extend_from_slice(&s.dts.to_be_bytes());
                out.extend_from_slice(&s.cts.to_be_bytes());
                out.extend_from_slice(&s.duration.to_be_bytes());
                out.push(s.is_sync as u8);
                out.extend_from_slice(&(s.payload.len() as u32).to_be_bytes());
                out.extend_from_slice(&s.payload);
            }
        }
        Ok(out)
    }
}

fn rescale(ticks: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        ticks
    } else {
        (ticks as u128 * to as u128 / from as u128) as u64
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::invalid_container("truncated test container"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }
}

impl MemSource {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut c = Cursor { data, pos: 0 };
        if c.take(4)? != MAGIC {
            return Err(Error::invalid_container("bad magic"));
        }
        let timescale = c.u32()?;
        let duration = c.u64()?;
        let track_count = c.u32()? as usize;

        let mut tracks = Vec::with_capacity(track_count);
        let mut samples = Vec::with_capacity(track_count);
        for _ in 0..track_count {
            let id = c.u32()?;
            let handler: [u8; 4] = c.take(4)?.try_into().unwrap();
            let track_timescale = c.u32()?;
            let track_duration = c.u64()?;
            let width = c.u32()?;
            let height = c.u32()?;
            let sample_rate = c.u32()?;
            let channels = c.u16()?;
            let config_len = c.u32()? as usize;
            let codec_config = Bytes::copy_from_slice(c.take(config_len)?);
            tracks.push(TrackDescriptor {
                id,
                kind: MediaKind::from_handler(handler),
                timescale: track_timescale,
                duration: track_duration,
                width,
                height,
                sample_rate,
                channels,
                codec_config,
            });

            let sample_count = c.u32()? as usize;
            let mut track_samples = Vec::with_capacity(sample_count);
            for _ in 0..sample_count {
                let dts = c.u64()?;
                let cts = c.i64()?;
                let sample_duration = c.u32()?;
                let is_sync = c.u8()? != 0;
                let payload_len = c.u32()? as usize;
                let payload = Bytes::copy_from_slice(c.take(payload_len)?);
                track_samples.push(SampleRecord {
                    dts,
                    cts,
                    duration: sample_duration,
                    is_sync,
                    payload,
                });
            }
            samples.push(track_samples);
        }

        Ok(Self {
            movie: MovieInfo {
                timescale,
                duration,
                tracks,
            },
            samples,
        })
    }
}

/// Build a test buffer from `(descriptor, samples)` pairs.
pub(crate) fn build(tracks: Vec<(TrackDescriptor, Vec<SampleRecord>)>) -> Vec<u8> {
    let mut sink = MemSink::default();
    for (descriptor, samples) in tracks {
        let id = sink.add_track(&descriptor).unwrap();
        for s in samples {
            sink.append(id, s).unwrap();
        }
    }
    sink.finish().unwrap()
}

/// A video track descriptor with the given timescale.
pub(crate) fn video_track(id: u32, timescale: u32) -> TrackDescriptor {
    TrackDescriptor {
        id,
        kind: MediaKind::Video,
        timescale,
        duration: 0,
        width: 1920,
        height: 1080,
        sample_rate: 0,
        channels: 0,
        codec_config: Bytes::from_static(&[0x01, 0x64, 0x00, 0x1F]),
    }
}

/// Evenly spaced samples: `count` samples of `duration` ticks starting at 0.
pub(crate) fn uniform_samples(count: u64, duration: u32) -> Vec<SampleRecord> {
    (0..count)
        .map(|i| {
            let dts = i * duration as u64;
            SampleRecord {
                dts,
                cts: dts as i64,
                duration,
                is_sync: i % 10 == 0,
                payload: Bytes::from(vec![i as u8; 16]),
            }
        })
        .collect()
}
