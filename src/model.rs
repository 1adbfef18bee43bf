//! Track, sample, and segment-plan types shared by both engines.
//!
//! Timing values are integers in container tick units: DTS/CTS and durations
//! are 64-bit, timescales are the container-native `u32`. Seconds only appear
//! once, when a requested segment duration is converted to ticks; every
//! per-sample computation stays in the integer domain.

use bytes::Bytes;

use crate::{Error, Result};

/// Media type of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum MediaKind {
    /// Video track (`vide` handler).
    Video,
    /// Audio track (`soun` handler).
    Audio,
    /// Any other track type, carrying the raw handler fourcc.
    Other([u8; 4]),
}

impl MediaKind {
    /// Map a handler fourcc to a media kind.
    pub fn from_handler(handler: [u8; 4]) -> Self {
        match &handler {
            b"vide" => MediaKind::Video,
            b"soun" => MediaKind::Audio,
            _ => MediaKind::Other(handler),
        }
    }

    /// The handler fourcc for this kind.
    pub fn handler(&self) -> [u8; 4] {
        match self {
            MediaKind::Video => *b"vide",
            MediaKind::Audio => *b"soun",
            MediaKind::Other(fourcc) => *fourcc,
        }
    }

    /// Whether this is a video track.
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }

    /// Whether this is an audio track.
    pub fn is_audio(&self) -> bool {
        matches!(self, MediaKind::Audio)
    }
}

/// One elementary stream inside a container.
///
/// Created when a container is parsed and immutable thereafter. The codec
/// configuration is an opaque, uninterpreted blob (for the ISOBMFF adapter,
/// the track's complete `stsd` box) and must be copied byte-for-byte into any
/// destination track mirrored from this one.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackDescriptor {
    /// Track ID, stable within its container.
    pub id: u32,
    /// Media type.
    pub kind: MediaKind,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Track duration in media timescale units.
    pub duration: u64,
    /// Video width in pixels (0 for non-video tracks).
    pub width: u32,
    /// Video height in pixels (0 for non-video tracks).
    pub height: u32,
    /// Audio sample rate in Hz (0 for non-audio tracks).
    pub sample_rate: u32,
    /// Audio channel count (0 for non-audio tracks).
    pub channels: u16,
    /// Opaque codec configuration, copied verbatim between containers.
    pub codec_config: Bytes,
}

impl TrackDescriptor {
    /// Track duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }
}

/// One access unit of a track plus its timing metadata.
///
/// The payload is an exclusively owned copy: adapters that reuse an internal
/// decode buffer must copy it before constructing a record, never hand out an
/// alias that a later callback will overwrite.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleRecord {
    /// Decoding timestamp in the track's timescale.
    pub dts: u64,
    /// Composition (presentation) timestamp in the track's timescale.
    /// Signed because reordered frames can momentarily precede their DTS.
    pub cts: i64,
    /// Sample duration in the track's timescale.
    pub duration: u32,
    /// Whether this sample is a sync sample (keyframe).
    pub is_sync: bool,
    /// Raw sample payload.
    pub payload: Bytes,
}

impl SampleRecord {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Composition offset relative to DTS (`cts - dts`).
    pub fn composition_offset(&self) -> i64 {
        self.cts - self.dts as i64
    }
}

/// Parsed movie-level metadata: global timing plus the track list, in source
/// order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MovieInfo {
    /// Movie timescale (ticks per second).
    pub timescale: u32,
    /// Total duration in movie timescale units.
    pub duration: u64,
    /// Tracks in container order.
    pub tracks: Vec<TrackDescriptor>,
}

impl MovieInfo {
    /// Total duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }
}

/// Convert a duration in seconds to ticks at the given timescale, rounding to
/// the nearest tick. Returns 0 for non-positive input.
pub fn ticks_from_secs(seconds: f64, timescale: u32) -> u64 {
    if seconds <= 0.0 || timescale == 0 {
        0
    } else {
        (seconds * timescale as f64).round() as u64
    }
}

/// A derived plan for cutting a source into fixed-duration segments.
///
/// Segment `i` covers the half-open window `[i * w, (i + 1) * w)` where `w`
/// is the window length in movie ticks; the last window is allowed to be
/// shorter than `w`.
#[derive(Debug, Clone, Copy)]
pub struct SegmentPlan {
    /// Window length in movie timescale units.
    pub window_ticks: u64,
    /// Number of segments (`ceil(duration / window)`).
    pub count: usize,
}

impl SegmentPlan {
    /// Plan segmentation of `duration` movie ticks into windows of
    /// `segment_seconds` each.
    pub fn new(duration: u64, timescale: u32, segment_seconds: f64) -> Result<Self> {
        if segment_seconds <= 0.0 {
            return Err(Error::invalid_duration(format!(
                "segment duration must be positive, got {segment_seconds}"
            )));
        }
        if timescale == 0 || duration == 0 {
            return Err(Error::invalid_duration(
                "source reports a non-positive duration",
            ));
        }
        let window_ticks = ticks_from_secs(segment_seconds, timescale);
        if window_ticks == 0 {
            return Err(Error::invalid_duration(format!(
                "segment duration {segment_seconds}s is below one tick at timescale {timescale}"
            )));
        }
        let count = duration.div_ceil(window_ticks) as usize;
        Ok(Self {
            window_ticks,
            count,
        })
    }

    /// The window `[start, end)` of segment `index`, in movie ticks.
    pub fn window(&self, index: usize) -> (u64, u64) {
        let start = index as u64 * self.window_ticks;
        (start, start + self.window_ticks)
    }
}
