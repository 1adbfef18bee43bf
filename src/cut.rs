//! Segmentation engine: cut one container into fixed-duration clips.
//!
//! A single pass over the source buckets every sample of every track into the
//! clip whose time window contains its DTS, rewriting timestamps relative to
//! that clip's start. Payloads are never re-encoded.

use tracing::{debug, warn};

use crate::adapter::{ContainerFormat, ContainerSink, ContainerSource};
use crate::model::{ticks_from_secs, SegmentPlan};
use crate::{Error, Result};

/// One finished clip: output container bytes plus its deterministic name.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Clip name: `clip_01`, `clip_02`, ... (1-indexed, zero-padded).
    pub name: String,
    /// Finished container bytes.
    pub data: Vec<u8>,
}

/// Cut `source` into clips of `segment_seconds` each.
///
/// Segment `i` covers the half-open window `[i*d, (i+1)*d)` of source time;
/// the final clip may be shorter. Clips that receive no samples are skipped.
/// The caller's buffer is left untouched; the format is handed an independent
/// copy because some parsers consume the buffer they are given.
///
/// Samples whose DTS falls at or beyond the declared movie duration (a
/// rounding artifact, or a malformed timestamp) are clamped into the last
/// clip rather than dropped; each clamp is logged.
pub fn cut<F: ContainerFormat>(
    format: &F,
    source: &[u8],
    segment_seconds: f64,
) -> Result<Vec<Clip>> {
    let mut src = format.open(source.to_vec())?;
    let movie = src.movie().clone();

    if movie.tracks.is_empty() {
        return Err(Error::invalid_container("source has no tracks"));
    }
    let plan = SegmentPlan::new(movie.duration, movie.timescale, segment_seconds)?;
    debug!(
        duration_secs = movie.duration_secs(),
        segments = plan.count,
        tracks = movie.tracks.len(),
        "cutting source"
    );

    // Per-track bucket windows in that track's own timescale. The plan's
    // window is in movie ticks and is only used for the segment count.
    let mut track_windows = Vec::with_capacity(movie.tracks.len());
    for track in &movie.tracks {
        let window = ticks_from_secs(segment_seconds, track.timescale);
        if window == 0 {
            return Err(Error::invalid_duration(format!(
                "segment duration {segment_seconds}s is below one tick for track {}",
                track.id
            )));
        }
        track_windows.push(window);
    }

    // One builder per segment, each mirroring every source track in order.
    let mut sinks: Vec<F::Sink> = (0..plan.count).map(|_| format.create()).collect();
    let mut appended = vec![0u64; plan.count];
    // dest_ids[segment][track_index]
    let mut dest_ids = Vec::with_capacity(plan.count);
    for sink in &mut sinks {
        let mut ids = Vec::with_capacity(movie.tracks.len());
        for track in &movie.tracks {
            ids.push(sink.add_track(track)?);
        }
        dest_ids.push(ids);
    }

    for (track_idx, track) in movie.tracks.iter().enumerate() {
        let window = track_windows[track_idx];
        let stream = src.samples(track.id)?;
        for record in stream {
            let mut record = record?;
            let mut segment = (record.dts / window) as usize;
            if segment >= plan.count {
                warn!(
                    track = track.id,
                    dts = record.dts,
                    segment,
                    segments = plan.count,
                    "sample DTS beyond declared duration, clamping into last clip"
                );
                segment = plan.count - 1;
            }
            let offset = segment as u64 * window;
            record.dts -= offset;
            record.cts -= offset as i64;
            sinks[segment].append(dest_ids[segment][track_idx], record)?;
            appended[segment] += 1;
        }
    }

    // Finalize non-empty builders in ascending segment order; empty builders
    // are discarded without ever being finalized.
    let width = plan.count.to_string().len().max(2);
    let mut clips = Vec::new();
    for (segment, sink) in sinks.into_iter().enumerate() {
        if appended[segment] == 0 {
            continue;
        }
        let data = sink.finish()?;
        let name = format!("clip_{:0width$}", clips.len() + 1, width = width);
        clips.push(Clip { name, data });
    }

    if clips.is_empty() {
        return Err(Error::extraction_failure(
            "no segment received any samples",
        ));
    }
    debug!(clips = clips.len(), "cut complete");
    Ok(clips)
}
