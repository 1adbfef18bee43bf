//! Concatenation engine: stitch ordered clips into one continuous container.
//!
//! Sources are ingested sequentially; every sample is re-timed by the running
//! offset of the clips before it, then appended to a destination mirroring
//! the first source's track layout. Unlike [`cut`](crate::cut), this is not
//! single-pass over one file: one source's samples are held in memory at a
//! time. That is deliberate; the expected input is a short list of
//! already-segmented clips, not an unbounded stream.

use tracing::debug;

use crate::adapter::{ContainerFormat, ContainerSink, ContainerSource};
use crate::{Error, MovieInfo, Result};

/// Concatenate `sources` in order into a single container.
///
/// A single source is a pass-through: its bytes are returned unchanged with
/// no parsing performed. All sources must share the first source's movie
/// timescale and track layout (count, per-index kind and timescale); any
/// disagreement fails with [`Error::FormatMismatch`] rather than silently
/// producing mistimed output. Any parse failure aborts the whole operation
/// with no partial output.
pub fn combine<F: ContainerFormat>(format: &F, sources: &[Vec<u8>]) -> Result<Vec<u8>> {
    let Some(first) = sources.first() else {
        return Err(Error::EmptyInput);
    };
    if sources.len() == 1 {
        return Ok(first.clone());
    }
    debug!(sources = sources.len(), "combining clips");

    let mut sink = format.create();
    let mut dest_ids: Vec<u32> = Vec::new();
    let mut layout: Option<MovieInfo> = None;
    // Running offset in the first source's movie timescale.
    let mut accumulated: u64 = 0;

    for (index, data) in sources.iter().enumerate() {
        let mut src = format.open(data.clone())?;
        let movie = src.movie().clone();
        if movie.tracks.is_empty() {
            return Err(Error::invalid_container(format!(
                "source {index} has no tracks"
            )));
        }

        match &layout {
            None => {
                for track in &movie.tracks {
                    dest_ids.push(sink.add_track(track)?);
                }
                layout = Some(movie.clone());
            }
            Some(first) => validate_layout(first, &movie, index)?,
        }

        for (track_idx, track) in movie.tracks.iter().enumerate() {
            // The running offset is in movie ticks; samples are in the
            // track's timescale.
            let offset = rescale(accumulated, movie.timescale, track.timescale);
            let stream = src.samples(track.id)?;
            for record in stream {
                let mut record = record?;
                record.dts += offset;
                record.cts += offset as i64;
                sink.append(dest_ids[track_idx], record)?;
            }
        }

        accumulated += movie.duration;
    }

    let out = sink.finish()?;
    debug!(bytes = out.len(), "combine complete");
    Ok(out)
}

fn validate_layout(first: &MovieInfo, movie: &MovieInfo, index: usize) -> Result<()> {
    if movie.timescale != first.timescale {
        return Err(Error::format_mismatch(format!(
            "source {index} timescale {} != {}",
            movie.timescale, first.timescale
        )));
    }
    if movie.tracks.len() != first.tracks.len() {
        return Err(Error::format_mismatch(format!(
            "source {index} has {} tracks, expected {}",
            movie.tracks.len(),
            first.tracks.len()
        )));
    }
    for (a, b) in first.tracks.iter().zip(&movie.tracks) {
        if a.kind != b.kind {
            return Err(Error::format_mismatch(format!(
                "source {index} track {} kind differs from first source",
                b.id
            )));
        }
        if a.timescale != b.timescale {
            return Err(Error::format_mismatch(format!(
                "source {index} track {} timescale {} != {}",
                b.id, b.timescale, a.timescale
            )));
        }
    }
    Ok(())
}

/// Rescale `ticks` from one timescale to another with 128-bit intermediate
/// math. Exact when the timescales agree.
fn rescale(ticks: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        ticks
    } else {
        (ticks as u128 * to as u128 / from as u128) as u64
    }
}
