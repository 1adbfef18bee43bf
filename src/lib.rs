//! clipmux: cut media containers into fixed-duration clips and stitch them back.
//!
//! This crate provides the two container-agnostic engines and the adapter
//! boundary they drive. Sample payloads are treated as opaque bytes; nothing
//! is ever re-encoded.
//!
//! # Modules
//!
//! - [`cut`] - Segmentation: one source becomes `ceil(duration / d)` clips
//! - [`combine`] - Concatenation: ordered clips become one continuous container
//! - [`adapter`] - The parse/write boundary a concrete format implements
//! - [`model`] - Track, sample, and segment-plan types
//! - [`error`] - Crate error type
//!
//! # Architecture
//!
//! Engines never touch box-level bytes. A [`ContainerFormat`] opens a buffer
//! into movie metadata plus lazy per-track sample streams, and assembles
//! destination containers from mirrored track descriptors and appended
//! samples. Cutting is a single pass: every sample is bucketed by
//! `dts / window` and rebased against its window start. Combining keeps one
//! running offset per input and adds it to every timestamp.
//!
//! The ISOBMFF (MP4) adapter lives in the `clipmux-isobmff` crate.

pub mod adapter;
pub mod combine;
pub mod cut;
pub mod error;
pub mod model;

#[cfg(test)]
pub(crate) mod memfmt;

pub use adapter::{ContainerFormat, ContainerSink, ContainerSource, SampleStream};
pub use combine::combine;
pub use cut::{cut, Clip};
pub use error::{Error, Result};
pub use model::{
    ticks_from_secs, MediaKind, MovieInfo, SampleRecord, SegmentPlan, TrackDescriptor,
};
