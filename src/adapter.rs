//! The container parse/write collaborator boundary.
//!
//! The engines never touch box-level bytes themselves; they drive a
//! [`ContainerFormat`] that knows how to decode a buffer into movie metadata
//! plus per-track sample streams, and how to assemble a fresh container from
//! track descriptors and appended samples.
//!
//! Extraction is pull-style: [`ContainerSource::samples`] returns a lazy,
//! finite iterator per track, and completion is simply iterator exhaustion.
//! Per-track delivery order is the source's on-disk ordering; no ordering is
//! guaranteed across tracks.

use crate::{MovieInfo, Result, SampleRecord, TrackDescriptor};

/// A lazy per-track sample stream. Each yielded record exclusively owns its
/// payload bytes; nothing yielded may alias a buffer the source will reuse.
pub type SampleStream<'a> = Box<dyn Iterator<Item = Result<SampleRecord>> + 'a>;

/// A parsed source container.
pub trait ContainerSource {
    /// Movie-level metadata: global timing and the track list.
    fn movie(&self) -> &MovieInfo;

    /// Stream the samples of one track in on-disk order.
    fn samples(&mut self, track_id: u32) -> Result<SampleStream<'_>>;
}

/// A destination container under construction.
///
/// Finalized exactly once via [`ContainerSink::finish`]. Implementations must
/// copy a descriptor's codec configuration byte-for-byte when adding a track,
/// and must preserve track insertion order in the output.
pub trait ContainerSink {
    /// Mirror a source track into this container, with counters reset.
    /// Returns the destination track ID.
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<u32>;

    /// Append one sample to a destination track.
    fn append(&mut self, track_id: u32, sample: SampleRecord) -> Result<()>;

    /// Serialize the finished container.
    fn finish(self) -> Result<Vec<u8>>;
}

/// Factory for a concrete container format.
///
/// A fresh source or sink is constructed per logical operation and never
/// shared across concurrent calls; all state is operation-scoped.
pub trait ContainerFormat {
    /// Parsed-source type.
    type Source: ContainerSource;
    /// Under-construction destination type.
    type Sink: ContainerSink;

    /// Parse a container from an owned buffer. The buffer is consumed; the
    /// caller hands over an independent copy if it needs the original intact.
    fn open(&self, data: Vec<u8>) -> Result<Self::Source>;

    /// Create an empty destination container.
    fn create(&self) -> Self::Sink;
}
