//! clipmux-isobmff: the ISOBMFF (MP4) adapter for the clipmux engines.
//!
//! Parses plain progressive MP4 (moov sample tables, not fragmented) into
//! movie metadata plus per-track sample streams, and assembles clips back
//! into ftyp + mdat + moov files. Codec configuration (the stsd box) is
//! carried through byte for byte; payloads are never touched.
//!
//! # Modules
//!
//! - [`Mp4Source`] - parsed file: mvhd/trak headers and resolved sample tables
//! - [`Mp4Sink`] - clip under construction, serialized on finish
//!
//! ```no_run
//! use clipmux::{cut, combine};
//! use clipmux_isobmff::Mp4Format;
//!
//! # fn main() -> clipmux::Result<()> {
//! # let source: Vec<u8> = Vec::new();
//! let clips = cut(&Mp4Format, &source, 8.0)?;
//! let stitched = combine(&Mp4Format, &clips.iter().map(|c| c.data.clone()).collect::<Vec<_>>())?;
//! # Ok(())
//! # }
//! ```

mod atoms;
mod boxes;
mod reader;
mod sample_table;
mod writer;

pub use reader::Mp4Source;
pub use writer::Mp4Sink;

use clipmux::{ContainerFormat, Result};

/// The MP4 container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4Format;

impl ContainerFormat for Mp4Format {
    type Source = Mp4Source;
    type Sink = Mp4Sink;

    fn open(&self, data: Vec<u8>) -> Result<Mp4Source> {
        Mp4Source::parse(data)
    }

    fn create(&self) -> Mp4Sink {
        Mp4Sink::new()
    }
}
