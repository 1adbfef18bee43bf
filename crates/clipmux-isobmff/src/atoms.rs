//! ISO BMFF box navigation and serialization primitives.
//!
//! Every box follows the standard layout: 4-byte size (big-endian u32),
//! 4-byte type (ASCII), then box-specific content. A size of 1 switches to a
//! 64-bit extended size after the type; a size of 0 means "to end of parent".
//! Parsing is slice-based since whole files arrive as in-memory buffers.

use clipmux::{Error, Result};

/// A box viewed in place inside a parent buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawBox<'a> {
    /// 4-byte box type (e.g. b"moov").
    pub box_type: [u8; 4],
    /// Box content, header excluded.
    pub content: &'a [u8],
    /// The whole box, header included.
    pub raw: &'a [u8],
}

/// Iterator over the boxes laid out back-to-back in `data`.
pub(crate) struct BoxIter<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Walk the boxes of a parent's content (or a whole file).
pub(crate) fn boxes(data: &[u8]) -> BoxIter<'_> {
    BoxIter { data, pos: 0 }
}

impl<'a> Iterator for BoxIter<'a> {
    type Item = Result<RawBox<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 8 > self.data.len() {
            return None;
        }
        let start = self.pos;
        let size32 = u32::from_be_bytes([
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]);
        let box_type = [
            self.data[start + 4],
            self.data[start + 5],
            self.data[start + 6],
            self.data[start + 7],
        ];

        let (size, header_size) = if size32 == 1 {
            // Extended 64-bit size follows the type.
            if start + 16 > self.data.len() {
                self.pos = self.data.len();
                return Some(Err(truncated(box_type)));
            }
            let size = match be_u64(self.data, start + 8) {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };
            (size, 16u64)
        } else if size32 == 0 {
            // Box extends to the end of the parent.
            ((self.data.len() - start) as u64, 8u64)
        } else {
            (size32 as u64, 8u64)
        };

        if size < header_size || start as u64 + size > self.data.len() as u64 {
            self.pos = self.data.len();
            return Some(Err(truncated(box_type)));
        }

        let end = start + size as usize;
        self.pos = end;
        Some(Ok(RawBox {
            box_type,
            content: &self.data[start + header_size as usize..end],
            raw: &self.data[start..end],
        }))
    }
}

/// Find the first child box of the given type inside a parent's content.
pub(crate) fn find_child<'a>(data: &'a [u8], target: &[u8; 4]) -> Result<Option<RawBox<'a>>> {
    for b in boxes(data) {
        let b = b?;
        if &b.box_type == target {
            return Ok(Some(b));
        }
    }
    Ok(None)
}

fn truncated(box_type: [u8; 4]) -> Error {
    Error::invalid_container(format!(
        "truncated '{}' box",
        String::from_utf8_lossy(&box_type)
    ))
}

fn short_read(at: usize) -> Error {
    Error::invalid_container(format!("box content ends before offset {at}"))
}

/// Read a big-endian u16 at `at`.
pub(crate) fn be_u16(data: &[u8], at: usize) -> Result<u16> {
    match data.get(at..at + 2) {
        Some(s) => Ok(u16::from_be_bytes([s[0], s[1]])),
        None => Err(short_read(at)),
    }
}

/// Read a big-endian u32 at `at`.
pub(crate) fn be_u32(data: &[u8], at: usize) -> Result<u32> {
    match data.get(at..at + 4) {
        Some(s) => Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]])),
        None => Err(short_read(at)),
    }
}

/// Read a big-endian i32 at `at`.
pub(crate) fn be_i32(data: &[u8], at: usize) -> Result<i32> {
    match data.get(at..at + 4) {
        Some(s) => Ok(i32::from_be_bytes([s[0], s[1], s[2], s[3]])),
        None => Err(short_read(at)),
    }
}

/// Read a big-endian u64 at `at`.
pub(crate) fn be_u64(data: &[u8], at: usize) -> Result<u64> {
    match data.get(at..at + 8) {
        Some(s) => Ok(u64::from_be_bytes([
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
        ])),
        None => Err(short_read(at)),
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Write a complete box: size (u32 BE) + type (4 ASCII bytes) + content.
pub(crate) fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

/// Write a container box (size + type + children concatenated).
pub(crate) fn write_container_box(box_type: &[u8; 4], children: &[&[u8]]) -> Vec<u8> {
    let children_len: usize = children.iter().map(|c| c.len()).sum();
    let size = (8 + children_len) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// Full box header: version byte plus 24-bit flags.
pub(crate) fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    let val = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
    val.to_be_bytes()
}
