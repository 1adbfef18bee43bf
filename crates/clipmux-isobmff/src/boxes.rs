//! Serialization of the boxes a finished clip needs.
//!
//! Headers are written as version 1 (64-bit times) throughout. Sample tables
//! are populated from real sample lists, not left empty: the output is plain
//! progressive MP4, not fragmented.

use crate::atoms::{fullbox_header, write_box};

/// `ftyp` with major brand "isom".
pub(crate) fn write_ftyp() -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + 4 + 3 * 4);
    content.extend_from_slice(b"isom");
    content.extend_from_slice(&0x200u32.to_be_bytes());
    content.extend_from_slice(b"isom");
    content.extend_from_slice(b"iso6");
    content.extend_from_slice(b"mp41");
    write_box(b"ftyp", &content)
}

pub(crate) fn write_mvhd(timescale: u32, duration: u64, next_track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(112);
    // version 1, flags 0
    content.extend_from_slice(&fullbox_header(1, 0));
    // creation_time, modification_time
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // rate = 1.0 (fixed 16.16)
    content.extend_from_slice(&0x00010000u32.to_be_bytes());
    // volume = 1.0 (fixed 8.8)
    content.extend_from_slice(&0x0100u16.to_be_bytes());
    // reserved
    content.extend_from_slice(&[0u8; 10]);
    content.extend_from_slice(&identity_matrix());
    // pre_defined
    content.extend_from_slice(&[0u8; 24]);
    content.extend_from_slice(&next_track_id.to_be_bytes());
    write_box(b"mvhd", &content)
}

pub(crate) fn write_tkhd(
    track_id: u32,
    duration: u64,
    is_video: bool,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut content = Vec::with_capacity(96);
    // version 1, flags = 7 (enabled | in_movie | in_preview)
    content.extend_from_slice(&fullbox_header(1, 7));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&track_id.to_be_bytes());
    // reserved
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // reserved
    content.extend_from_slice(&[0u8; 8]);
    // layer, alternate_group
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    let volume: u16 = if is_video { 0 } else { 0x0100 };
    content.extend_from_slice(&volume.to_be_bytes());
    // reserved
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&identity_matrix());
    // width and height (16.16 fixed point)
    if is_video {
        content.extend_from_slice(&(width << 16).to_be_bytes());
        content.extend_from_slice(&(height << 16).to_be_bytes());
    } else {
        content.extend_from_slice(&0u32.to_be_bytes());
        content.extend_from_slice(&0u32.to_be_bytes());
    }
    write_box(b"tkhd", &content)
}

pub(crate) fn write_mdhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(36);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // language: undetermined (0x55C4)
    content.extend_from_slice(&0x55C4u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    write_box(b"mdhd", &content)
}

pub(crate) fn write_hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(24 + name.len() + 1);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(handler_type);
    // reserved
    content.extend_from_slice(&[0u8; 12]);
    // name (null-terminated)
    content.extend_from_slice(name);
    content.push(0);
    write_box(b"hdlr", &content)
}

pub(crate) fn write_dinf() -> Vec<u8> {
    let url_box = {
        let mut c = Vec::with_capacity(4);
        c.extend_from_slice(&fullbox_header(0, 1)); // flags = 1 => self-contained
        write_box(b"url ", &c)
    };
    let dref_box = {
        let mut c = Vec::with_capacity(8 + url_box.len());
        c.extend_from_slice(&fullbox_header(0, 0));
        c.extend_from_slice(&1u32.to_be_bytes());
        c.extend_from_slice(&url_box);
        write_box(b"dref", &c)
    };
    write_box(b"dinf", &dref_box)
}

pub(crate) fn write_vmhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 1));
    // graphicsmode + opcolor
    content.extend_from_slice(&[0u8; 8]);
    write_box(b"vmhd", &content)
}

pub(crate) fn write_smhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    // balance + reserved
    content.extend_from_slice(&[0u8; 4]);
    write_box(b"smhd", &content)
}

/// Null media header for tracks that are neither video nor audio.
pub(crate) fn write_nmhd() -> Vec<u8> {
    write_box(b"nmhd", &fullbox_header(0, 0))
}

/// Placeholder stsd with zero entries, for tracks whose source carried no
/// codec configuration.
pub(crate) fn write_empty_stsd() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    write_box(b"stsd", &content)
}

/// stts from run-length (count, delta) entries.
pub(crate) fn write_stts(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + entries.len() * 8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for &(count, delta) in entries {
        content.extend_from_slice(&count.to_be_bytes());
        content.extend_from_slice(&delta.to_be_bytes());
    }
    write_box(b"stts", &content)
}

/// ctts from run-length (count, offset) entries. Version 1, signed offsets.
pub(crate) fn write_ctts(entries: &[(u32, i32)]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + entries.len() * 8);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for &(count, offset) in entries {
        content.extend_from_slice(&count.to_be_bytes());
        content.extend_from_slice(&offset.to_be_bytes());
    }
    write_box(b"ctts", &content)
}

/// stss from 1-based sync sample numbers.
pub(crate) fn write_stss(sync_samples: &[u32]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + sync_samples.len() * 4);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(sync_samples.len() as u32).to_be_bytes());
    for &sample in sync_samples {
        content.extend_from_slice(&sample.to_be_bytes());
    }
    write_box(b"stss", &content)
}

/// stsz: uniform size if every sample agrees, else one size per sample.
pub(crate) fn write_stsz(sizes: &[u32]) -> Vec<u8> {
    let uniform = match sizes.first() {
        Some(&first) if sizes.iter().all(|&s| s == first) => first,
        _ => 0,
    };
    let mut content = Vec::with_capacity(12 + sizes.len() * 4);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&uniform.to_be_bytes());
    content.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    if uniform == 0 {
        for &size in sizes {
            content.extend_from_slice(&size.to_be_bytes());
        }
    }
    write_box(b"stsz", &content)
}

/// stsc for the single-chunk layout: all samples live in chunk 1.
pub(crate) fn write_stsc(sample_count: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(20);
    content.extend_from_slice(&fullbox_header(0, 0));
    if sample_count == 0 {
        content.extend_from_slice(&0u32.to_be_bytes());
    } else {
        content.extend_from_slice(&1u32.to_be_bytes());
        content.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
        content.extend_from_slice(&sample_count.to_be_bytes());
        content.extend_from_slice(&1u32.to_be_bytes()); // sample description index
    }
    write_box(b"stsc", &content)
}

pub(crate) fn write_stco(offsets: &[u32]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + offsets.len() * 4);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for &offset in offsets {
        content.extend_from_slice(&offset.to_be_bytes());
    }
    write_box(b"stco", &content)
}

pub(crate) fn write_co64(offsets: &[u64]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + offsets.len() * 8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for &offset in offsets {
        content.extend_from_slice(&offset.to_be_bytes());
    }
    write_box(b"co64", &content)
}

/// mdat header only; the caller appends the payload bytes.
pub(crate) fn write_mdat_header(data_size: u64) -> Vec<u8> {
    if data_size + 8 > u32::MAX as u64 {
        let mut hdr = Vec::with_capacity(16);
        hdr.extend_from_slice(&1u32.to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr.extend_from_slice(&(data_size + 16).to_be_bytes());
        hdr
    } else {
        let mut hdr = Vec::with_capacity(8);
        hdr.extend_from_slice(&((data_size + 8) as u32).to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr
    }
}

fn identity_matrix() -> [u8; 36] {
    let mut m = [0u8; 36];
    m[0..4].copy_from_slice(&0x00010000u32.to_be_bytes());
    m[16..20].copy_from_slice(&0x00010000u32.to_be_bytes());
    m[32..36].copy_from_slice(&0x40000000u32.to_be_bytes());
    m
}
