//! MP4 parsing into movie metadata plus per-track sample streams.

use bytes::Bytes;
use tracing::debug;

use clipmux::{
    ContainerSource, Error, MediaKind, MovieInfo, Result, SampleRecord, SampleStream,
    TrackDescriptor,
};

use crate::atoms::{be_i32, be_u16, be_u32, be_u64, boxes, find_child};
use crate::sample_table::{SampleEntry, SampleTableBuilder};

/// A parsed MP4 file. Holds the whole file buffer; sample payloads are
/// cheap slices of it.
pub struct Mp4Source {
    data: Bytes,
    movie: MovieInfo,
    tables: Vec<Vec<SampleEntry>>,
}

impl Mp4Source {
    /// Parse an MP4 buffer. Fails if there is no moov box or a track's
    /// headers are malformed.
    pub(crate) fn parse(data: Vec<u8>) -> Result<Self> {
        let data = Bytes::from(data);

        let mut moov = None;
        for b in boxes(&data) {
            let b = b?;
            if &b.box_type == b"moov" {
                moov = Some(b.content.to_vec());
                break;
            }
        }
        let moov = moov.ok_or_else(|| Error::invalid_container("no moov box"))?;

        let mvhd = find_child(&moov, b"mvhd")?
            .ok_or_else(|| Error::invalid_container("moov has no mvhd"))?;
        let (timescale, duration) = parse_mvhd(mvhd.content)?;

        let mut tracks = Vec::new();
        let mut tables = Vec::new();
        for b in boxes(&moov) {
            let b = b?;
            if &b.box_type == b"trak" {
                let (descriptor, table) = parse_trak(b.content)?;
                tracks.push(descriptor);
                tables.push(table);
            }
        }

        debug!(
            timescale,
            duration,
            tracks = tracks.len(),
            "parsed mp4 source"
        );
        Ok(Self {
            data,
            movie: MovieInfo {
                timescale,
                duration,
                tracks,
            },
            tables,
        })
    }
}

impl ContainerSource for Mp4Source {
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

        let data = self.data.clone();
        Ok(Box::new(self.tables[idx].iter().map(move |entry| {
            // Offsets come straight from stco/co64 and can be anything,
            // including values whose end position overflows u64.
            let end = entry
                .offset
                .checked_add(entry.size as u64)
                .filter(|&end| end <= data.len() as u64)
                .ok_or_else(|| {
                    Error::extraction_failure(format!(
                        "sample at offset {} runs past end of file ({} bytes)",
                        entry.offset,
                        data.len()
                    ))
                })?;
            Ok(SampleRecord {
                dts: entry.dts,
                cts: entry.dts as i64 + entry.cts_offset as i64,
                duration: entry.duration,
                is_sync: entry.is_sync,
                payload: data.slice(entry.offset as usize..end as usize),
            })
        })))
    }
}

/// mvhd: (timescale, duration). Version 0 uses 32-bit times, version 1 64-bit.
fn parse_mvhd(content: &[u8]) -> Result<(u32, u64)> {
    let version = *content
        .first()
        .ok_or_else(|| Error::invalid_container("empty mvhd"))?;
    if version == 0 {
        Ok((be_u32(content, 12)?, be_u32(content, 16)? as u64))
    } else {
        Ok((be_u32(content, 20)?, be_u64(content, 24)?))
    }
}

/// mdhd: (timescale, duration). Same version split as mvhd.
fn parse_mdhd(content: &[u8]) -> Result<(u32, u64)> {
    let version = *content
        .first()
        .ok_or_else(|| Error::invalid_container("empty mdhd"))?;
    if version == 0 {
        Ok((be_u32(content, 12)?, be_u32(content, 16)? as u64))
    } else {
        Ok((be_u32(content, 20)?, be_u64(content, 24)?))
    }
}

/// tkhd: (track_id, width, height). Dimensions are 16.16 fixed point.
fn parse_tkhd(content: &[u8]) -> Result<(u32, u32, u32)> {
    let version = *content
        .first()
        .ok_or_else(|| Error::invalid_container("empty tkhd"))?;
    let (id_at, dim_at) = if version == 0 { (12, 76) } else { (20, 84) };
    let id = be_u32(content, id_at)?;
    let (width, height) = if content.len() >= dim_at + 8 {
        (be_u32(content, dim_at)? >> 16, be_u32(content, dim_at + 4)? >> 16)
    } else {
        (0, 0)
    };
    Ok((id, width, height))
}

fn parse_trak(content: &[u8]) -> Result<(TrackDescriptor, Vec<SampleEntry>)> {
    let tkhd = find_child(content, b"tkhd")?
        .ok_or_else(|| Error::invalid_container("trak has no tkhd"))?;
    let (id, width, height) = parse_tkhd(tkhd.content)?;

    let mdia = find_child(content, b"mdia")?
        .ok_or_else(|| Error::invalid_container("trak has no mdia"))?;
    let mdhd = find_child(mdia.content, b"mdhd")?
        .ok_or_else(|| Error::invalid_container("mdia has no mdhd"))?;
    let (timescale, duration) = parse_mdhd(mdhd.content)?;
    if timescale == 0 {
        return Err(Error::invalid_container(format!(
            "track {id} has a zero timescale"
        )));
    }

    let hdlr = find_child(mdia.content, b"hdlr")?
        .ok_or_else(|| Error::invalid_container("mdia has no hdlr"))?;
    let handler: [u8; 4] = hdlr
        .content
        .get(8..12)
        .map(|s| [s[0], s[1], s[2], s[3]])
        .ok_or_else(|| Error::invalid_container("short hdlr box"))?;
    let kind = MediaKind::from_handler(handler);

    let mut descriptor = TrackDescriptor {
        id,
        kind,
        timescale,
        duration,
        width,
        height,
        sample_rate: 0,
        channels: 0,
        codec_config: Bytes::new(),
    };

    let mut builder = SampleTableBuilder::default();
    let stbl = find_child(mdia.content, b"minf")?
        .map(|minf| find_child(minf.content, b"stbl"))
        .transpose()?
        .flatten();
    if let Some(stbl) = stbl {
        parse_stbl(stbl.content, &mut descriptor, &mut builder)?;
    }

    Ok((descriptor, builder.build()))
}

fn parse_stbl(
    content: &[u8],
    descriptor: &mut TrackDescriptor,
    builder: &mut SampleTableBuilder,
) -> Result<()> {
    for b in boxes(content) {
        let b = b?;
        match &b.box_type {
            b"stsd" => {
                // The whole box, header included, travels with the track so a
                // writer can replay it byte for byte.
                descriptor.codec_config = Bytes::copy_from_slice(b.raw);
                if descriptor.kind.is_audio() {
                    parse_audio_entry(b.content, descriptor)?;
                }
            }
            b"stts" => builder.set_stts(parse_runs_u32(b.content)?),
            b"ctts" => builder.set_ctts(parse_ctts(b.content)?),
            b"stss" => builder.set_sync_samples(parse_u32_list(b.content)?),
            b"stsc" => builder.set_stsc(parse_stsc(b.content)?),
            b"stsz" => {
                let (uniform, count, sizes) = parse_stsz(b.content)?;
                builder.set_stsz(uniform, count, sizes);
            }
            b"stco" => {
                let offsets = parse_u32_list(b.content)?;
                builder.set_chunk_offsets(offsets.into_iter().map(u64::from).collect());
            }
            b"co64" => builder.set_chunk_offsets(parse_u64_list(b.content)?),
            _ => {}
        }
    }
    Ok(())
}

/// AudioSampleEntry fixed fields inside the first stsd entry: channel count
/// and a 16.16 fixed-point sample rate.
fn parse_audio_entry(stsd_content: &[u8], descriptor: &mut TrackDescriptor) -> Result<()> {
    // fullbox(4) + entry_count(4) + entry header(8), then reserved(6) +
    // data_ref_index(2) + reserved(8) puts channelcount at 32.
    if stsd_content.len() >= 44 {
        descriptor.channels = be_u16(stsd_content, 32)?;
        descriptor.sample_rate = be_u32(stsd_content, 40)? >> 16;
    }
    Ok(())
}

/// stts-shaped payload: fullbox, entry count, then (u32, u32) pairs.
fn parse_runs_u32(content: &[u8]) -> Result<Vec<(u32, u32)>> {
    let count = be_u32(content, 4)? as usize;
    let mut entries = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let at = 8 + i * 8;
        if at + 8 > content.len() {
            break;
        }
        entries.push((be_u32(content, at)?, be_u32(content, at + 4)?));
    }
    Ok(entries)
}

/// ctts payload: version 0 stores offsets as u32, version 1 as i32.
fn parse_ctts(content: &[u8]) -> Result<Vec<(u32, i32)>> {
    let version = *content
        .first()
        .ok_or_else(|| Error::invalid_container("empty ctts"))?;
    let count = be_u32(content, 4)? as usize;
    let mut entries = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let at = 8 + i * 8;
        if at + 8 > content.len() {
            break;
        }
        let run = be_u32(content, at)?;
        let offset = if version == 0 {
            be_u32(content, at + 4)? as i32
        } else {
            be_i32(content, at + 4)?
        };
        entries.push((run, offset));
    }
    Ok(entries)
}

fn parse_stsc(content: &[u8]) -> Result<Vec<(u32, u32)>> {
    let count = be_u32(content, 4)? as usize;
    let mut entries = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let at = 8 + i * 12;
        if at + 12 > content.len() {
            break;
        }
        // The sample description index is ignored; every entry refers to the
        // single stsd entry these files carry.
        entries.push((be_u32(content, at)?, be_u32(content, at + 4)?));
    }
    Ok(entries)
}

fn parse_stsz(content: &[u8]) -> Result<(u32, u32, Vec<u32>)> {
    let uniform = be_u32(content, 4)?;
    let count = be_u32(content, 8)?;
    let sizes = if uniform == 0 {
        let mut sizes = Vec::with_capacity((count as usize).min(4096));
        for i in 0..count as usize {
            let at = 12 + i * 4;
            if at + 4 > content.len() {
                break;
            }
            sizes.push(be_u32(content, at)?);
        }
        sizes
    } else {
        Vec::new()
    };
    Ok((uniform, count, sizes))
}

fn parse_u32_list(content: &[u8]) -> Result<Vec<u32>> {
    let count = be_u32(content, 4)? as usize;
    let mut values = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let at = 8 + i * 4;
        if at + 4 > content.len() {
            break;
        }
        values.push(be_u32(content, at)?);
    }
    Ok(values)
}

fn parse_u64_list(content: &[u8]) -> Result<Vec<u64>> {
    let count = be_u32(content, 4)? as usize;
    let mut values = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let at = 8 + i * 8;
        if at + 8 > content.len() {
            break;
        }
        values.push(be_u64(content, at)?);
    }
    Ok(values)
}
