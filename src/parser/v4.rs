//! MDF 4.x block tree walker
//!
//! Walks `##HD` → `##DG` → `##CG` → `##CN` and resolves names, units and
//! conversions into [`DataGroupLayout`]s. Sample bytes are not read here.

use crate::conversion::Conversion;
use crate::error::{ConvertError, Result};
use crate::parser::layout::{
    ChannelGroupLayout, ChannelKind, ChannelLayout, DataGroupLayout, DataRange, Encoding,
    StringEncoding,
};
use crate::parser::stream::MdfDataStream;
use crate::parser::text::{comment_text, md_property};
use crate::types::{ChannelInfo, FileInfo, GroupInfo};
use chrono::DateTime;
use log::debug;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

pub const BLOCK_HEADER_SIZE: u64 = 24;

/// Offset of the header block, right after the identification block
pub const HD_OFFSET: u64 = 64;

/// Common header of every MDF 4 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub id: [u8; 4],
    pub length: u64,
    pub link_count: u64,
}

impl BlockHeader {
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    /// Bytes taken by the header and the link section
    fn links_end(&self) -> Option<u64> {
        links_end(self.link_count)
    }

    fn data_offset(&self, block_offset: u64) -> u64 {
        block_offset.saturating_add(self.links_end().unwrap_or(u64::MAX))
    }

    fn data_len(&self) -> u64 {
        self.links_end()
            .map_or(0, |end| self.length.saturating_sub(end))
    }
}

fn links_end(link_count: u64) -> Option<u64> {
    link_count
        .checked_mul(8)
        .and_then(|links| links.checked_add(BLOCK_HEADER_SIZE))
}

/// A fully read block: links and data section
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub links: Vec<u64>,
    pub data: Vec<u8>,
}

impl Block {
    /// Link by index, 0 (nil) when the block has fewer links
    pub fn link(&self, index: usize) -> u64 {
        self.links.get(index).copied().unwrap_or(0)
    }

    fn expect(&self, id: &[u8; 4], offset: u64) -> Result<()> {
        if &self.header.id != id {
            return Err(ConvertError::FileFormat(format!(
                "expected {} block at offset {:#x}, found {}",
                String::from_utf8_lossy(id),
                offset,
                self.header.id_str()
            )));
        }
        Ok(())
    }
}

pub fn read_block_header<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<BlockHeader> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; BLOCK_HEADER_SIZE as usize];
    reader.read_exact(&mut buf)?;

    let mut stream = MdfDataStream::new(&buf);
    let mut id = [0u8; 4];
    id.copy_from_slice(stream.read_bytes(4)?);
    stream.skip(4)?;
    let length = stream.read_u64()?;
    let link_count = stream.read_u64()?;

    if &id[..2] != b"##" {
        return Err(ConvertError::FileFormat(format!(
            "no block at offset {offset:#x}"
        )));
    }
    match links_end(link_count) {
        Some(end) if end <= length => {}
        _ => {
            return Err(ConvertError::FileFormat(format!(
                "block {} at offset {offset:#x} is shorter than its {} links",
                String::from_utf8_lossy(&id),
                link_count
            )))
        }
    }

    Ok(BlockHeader {
        id,
        length,
        link_count,
    })
}

pub fn read_block<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Block> {
    let header = read_block_header(reader, offset)?;

    let links_len = header.link_count.saturating_mul(8);
    let mut links_raw = Vec::new();
    reader
        .by_ref()
        .take(links_len)
        .read_to_end(&mut links_raw)?;
    if links_raw.len() as u64 != links_len {
        return Err(ConvertError::UnexpectedEof);
    }
    let mut stream = MdfDataStream::new(&links_raw);
    let links = (0..header.link_count)
        .map(|_| stream.read_u64())
        .collect::<Result<Vec<_>>>()?;

    let mut data = Vec::new();
    reader.by_ref().take(header.data_len()).read_to_end(&mut data)?;
    if data.len() as u64 != header.data_len() {
        return Err(ConvertError::UnexpectedEof);
    }

    Ok(Block {
        header,
        links,
        data,
    })
}

/// Text of a TX or MD block; empty for a nil link
pub fn read_text<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let block = read_block(reader, offset)?;
    match &block.header.id {
        b"##TX" | b"##MD" => Ok(crate::parser::helpers::decode_utf8(&block.data)
            .trim()
            .to_string()),
        _ => Err(ConvertError::FileFormat(format!(
            "expected text block at offset {offset:#x}, found {}",
            block.header.id_str()
        ))),
    }
}

/// Text of a conversion reference, `None` when it links something else
fn read_reference_text<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Option<String>> {
    if offset == 0 {
        return Ok(None);
    }
    let header = read_block_header(reader, offset)?;
    match &header.id {
        b"##TX" | b"##MD" => Ok(Some(comment_text(&read_text(reader, offset)?))),
        _ => Ok(None),
    }
}

/// Walk the whole block tree of an MDF 4 file
pub fn read_structure<R: Read + Seek>(
    reader: &mut R,
    info: &mut FileInfo,
) -> Result<Vec<DataGroupLayout>> {
    let hd = read_block(reader, HD_OFFSET)?;
    hd.expect(b"##HD", HD_OFFSET)?;

    let mut stream = MdfDataStream::new(&hd.data);
    let start_time_ns = stream.read_u64()?;
    info.start_time = if start_time_ns == 0 {
        None
    } else {
        DateTime::from_timestamp(
            (start_time_ns / 1_000_000_000) as i64,
            (start_time_ns % 1_000_000_000) as u32,
        )
    };

    let raw_comment = read_text(reader, hd.link(5))?;
    info.comment = comment_text(&raw_comment);
    info.author = md_property(&raw_comment, "author").unwrap_or_default();

    let mut visited = HashSet::new();
    let mut data_groups = Vec::new();
    let mut dg_offset = hd.link(0);

    while dg_offset != 0 {
        if !visited.insert(dg_offset) {
            return Err(ConvertError::FileFormat(format!(
                "data group chain loops at offset {dg_offset:#x}"
            )));
        }
        let dg = read_block(reader, dg_offset)?;
        dg.expect(b"##DG", dg_offset)?;
        let record_id_size = MdfDataStream::new(&dg.data).read_u8()?;

        debug!(
            "DG #{} at {:#x}: record id size {}",
            data_groups.len(),
            dg_offset,
            record_id_size
        );

        let groups = read_channel_groups(reader, dg.link(1), data_groups.len(), &mut visited)?;
        let data = collect_data_ranges(reader, dg.link(2), &mut visited)?;

        data_groups.push(DataGroupLayout {
            record_id_size,
            trailing_record_id: false,
            data,
            groups,
        });
        dg_offset = dg.link(0);
    }

    info.data_group_count = data_groups.len();
    Ok(data_groups)
}

fn read_channel_groups<R: Read + Seek>(
    reader: &mut R,
    first: u64,
    data_group: usize,
    visited: &mut HashSet<u64>,
) -> Result<Vec<ChannelGroupLayout>> {
    let mut groups = Vec::new();
    let mut cg_offset = first;

    while cg_offset != 0 {
        if !visited.insert(cg_offset) {
            return Err(ConvertError::FileFormat(format!(
                "channel group chain loops at offset {cg_offset:#x}"
            )));
        }
        let cg = read_block(reader, cg_offset)?;
        cg.expect(b"##CG", cg_offset)?;

        let mut stream = MdfDataStream::new(&cg.data);
        let record_id = stream.read_u64()?;
        let cycle_count = stream.read_u64()?;
        let flags = stream.read_u16()?;
        stream.skip(2 + 4)?;
        let data_bytes = stream.read_u32()?;
        let invalidation_bytes = stream.read_u32()?;

        let acquisition_name = read_text(reader, cg.link(2))?;
        let comment = comment_text(&read_text(reader, cg.link(5))?);
        let variable_length = flags & 0x1 != 0;

        let channels = if variable_length {
            Vec::new()
        } else {
            read_channels(reader, cg.link(1), visited)?
        };

        debug!(
            "  CG record id {} with {} channels, {} records of {}+{} bytes",
            record_id,
            channels.len(),
            cycle_count,
            data_bytes,
            invalidation_bytes
        );

        let name = if acquisition_name.is_empty() {
            comment.clone()
        } else {
            acquisition_name
        };

        groups.push(ChannelGroupLayout {
            info: GroupInfo {
                id: 0,
                data_group,
                name,
                comment,
                record_id,
                record_count: cycle_count,
                record_size: data_bytes.saturating_add(invalidation_bytes),
                channels: channels.iter().map(|c| c.info.clone()).collect(),
            },
            record_id,
            data_bytes,
            invalidation_bytes,
            variable_length,
            channels,
        });
        cg_offset = cg.link(0);
    }

    Ok(groups)
}

fn read_channels<R: Read + Seek>(
    reader: &mut R,
    first: u64,
    visited: &mut HashSet<u64>,
) -> Result<Vec<ChannelLayout>> {
    let mut channels = Vec::new();
    let mut cn_offset = first;

    while cn_offset != 0 {
        if !visited.insert(cn_offset) {
            return Err(ConvertError::FileFormat(format!(
                "channel chain loops at offset {cn_offset:#x}"
            )));
        }
        let cn = read_block(reader, cn_offset)?;
        cn.expect(b"##CN", cn_offset)?;

        let mut stream = MdfDataStream::new(&cn.data);
        let channel_type = stream.read_u8()?;
        let _sync_type = stream.read_u8()?;
        let data_type = stream.read_u8()?;
        let bit_offset = stream.read_u8()? as u32;
        let byte_offset = stream.read_u32()?;
        let bit_count = stream.read_u32()?;
        let flags = stream.read_u32()?;
        let invalidation_bit_pos = stream.read_u32()?;

        let name = read_text(reader, cn.link(2))?;
        let (conversion, conversion_unit) = read_conversion(reader, cn.link(4))?;
        let mut unit = comment_text(&read_text(reader, cn.link(6))?);
        if unit.is_empty() {
            unit = conversion_unit;
        }
        let comment = comment_text(&read_text(reader, cn.link(7))?);

        let kind = match channel_type {
            1 => ChannelKind::VariableLength,
            3 | 6 => ChannelKind::Virtual,
            _ => ChannelKind::Fixed,
        };
        let is_master = matches!(channel_type, 2 | 3);
        let encoding = encoding_from_code(data_type);

        debug!(
            "    CN '{}' type {} data type {} at byte {} bit {} ({} bits)",
            name, channel_type, data_type, byte_offset, bit_offset, bit_count
        );

        channels.push(ChannelLayout {
            info: ChannelInfo {
                name,
                unit,
                comment,
                is_master,
                data_type: encoding.describe(bit_count),
                bit_count,
            },
            kind,
            encoding,
            byte_offset,
            bit_offset,
            bit_count,
            conversion,
            invalidation_bit: (flags & 0x2 != 0).then_some(invalidation_bit_pos),
            all_invalid: flags & 0x1 != 0,
        });
        cn_offset = cn.link(0);
    }

    Ok(channels)
}

fn encoding_from_code(code: u8) -> Encoding {
    match code {
        0 => Encoding::UInt { big_endian: false },
        1 => Encoding::UInt { big_endian: true },
        2 => Encoding::Int { big_endian: false },
        3 => Encoding::Int { big_endian: true },
        4 => Encoding::Float { big_endian: false },
        5 => Encoding::Float { big_endian: true },
        6 => Encoding::String(StringEncoding::Latin1),
        7 => Encoding::String(StringEncoding::Utf8),
        8 => Encoding::String(StringEncoding::Utf16Le),
        9 => Encoding::String(StringEncoding::Utf16Be),
        10..=12 => Encoding::ByteArray,
        other => Encoding::Unknown(other as u16),
    }
}

/// Parse a `##CC` block into a conversion rule and its unit
fn read_conversion<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<(Conversion, String)> {
    if offset == 0 {
        return Ok((Conversion::Identity, String::new()));
    }
    let cc = read_block(reader, offset)?;
    cc.expect(b"##CC", offset)?;

    let mut stream = MdfDataStream::new(&cc.data);
    let conversion_type = stream.read_u8()?;
    let _precision = stream.read_u8()?;
    let _flags = stream.read_u16()?;
    let ref_count = stream.read_u16()? as usize;
    let value_count = stream.read_u16()? as usize;
    stream.skip(16)?;
    let values = (0..value_count)
        .map(|_| stream.read_f64())
        .collect::<Result<Vec<_>>>()?;

    let unit = comment_text(&read_text(reader, cc.link(1))?);
    let references: Vec<u64> = (0..ref_count).map(|i| cc.link(4 + i)).collect();

    let conversion = match conversion_type {
        0 => Conversion::Identity,
        1 if values.len() >= 2 => Conversion::Linear {
            offset: values[0],
            factor: values[1],
        },
        2 if values.len() >= 6 => {
            let mut p = [0.0; 6];
            p.copy_from_slice(&values[..6]);
            Conversion::Rational(p)
        }
        3 => Conversion::Unsupported("algebraic".to_string()),
        4 => Conversion::TableInterpolated(pairs(&values)),
        5 => Conversion::Table(pairs(&values)),
        7 => {
            let mut texts = Vec::with_capacity(references.len());
            for reference in &references {
                texts.push(read_reference_text(reader, *reference)?);
            }
            let default = texts.get(values.len()).cloned().flatten();
            let pairs = values
                .iter()
                .zip(texts)
                .filter_map(|(key, text)| text.map(|t| (*key, t)))
                .collect();
            Conversion::ValueToText { pairs, default }
        }
        8 => {
            let mut texts = Vec::with_capacity(references.len());
            for reference in &references {
                texts.push(read_reference_text(reader, *reference)?);
            }
            let range_count = values.len() / 2;
            let default = texts.get(range_count).cloned().flatten();
            let ranges = values
                .chunks_exact(2)
                .zip(texts)
                .filter_map(|(bounds, text)| text.map(|t| (bounds[0], bounds[1], t)))
                .collect();
            Conversion::RangeToText { ranges, default }
        }
        other => {
            debug!("conversion type {} at {:#x} is not applied", other, offset);
            Conversion::Unsupported(format!("conversion type {other}"))
        }
    };

    Ok((conversion, unit))
}

fn pairs(values: &[f64]) -> Vec<(f64, f64)> {
    values.chunks_exact(2).map(|p| (p[0], p[1])).collect()
}

/// Resolve a data link (`##DT`, `##DL`, `##HL`) into file ranges
fn collect_data_ranges<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    visited: &mut HashSet<u64>,
) -> Result<Vec<DataRange>> {
    let mut ranges = Vec::new();
    if offset == 0 {
        return Ok(ranges);
    }

    let header = read_block_header(reader, offset)?;
    match &header.id {
        b"##DT" | b"##DV" => ranges.push(DataRange {
            offset: header.data_offset(offset),
            len: header.data_len(),
        }),
        b"##DL" => {
            let mut dl_offset = offset;
            while dl_offset != 0 {
                if !visited.insert(dl_offset) {
                    return Err(ConvertError::FileFormat(format!(
                        "data list chain loops at offset {dl_offset:#x}"
                    )));
                }
                let dl = read_block(reader, dl_offset)?;
                dl.expect(b"##DL", dl_offset)?;
                for link in dl.links.iter().skip(1) {
                    ranges.extend(collect_data_ranges(reader, *link, visited)?);
                }
                dl_offset = dl.link(0);
            }
        }
        b"##HL" => {
            let hl = read_block(reader, offset)?;
            ranges.extend(collect_data_ranges(reader, hl.link(0), visited)?);
        }
        b"##DZ" => {
            return Err(ConvertError::Unsupported(
                "compressed data blocks (##DZ)".to_string(),
            ))
        }
        _ => {
            return Err(ConvertError::FileFormat(format!(
                "unexpected {} block as data at offset {offset:#x}",
                header.id_str()
            )))
        }
    }
    Ok(ranges)
}
