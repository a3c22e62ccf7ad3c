//! MDF 3.x block tree walker
//!
//! Walks `HD` → `DG` → `CG` → `CN`, with `TX` long names and `CC`
//! conversions. Links are 32 bit and every field follows the byte order
//! declared in the identification block.

use crate::conversion::Conversion;
use crate::error::{ConvertError, Result};
use crate::parser::helpers::decode_latin1;
use crate::parser::layout::{
    ChannelGroupLayout, ChannelKind, ChannelLayout, DataGroupLayout, DataRange, Encoding,
    StringEncoding,
};
use crate::parser::stream::MdfDataStream;
use crate::types::{ChannelInfo, FileInfo, GroupInfo};
use chrono::{DateTime, NaiveDateTime};
use log::debug;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

pub const HD_OFFSET: u64 = 64;

/// A v3 block: two character id and its body after the 4 byte header
#[derive(Debug, Clone)]
pub struct Block {
    pub id: [u8; 2],
    pub body: Vec<u8>,
}

pub fn read_block<R: Read + Seek>(reader: &mut R, offset: u64, big_endian: bool) -> Result<Block> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;

    let id = [header[0], header[1]];
    let size = if big_endian {
        u16::from_be_bytes([header[2], header[3]])
    } else {
        u16::from_le_bytes([header[2], header[3]])
    };
    if !id.iter().all(|b| b.is_ascii_uppercase()) || size < 4 {
        return Err(ConvertError::FileFormat(format!(
            "no block at offset {offset:#x}"
        )));
    }

    let mut body = Vec::new();
    reader.by_ref().take(size as u64 - 4).read_to_end(&mut body)?;
    if body.len() != size as usize - 4 {
        return Err(ConvertError::UnexpectedEof);
    }
    Ok(Block { id, body })
}

fn expect(block: &Block, id: &[u8; 2], offset: u64) -> Result<()> {
    if &block.id != id {
        return Err(ConvertError::FileFormat(format!(
            "expected {} block at offset {:#x}, found {}",
            String::from_utf8_lossy(id),
            offset,
            String::from_utf8_lossy(&block.id)
        )));
    }
    Ok(())
}

pub fn read_text<R: Read + Seek>(reader: &mut R, offset: u64, big_endian: bool) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let block = read_block(reader, offset, big_endian)?;
    expect(&block, b"TX", offset)?;
    Ok(decode_latin1(&block.body).trim().to_string())
}

/// Walk the whole block tree of an MDF 3 file
pub fn read_structure<R: Read + Seek>(
    reader: &mut R,
    info: &mut FileInfo,
    big_endian: bool,
) -> Result<Vec<DataGroupLayout>> {
    let hd = read_block(reader, HD_OFFSET, big_endian)?;
    expect(&hd, b"HD", HD_OFFSET)?;

    let mut stream = MdfDataStream::with_big_endian(&hd.body, big_endian);
    let first_dg = stream.read_u32()? as u64;
    let comment_link = stream.read_u32()? as u64;
    let _program_link = stream.read_u32()?;
    let _dg_count = stream.read_u16()?;
    let date = stream.read_fixed_str(10)?;
    let time = stream.read_fixed_str(8)?;
    info.author = stream.read_fixed_str(32)?;
    stream.skip(32 * 3)?;

    // v3.2 adds an absolute timestamp in nanoseconds
    let timestamp_ns = if stream.remaining() >= 8 {
        stream.read_u64()?
    } else {
        0
    };
    info.start_time = if timestamp_ns > 0 {
        DateTime::from_timestamp(
            (timestamp_ns / 1_000_000_000) as i64,
            (timestamp_ns % 1_000_000_000) as u32,
        )
    } else {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%d:%m:%Y %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    };
    info.comment = read_text(reader, comment_link, big_endian)?;

    let mut visited = HashSet::new();
    let mut data_groups = Vec::new();
    let mut dg_offset = first_dg;

    while dg_offset != 0 {
        if !visited.insert(dg_offset) {
            return Err(ConvertError::FileFormat(format!(
                "data group chain loops at offset {dg_offset:#x}"
            )));
        }
        let dg = read_block(reader, dg_offset, big_endian)?;
        expect(&dg, b"DG", dg_offset)?;

        let mut stream = MdfDataStream::with_big_endian(&dg.body, big_endian);
        let next_dg = stream.read_u32()? as u64;
        let first_cg = stream.read_u32()? as u64;
        let _trigger = stream.read_u32()?;
        let data_offset = stream.read_u32()? as u64;
        let _cg_count = stream.read_u16()?;
        let record_id_count = stream.read_u16()?;

        debug!(
            "DG #{} at {:#x}: {} record id(s)",
            data_groups.len(),
            dg_offset,
            record_id_count
        );

        let groups = read_channel_groups(
            reader,
            first_cg,
            data_groups.len(),
            big_endian,
            &mut visited,
        )?;

        let id_bytes = if record_id_count == 0 { 0 } else { record_id_count as u64 };
        let data_len: u64 = groups
            .iter()
            .map(|g| g.info.record_count * (g.data_bytes as u64 + id_bytes))
            .sum();
        let data = if data_offset == 0 || data_len == 0 {
            Vec::new()
        } else {
            vec![DataRange {
                offset: data_offset,
                len: data_len,
            }]
        };

        data_groups.push(DataGroupLayout {
            record_id_size: (record_id_count > 0) as u8,
            trailing_record_id: record_id_count == 2,
            data,
            groups,
        });
        dg_offset = next_dg;
    }

    info.data_group_count = data_groups.len();
    Ok(data_groups)
}

fn read_channel_groups<R: Read + Seek>(
    reader: &mut R,
    first: u64,
    data_group: usize,
    big_endian: bool,
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
        let cg = read_block(reader, cg_offset, big_endian)?;
        expect(&cg, b"CG", cg_offset)?;

        let mut stream = MdfDataStream::with_big_endian(&cg.body, big_endian);
        let next_cg = stream.read_u32()? as u64;
        let first_cn = stream.read_u32()? as u64;
        let comment_link = stream.read_u32()? as u64;
        let record_id = stream.read_u16()? as u64;
        let _channel_count = stream.read_u16()?;
        let record_size = stream.read_u16()? as u32;
        let record_count = stream.read_u32()? as u64;

        let comment = read_text(reader, comment_link, big_endian)?;
        let channels = read_channels(reader, first_cn, big_endian, visited)?;

        debug!(
            "  CG record id {} with {} channels, {} records of {} bytes",
            record_id,
            channels.len(),
            record_count,
            record_size
        );

        groups.push(ChannelGroupLayout {
            info: GroupInfo {
                id: 0,
                data_group,
                name: comment.clone(),
                comment,
                record_id,
                record_count,
                record_size,
                channels: channels.iter().map(|c| c.info.clone()).collect(),
            },
            record_id,
            data_bytes: record_size,
            invalidation_bytes: 0,
            variable_length: false,
            channels,
        });
        cg_offset = next_cg;
    }

    Ok(groups)
}

fn read_channels<R: Read + Seek>(
    reader: &mut R,
    first: u64,
    big_endian: bool,
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
        let cn = read_block(reader, cn_offset, big_endian)?;
        expect(&cn, b"CN", cn_offset)?;

        let mut stream = MdfDataStream::with_big_endian(&cn.body, big_endian);
        let next_cn = stream.read_u32()? as u64;
        let cc_link = stream.read_u32()? as u64;
        let _ce_link = stream.read_u32()?;
        let _cd_link = stream.read_u32()?;
        let comment_link = stream.read_u32()? as u64;
        let channel_type = stream.read_u16()?;
        let short_name = stream.read_fixed_str(32)?;
        let description = stream.read_fixed_str(128)?;
        let start_offset = stream.read_u16()? as u32;
        let bit_count = stream.read_u16()? as u32;
        let data_type = stream.read_u16()?;
        stream.skip(2 + 8 * 3)?;

        let long_name_link = if stream.remaining() >= 4 {
            stream.read_u32()? as u64
        } else {
            0
        };
        let _display_name_link = if stream.remaining() >= 4 {
            stream.read_u32()?
        } else {
            0
        };
        let additional_byte_offset = if stream.remaining() >= 2 {
            stream.read_u16()? as u32
        } else {
            0
        };

        let long_name = read_text(reader, long_name_link, big_endian)?;
        let name = if long_name.is_empty() {
            short_name
        } else {
            long_name
        };
        let mut comment = read_text(reader, comment_link, big_endian)?;
        if comment.is_empty() {
            comment = description;
        }
        let (conversion, unit) = read_conversion(reader, cc_link, big_endian)?;
        let encoding = encoding_from_code(data_type, big_endian, bit_count);

        debug!(
            "    CN '{}' type {} data type {} at bit {} ({} bits)",
            name, channel_type, data_type, start_offset, bit_count
        );

        channels.push(ChannelLayout {
            info: ChannelInfo {
                name,
                unit,
                comment,
                is_master: channel_type == 1,
                data_type: encoding.describe(bit_count),
                bit_count,
            },
            kind: ChannelKind::Fixed,
            encoding,
            byte_offset: start_offset / 8 + additional_byte_offset,
            bit_offset: start_offset % 8,
            bit_count,
            conversion,
            invalidation_bit: None,
            all_invalid: false,
        });
        cn_offset = next_cn;
    }

    Ok(channels)
}

fn encoding_from_code(code: u16, default_big_endian: bool, bit_count: u32) -> Encoding {
    match code {
        0 => Encoding::UInt {
            big_endian: default_big_endian,
        },
        1 => Encoding::Int {
            big_endian: default_big_endian,
        },
        2 | 3 => Encoding::Float {
            big_endian: default_big_endian,
        },
        7 => Encoding::String(StringEncoding::Latin1),
        8 => Encoding::ByteArray,
        9 => Encoding::UInt { big_endian: true },
        10 => Encoding::Int { big_endian: true },
        11 | 12 => Encoding::Float { big_endian: true },
        13 => Encoding::UInt { big_endian: false },
        14 => Encoding::Int { big_endian: false },
        15 | 16 => Encoding::Float { big_endian: false },
        other => {
            debug!("data type {} ({} bits) is not decoded", other, bit_count);
            Encoding::Unknown(other)
        }
    }
}

/// Parse a v3 `CC` block into a conversion rule and its unit
fn read_conversion<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    big_endian: bool,
) -> Result<(Conversion, String)> {
    if offset == 0 {
        return Ok((Conversion::Identity, String::new()));
    }
    let cc = read_block(reader, offset, big_endian)?;
    expect(&cc, b"CC", offset)?;

    let mut stream = MdfDataStream::with_big_endian(&cc.body, big_endian);
    stream.skip(2 + 16)?;
    let unit = stream.read_fixed_str(20)?;
    let conversion_type = stream.read_u16()?;
    let size_info = stream.read_u16()? as usize;

    let conversion = match conversion_type {
        0 => {
            let p = read_params(&mut stream, 2)?;
            Conversion::Linear {
                offset: p[0],
                factor: p[1],
            }
        }
        1 | 2 => {
            let values = read_params(&mut stream, size_info * 2)?;
            let pairs = values.chunks_exact(2).map(|p| (p[0], p[1])).collect();
            if conversion_type == 1 {
                Conversion::TableInterpolated(pairs)
            } else {
                Conversion::Table(pairs)
            }
        }
        6 => Conversion::Polynomial(array6(&read_params(&mut stream, 6)?)),
        7 => Conversion::Exponential(array7(&read_params(&mut stream, 7)?)),
        8 => Conversion::Logarithmic(array7(&read_params(&mut stream, 7)?)),
        9 => Conversion::Rational(array6(&read_params(&mut stream, 6)?)),
        11 => {
            let mut pairs = Vec::with_capacity(size_info);
            for _ in 0..size_info {
                let value = stream.read_f64()?;
                let text = stream.read_fixed_str(32)?;
                pairs.push((value, text));
            }
            Conversion::ValueToText {
                pairs,
                default: None,
            }
        }
        12 => {
            let mut entries = Vec::with_capacity(size_info);
            for _ in 0..size_info {
                let lower = stream.read_f64()?;
                let upper = stream.read_f64()?;
                let text_link = stream.read_u32()? as u64;
                entries.push((lower, upper, text_link));
            }
            let mut default = None;
            let mut ranges = Vec::new();
            for (index, (lower, upper, text_link)) in entries.into_iter().enumerate() {
                let text = read_text(reader, text_link, big_endian)?;
                if index == 0 {
                    default = (!text.is_empty()).then_some(text);
                } else {
                    ranges.push((lower, upper, text));
                }
            }
            Conversion::RangeToText { ranges, default }
        }
        65535 => Conversion::Identity,
        other => {
            debug!("conversion type {} at {:#x} is not applied", other, offset);
            Conversion::Unsupported(format!("conversion type {other}"))
        }
    };

    Ok((conversion, unit))
}

fn read_params(stream: &mut MdfDataStream, count: usize) -> Result<Vec<f64>> {
    (0..count).map(|_| stream.read_f64()).collect()
}

fn array6(values: &[f64]) -> [f64; 6] {
    let mut p = [0.0; 6];
    p.copy_from_slice(&values[..6]);
    p
}

fn array7(values: &[f64]) -> [f64; 7] {
    let mut p = [0.0; 7];
    p.copy_from_slice(&values[..7]);
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(id: &[u8; 2], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&((body.len() + 4) as u16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_read_text_block() {
        let mut bytes = vec![0u8; 4];
        bytes.extend(block(b"TX", b"Vehicle speed\0"));
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_text(&mut cursor, 4, false).unwrap(), "Vehicle speed");
        assert_eq!(read_text(&mut cursor, 0, false).unwrap(), "");
    }

    #[test]
    fn test_wrong_block_id() {
        let mut bytes = vec![0u8; 4];
        bytes.extend(block(b"CG", &[0u8; 22]));
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_text(&mut cursor, 4, false),
            Err(ConvertError::FileFormat(_))
        ));
    }

    #[test]
    fn test_linear_conversion_block() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&[0u8; 16]);
        let mut unit = [0u8; 20];
        unit[..4].copy_from_slice(b"km/h");
        body.extend_from_slice(&unit);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&1.5f64.to_le_bytes());
        body.extend_from_slice(&0.5f64.to_le_bytes());

        let mut bytes = vec![0u8; 4];
        bytes.extend(block(b"CC", &body));
        let mut cursor = Cursor::new(bytes);
        let (conversion, unit) = read_conversion(&mut cursor, 4, false).unwrap();
        assert_eq!(unit, "km/h");
        assert_eq!(
            conversion,
            Conversion::Linear {
                offset: 1.5,
                factor: 0.5
            }
        );
    }

    #[test]
    fn test_encoding_codes() {
        assert_eq!(
            encoding_from_code(0, true, 16),
            Encoding::UInt { big_endian: true }
        );
        assert_eq!(
            encoding_from_code(14, true, 16),
            Encoding::Int { big_endian: false }
        );
        assert_eq!(encoding_from_code(4, false, 32), Encoding::Unknown(4));
    }
}
