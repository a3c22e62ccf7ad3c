//! Record demultiplexing and per-channel sample extraction

use crate::error::{ConvertError, Result};
use crate::parser::layout::{ChannelGroupLayout, DataGroupLayout};
use crate::parser::stream::MdfDataStream;
use crate::types::Value;
use log::warn;

/// Decode every channel of one channel group from its data group's bytes
///
/// Returns one sample vector per channel, in channel order.
pub fn decode_channel_group(
    data: &[u8],
    data_group: &DataGroupLayout,
    group_index: usize,
) -> Result<Vec<Vec<Value>>> {
    let group = data_group.groups.get(group_index).ok_or_else(|| {
        ConvertError::FileFormat(format!("channel group {group_index} does not exist"))
    })?;

    let records = if data_group.record_id_size == 0 {
        sorted_records(data, group)
    } else {
        unsorted_records(data, data_group, group.record_id)?
    };

    if (records.len() as u64) < group.info.record_count {
        warn!(
            "channel group '{}' declares {} records, data holds {}",
            group.info.name,
            group.info.record_count,
            records.len()
        );
    }

    let mut columns: Vec<Vec<Value>> = group
        .channels
        .iter()
        .map(|_| Vec::with_capacity(records.len()))
        .collect();
    for (index, record) in records.iter().enumerate() {
        for (channel, column) in group.channels.iter().zip(columns.iter_mut()) {
            column.push(channel.decode(record, index as u64, group.data_bytes));
        }
    }
    Ok(columns)
}

/// Records of a data group holding a single channel group without ids
fn sorted_records<'a>(data: &'a [u8], group: &ChannelGroupLayout) -> Vec<&'a [u8]> {
    let size = group.record_size();
    if size == 0 {
        // only virtual channels: records exist but occupy no bytes
        return (0..group.info.record_count).map(|_| &data[..0]).collect();
    }
    data.chunks_exact(size)
        .take(group.info.record_count as usize)
        .collect()
}

/// Records with a given id out of a data group shared by several groups
fn unsorted_records<'a>(
    data: &'a [u8],
    data_group: &DataGroupLayout,
    wanted_id: u64,
) -> Result<Vec<&'a [u8]>> {
    let id_size = data_group.record_id_size as usize;
    let mut stream = MdfDataStream::new(data);
    let mut records = Vec::new();

    while stream.remaining() >= id_size.max(1) {
        let record_id = stream.read_uint_sized(id_size)?;
        let group = data_group
            .groups
            .iter()
            .find(|g| g.record_id == record_id)
            .ok_or_else(|| {
                ConvertError::FileFormat(format!(
                    "record id {record_id} at byte {} matches no channel group",
                    stream.pos - id_size
                ))
            })?;

        let record = if group.variable_length {
            let len = stream.read_u32()? as usize;
            stream.read_bytes(len)?
        } else {
            stream.read_bytes(group.record_size())?
        };
        if data_group.trailing_record_id {
            stream.skip(id_size)?;
        }

        if record_id == wanted_id && !group.variable_length {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::Conversion;
    use crate::parser::layout::{ChannelKind, ChannelLayout, Encoding};
    use crate::types::{ChannelInfo, GroupInfo};

    fn u8_channel(byte_offset: u32) -> ChannelLayout {
        ChannelLayout {
            info: ChannelInfo::default(),
            kind: ChannelKind::Fixed,
            encoding: Encoding::UInt { big_endian: false },
            byte_offset,
            bit_offset: 0,
            bit_count: 8,
            conversion: Conversion::Identity,
            invalidation_bit: None,
            all_invalid: false,
        }
    }

    fn group(record_id: u64, data_bytes: u32, record_count: u64, channels: usize) -> ChannelGroupLayout {
        ChannelGroupLayout {
            info: GroupInfo {
                record_count,
                ..Default::default()
            },
            record_id,
            data_bytes,
            invalidation_bytes: 0,
            variable_length: false,
            channels: (0..channels as u32).map(u8_channel).collect(),
        }
    }

    #[test]
    fn test_sorted_group() {
        let dg = DataGroupLayout {
            record_id_size: 0,
            trailing_record_id: false,
            data: Vec::new(),
            groups: vec![group(0, 2, 3, 2)],
        };
        let data = [1, 10, 2, 20, 3, 30];
        let columns = decode_channel_group(&data, &dg, 0).unwrap();
        assert_eq!(columns[0], vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
        assert_eq!(columns[1], vec![Value::UInt(10), Value::UInt(20), Value::UInt(30)]);
    }

    #[test]
    fn test_sorted_group_truncated_data() {
        let dg = DataGroupLayout {
            record_id_size: 0,
            trailing_record_id: false,
            data: Vec::new(),
            groups: vec![group(0, 2, 5, 1)],
        };
        let data = [1, 10, 2];
        let columns = decode_channel_group(&data, &dg, 0).unwrap();
        assert_eq!(columns[0], vec![Value::UInt(1)]);
    }

    #[test]
    fn test_unsorted_demultiplexing() {
        let dg = DataGroupLayout {
            record_id_size: 1,
            trailing_record_id: false,
            data: Vec::new(),
            groups: vec![group(1, 1, 2, 1), group(2, 2, 1, 2)],
        };
        let data = [1, 7, 2, 8, 9, 1, 6];
        let first = decode_channel_group(&data, &dg, 0).unwrap();
        let second = decode_channel_group(&data, &dg, 1).unwrap();
        assert_eq!(first[0], vec![Value::UInt(7), Value::UInt(6)]);
        assert_eq!(second[1], vec![Value::UInt(9)]);
    }

    #[test]
    fn test_trailing_record_ids() {
        let dg = DataGroupLayout {
            record_id_size: 1,
            trailing_record_id: true,
            data: Vec::new(),
            groups: vec![group(3, 1, 2, 1)],
        };
        let data = [3, 11, 3, 3, 12, 3];
        let columns = decode_channel_group(&data, &dg, 0).unwrap();
        assert_eq!(columns[0], vec![Value::UInt(11), Value::UInt(12)]);
    }

    #[test]
    fn test_unknown_record_id_is_format_error() {
        let dg = DataGroupLayout {
            record_id_size: 1,
            trailing_record_id: false,
            data: Vec::new(),
            groups: vec![group(1, 1, 1, 1)],
        };
        assert!(matches!(
            decode_channel_group(&[9, 0], &dg, 0),
            Err(ConvertError::FileFormat(_))
        ));
    }
}
