use crate::types::Value;
use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a channel group in file order (data groups flattened)
pub type GroupId = usize;

/// File-level metadata of a measurement container
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileInfo {
    /// Version string from the identification block, e.g. "4.10"
    pub version: String,
    /// Numeric version, e.g. 410
    pub version_number: u16,
    /// Program that wrote the file
    pub program: String,
    pub start_time: Option<DateTime<Utc>>,
    pub author: String,
    pub comment: String,
    /// Number of data groups (a data group holds one or more channel groups)
    pub data_group_count: usize,
}

/// Metadata of a single channel
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelInfo {
    pub name: String,
    pub unit: String,
    pub comment: String,
    /// Master (time) channel of its group
    pub is_master: bool,
    /// Human-readable raw data type, e.g. "uint16 LE"
    pub data_type: String,
    pub bit_count: u32,
}

/// Metadata of a channel group
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupInfo {
    pub id: GroupId,
    /// Index of the data group this channel group lives in
    pub data_group: usize,
    /// Acquisition name, or the comment when no name is stored
    pub name: String,
    pub comment: String,
    pub record_id: u64,
    pub record_count: u64,
    /// Bytes per record, excluding record ids
    pub record_size: u32,
    pub channels: Vec<ChannelInfo>,
}

impl GroupInfo {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Decoded samples of one channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelData {
    pub info: ChannelInfo,
    pub samples: Vec<Value>,
}

/// Decoded samples of every channel of a channel group
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupData {
    pub id: GroupId,
    pub name: String,
    pub channels: Vec<ChannelData>,
}

impl GroupData {
    pub fn record_count(&self) -> usize {
        self.channels.first().map(|c| c.samples.len()).unwrap_or(0)
    }

    pub fn master(&self) -> Option<&ChannelData> {
        self.channels.iter().find(|c| c.info.is_master)
    }

    /// Time axis of the group, one entry per record
    ///
    /// Master samples without a numeric value become NaN so the remaining
    /// records keep their timestamps. The record index is used when the group
    /// has no master channel or none of its samples is numeric.
    pub fn time_axis(&self) -> Vec<f64> {
        if let Some(master) = self.master() {
            let times: Vec<f64> = master
                .samples
                .iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect();
            if times.iter().any(|t| !t.is_nan()) {
                return times;
            }
        }
        (0..self.record_count()).map(|i| i as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str, is_master: bool, samples: Vec<Value>) -> ChannelData {
        ChannelData {
            info: ChannelInfo {
                name: name.to_string(),
                is_master,
                ..Default::default()
            },
            samples,
        }
    }

    #[test]
    fn test_time_axis_uses_master() {
        let group = GroupData {
            id: 0,
            name: String::new(),
            channels: vec![
                channel("t", true, vec![Value::Float(0.5), Value::Float(1.0)]),
                channel("x", false, vec![Value::Int(1), Value::Int(2)]),
            ],
        };
        assert_eq!(group.time_axis(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_time_axis_falls_back_to_index() {
        let group = GroupData {
            id: 0,
            name: String::new(),
            channels: vec![channel("x", false, vec![Value::Int(5), Value::Int(6), Value::Int(7)])],
        };
        assert_eq!(group.time_axis(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_time_axis_keeps_record_positions() {
        let group = GroupData {
            id: 0,
            name: String::new(),
            channels: vec![
                channel(
                    "t",
                    true,
                    vec![Value::Float(0.5), Value::Empty, Value::Float(1.5)],
                ),
                channel("x", false, vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ],
        };
        let axis = group.time_axis();
        assert_eq!(axis.len(), 3);
        assert_eq!(axis[0], 0.5);
        assert!(axis[1].is_nan());
        assert_eq!(axis[2], 1.5);
    }

    #[test]
    fn test_time_axis_without_numeric_master() {
        let group = GroupData {
            id: 0,
            name: String::new(),
            channels: vec![
                channel("t", true, vec![Value::Text("a".into()), Value::Empty]),
                channel("x", false, vec![Value::Int(1), Value::Int(2)]),
            ],
        };
        assert_eq!(group.time_axis(), vec![0.0, 1.0]);
    }
}
