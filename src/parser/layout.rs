//! Version independent description of where samples live
//!
//! The v3 and v4 block walkers both produce these structures; record
//! decoding only ever looks at them.

use crate::conversion::Conversion;
use crate::parser::helpers::{
    decode_latin1, decode_utf16, decode_utf8, extract_bits, half_to_f64, sign_extend, to_hex,
};
use crate::types::{ChannelInfo, GroupInfo, Value};

/// Text encoding of a string channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Latin1,
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Raw encoding of a channel's bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    UInt { big_endian: bool },
    Int { big_endian: bool },
    Float { big_endian: bool },
    String(StringEncoding),
    ByteArray,
    /// Data types this crate does not decode (MIME, CANopen date/time, VAX)
    Unknown(u16),
}

impl Encoding {
    pub fn describe(&self, bit_count: u32) -> String {
        let order = |big_endian: bool| if big_endian { "BE" } else { "LE" };
        match self {
            Encoding::UInt { big_endian } => format!("uint{bit_count} {}", order(*big_endian)),
            Encoding::Int { big_endian } => format!("int{bit_count} {}", order(*big_endian)),
            Encoding::Float { big_endian } => format!("float{bit_count} {}", order(*big_endian)),
            Encoding::String(enc) => format!("string {:?}", enc),
            Encoding::ByteArray => "byte array".to_string(),
            Encoding::Unknown(code) => format!("data type {code}"),
        }
    }
}

/// How a channel obtains its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Bits inside the fixed-length record
    Fixed,
    /// Value is the record index, converted
    Virtual,
    /// Variable length signal data, stored outside the record
    VariableLength,
}

/// Decoding description of one channel
#[derive(Debug, Clone)]
pub struct ChannelLayout {
    pub info: ChannelInfo,
    pub kind: ChannelKind,
    pub encoding: Encoding,
    /// Offset of the first byte, relative to the record start after its id
    pub byte_offset: u32,
    pub bit_offset: u32,
    pub bit_count: u32,
    pub conversion: Conversion,
    /// Invalidation bit position inside the record's invalidation bytes
    pub invalidation_bit: Option<u32>,
    /// Every value of the channel is invalid
    pub all_invalid: bool,
}

impl ChannelLayout {
    /// Decode one sample from a record (record id already stripped)
    pub fn decode(&self, record: &[u8], record_index: u64, data_bytes: u32) -> Value {
        if self.all_invalid {
            return Value::Empty;
        }
        if let Some(bit) = self.invalidation_bit {
            let byte = data_bytes as usize + (bit / 8) as usize;
            if let Some(b) = record.get(byte) {
                if b & (1 << (bit % 8)) != 0 {
                    return Value::Empty;
                }
            }
        }

        let raw = match self.kind {
            ChannelKind::Virtual => Value::UInt(record_index),
            ChannelKind::VariableLength => return Value::Empty,
            ChannelKind::Fixed => self.decode_raw(record),
        };
        self.conversion.apply(raw)
    }

    fn decode_raw(&self, record: &[u8]) -> Value {
        let start = self.byte_offset as usize;
        let bytes = match record.get(start..) {
            Some(bytes) => bytes,
            None => return Value::Empty,
        };

        match self.encoding {
            Encoding::UInt { big_endian } => {
                extract_bits(bytes, self.bit_offset, self.bit_count, big_endian)
                    .map(Value::UInt)
                    .unwrap_or(Value::Empty)
            }
            Encoding::Int { big_endian } => {
                extract_bits(bytes, self.bit_offset, self.bit_count, big_endian)
                    .map(|raw| Value::Int(sign_extend(raw, self.bit_count)))
                    .unwrap_or(Value::Empty)
            }
            Encoding::Float { big_endian } => {
                let raw = match extract_bits(bytes, self.bit_offset, self.bit_count, big_endian) {
                    Some(raw) => raw,
                    None => return Value::Empty,
                };
                match self.bit_count {
                    16 => Value::Float(half_to_f64(raw as u16)),
                    32 => Value::Float(f32::from_bits(raw as u32) as f64),
                    64 => Value::Float(f64::from_bits(raw)),
                    _ => Value::Empty,
                }
            }
            Encoding::String(encoding) => {
                let len = (self.bit_count / 8) as usize;
                let field = match bytes.get(..len) {
                    Some(field) => field,
                    None => return Value::Empty,
                };
                Value::Text(match encoding {
                    StringEncoding::Latin1 => decode_latin1(field),
                    StringEncoding::Utf8 => decode_utf8(field),
                    StringEncoding::Utf16Le => decode_utf16(field, false),
                    StringEncoding::Utf16Be => decode_utf16(field, true),
                })
            }
            Encoding::ByteArray => {
                let len = (self.bit_count / 8) as usize;
                bytes
                    .get(..len)
                    .map(|field| Value::Text(to_hex(field)))
                    .unwrap_or(Value::Empty)
            }
            Encoding::Unknown(_) => Value::Empty,
        }
    }
}

/// One channel group and the decoding of its records
#[derive(Debug, Clone)]
pub struct ChannelGroupLayout {
    pub info: GroupInfo,
    pub record_id: u64,
    /// Record bytes holding channel data
    pub data_bytes: u32,
    /// Invalidation bytes following the data bytes (v4 only)
    pub invalidation_bytes: u32,
    /// Records of this group are variable length signal data (v4 VLSD group)
    pub variable_length: bool,
    pub channels: Vec<ChannelLayout>,
}

impl ChannelGroupLayout {
    pub fn record_size(&self) -> usize {
        self.data_bytes as usize + self.invalidation_bytes as usize
    }
}

/// A file range holding raw record bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRange {
    pub offset: u64,
    pub len: u64,
}

/// One data group: channel groups sharing a data block
#[derive(Debug, Clone)]
pub struct DataGroupLayout {
    /// Size of the record id before each record, in bytes
    pub record_id_size: u8,
    /// MDF 3 files with two record ids repeat the id after the record
    pub trailing_record_id: bool,
    /// Ranges whose concatenation forms the group's data stream
    pub data: Vec<DataRange>,
    pub groups: Vec<ChannelGroupLayout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(encoding: Encoding, byte_offset: u32, bit_offset: u32, bit_count: u32) -> ChannelLayout {
        ChannelLayout {
            info: ChannelInfo::default(),
            kind: ChannelKind::Fixed,
            encoding,
            byte_offset,
            bit_offset,
            bit_count,
            conversion: Conversion::Identity,
            invalidation_bit: None,
            all_invalid: false,
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_record_size_does_not_overflow() {
        let group = ChannelGroupLayout {
            info: GroupInfo::default(),
            record_id: 0,
            data_bytes: u32::MAX,
            invalidation_bytes: u32::MAX,
            variable_length: false,
            channels: Vec::new(),
        };
        assert_eq!(group.record_size(), 2 * u32::MAX as usize);
    }

    #[test]
    fn test_decode_numeric_types() {
        let mut record = Vec::new();
        record.extend_from_slice(&1.5f64.to_le_bytes());
        record.extend_from_slice(&(-2i16).to_le_bytes());
        record.extend_from_slice(&2.5f32.to_le_bytes());

        let double = layout(Encoding::Float { big_endian: false }, 0, 0, 64);
        let int = layout(Encoding::Int { big_endian: false }, 8, 0, 16);
        let float = layout(Encoding::Float { big_endian: false }, 10, 0, 32);

        assert_eq!(double.decode(&record, 0, 14), Value::Float(1.5));
        assert_eq!(int.decode(&record, 0, 14), Value::Int(-2));
        assert_eq!(float.decode(&record, 0, 14), Value::Float(2.5));
    }

    #[test]
    fn test_decode_bit_field() {
        let record = [0b0000_0100u8];
        let flag = layout(Encoding::UInt { big_endian: false }, 0, 2, 1);
        assert_eq!(flag.decode(&record, 0, 1), Value::UInt(1));
    }

    #[test]
    fn test_decode_string_and_bytes() {
        let record = b"abc\0\x01\x02";
        let text = layout(Encoding::String(StringEncoding::Utf8), 0, 0, 32);
        let bytes = layout(Encoding::ByteArray, 4, 0, 16);
        assert_eq!(text.decode(record, 0, 6), Value::Text("abc".to_string()));
        assert_eq!(bytes.decode(record, 0, 6), Value::Text("01 02".to_string()));
    }

    #[test]
    fn test_invalidation_bit_empties_value() {
        let record = [5u8, 0b0000_0010];
        let mut channel = layout(Encoding::UInt { big_endian: false }, 0, 0, 8);
        channel.invalidation_bit = Some(1);
        assert_eq!(channel.decode(&record, 0, 1), Value::Empty);
        channel.invalidation_bit = Some(0);
        assert_eq!(channel.decode(&record, 0, 1), Value::UInt(5));
    }

    #[test]
    fn test_virtual_channel_uses_record_index() {
        let mut channel = layout(Encoding::UInt { big_endian: false }, 0, 0, 0);
        channel.kind = ChannelKind::Virtual;
        channel.conversion = Conversion::Linear {
            offset: 0.0,
            factor: 0.01,
        };
        assert_eq!(channel.decode(&[], 3, 0), Value::Float(0.03));
    }

    #[test]
    fn test_short_record_yields_empty() {
        let channel = layout(Encoding::UInt { big_endian: false }, 4, 0, 32);
        assert_eq!(channel.decode(&[1, 2], 0, 2), Value::Empty);
    }
}
