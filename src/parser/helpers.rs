//! Helper functions for MDF record decoding
//!
//! Bit extraction and sign extension for integer channels of arbitrary
//! width, plus the text decodings used by string channels and TX blocks.

/// Sign-extend the low `bits` bits of `value` to i64
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Extract `bit_count` bits starting `bit_offset` bits into `bytes`
///
/// `bytes` must start at the channel's first byte. The covering bytes are
/// assembled in the channel's byte order before shifting by `bit_offset`.
pub fn extract_bits(bytes: &[u8], bit_offset: u32, bit_count: u32, big_endian: bool) -> Option<u64> {
    if bit_count == 0 || bit_count > 64 {
        return None;
    }
    let needed = ((bit_offset + bit_count + 7) / 8) as usize;
    let window = bytes.get(..needed)?;

    let mut raw = 0u128;
    if big_endian {
        for b in window {
            raw = (raw << 8) | *b as u128;
        }
    } else {
        for b in window.iter().rev() {
            raw = (raw << 8) | *b as u128;
        }
    }
    raw >>= bit_offset;

    let mask = if bit_count == 64 {
        u64::MAX as u128
    } else {
        (1u128 << bit_count) - 1
    };
    Some((raw & mask) as u64)
}

/// Convert IEEE 754 half precision bits to f64
pub fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1f) as i32;
    let fraction = (bits & 0x3ff) as f64;
    match exponent {
        0 => sign * fraction * 2f64.powi(-24),
        0x1f => {
            if fraction == 0.0 {
                sign * f64::INFINITY
            } else {
                f64::NAN
            }
        }
        _ => sign * (1.0 + fraction / 1024.0) * 2f64.powi(exponent - 15),
    }
}

/// Cut a byte string at its first NUL
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Decode Latin-1 text up to the first NUL, trailing blanks removed
pub fn decode_latin1(bytes: &[u8]) -> String {
    trim_nul(bytes)
        .iter()
        .map(|b| *b as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Decode UTF-8 text up to the first NUL
pub fn decode_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_nul(bytes)).into_owned()
}

/// Decode UTF-16 text up to the first NUL code unit
pub fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Render raw bytes as space separated hex
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
