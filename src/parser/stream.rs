use crate::error::{ConvertError, Result};

/// Cursor over the bytes of one block, with a fixed byte order
pub struct MdfDataStream<'a> {
    data: &'a [u8],
    pub pos: usize,
    big_endian: bool,
}

impl<'a> MdfDataStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            big_endian: false,
        }
    }

    pub fn with_big_endian(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            data,
            pos: 0,
            big_endian,
        }
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .ok_or(ConvertError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(ConvertError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let buf = self.read_array::<2>()?;
        Ok(if self.big_endian {
            u16::from_be_bytes(buf)
        } else {
            u16::from_le_bytes(buf)
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let buf = self.read_array::<4>()?;
        Ok(if self.big_endian {
            u32::from_be_bytes(buf)
        } else {
            u32::from_le_bytes(buf)
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let buf = self.read_array::<8>()?;
        Ok(if self.big_endian {
            u64::from_be_bytes(buf)
        } else {
            u64::from_le_bytes(buf)
        })
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read an unsigned integer of `size` bytes (0..=8); 0 yields 0
    pub fn read_uint_sized(&mut self, size: usize) -> Result<u64> {
        let bytes = self.read_bytes(size)?;
        let mut value = 0u64;
        if self.big_endian {
            for b in bytes {
                value = (value << 8) | *b as u64;
            }
        } else {
            for b in bytes.iter().rev() {
                value = (value << 8) | *b as u64;
            }
        }
        Ok(value)
    }

    /// Read a fixed-width, NUL padded Latin-1 field
    pub fn read_fixed_str(&mut self, size: usize) -> Result<String> {
        let bytes = self.read_bytes(size)?;
        Ok(crate::parser::helpers::decode_latin1(bytes))
    }
}
