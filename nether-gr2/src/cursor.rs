//! Bounds-checked little-endian reader over an immutable byte buffer
//!
//! Every read either succeeds in full or fails with [`Gr2Error::OutOfBounds`];
//! a failed read leaves the position unchanged.

use crate::error::{Gr2Error, Result};

/// Read cursor over a byte slice. All reads are little-endian.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a cursor positioned at `offset`
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut cursor = Self::new(data);
        cursor.seek(offset)?;
        Ok(cursor)
    }

    /// Current byte position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying data
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left from the current position
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Underlying data (for absolute offset reads)
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn out_of_bounds(&self, offset: usize, needed: usize) -> Gr2Error {
        Gr2Error::OutOfBounds {
            offset,
            needed,
            len: self.data.len(),
        }
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(self.out_of_bounds(self.pos, n));
        }
        Ok(())
    }

    /// Seek to an absolute position (the end of the buffer is a valid position)
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `n` bytes forward
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Skip padding up to the next multiple of `alignment` (a power of two)
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        debug_assert!(alignment == 0 || alignment.is_power_of_two());
        if alignment <= 1 {
            return Ok(());
        }
        let aligned = (self.pos + alignment - 1) & !(alignment - 1);
        self.skip(aligned - self.pos)
    }

    /// Independent cursor over `len` bytes starting at absolute `offset`
    ///
    /// Offsets inside the sub-cursor are relative to `offset`, and reads through it
    /// never move this cursor.
    pub fn sub_cursor(&self, offset: usize, len: usize) -> Result<ByteCursor<'a>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(offset, len))?;
        Ok(ByteCursor::new(&self.data[offset..end]))
    }

    /// Read a slice of `n` bytes without copying
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-length UTF-8 string (invalid sequences are replaced)
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a null-terminated UTF-8 string, consuming the terminator
    ///
    /// A string that runs to the end of the buffer without a terminator is out of bounds.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.out_of_bounds(self.pos, rest.len() + 1))?;
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(value)
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    pub fn read_vec4(&mut self) -> Result<[f32; 4]> {
        Ok([
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ])
    }

    /// Read a 3×3 matrix, row by row
    pub fn read_mat3(&mut self) -> Result<[[f32; 3]; 3]> {
        self.ensure(36)?;
        Ok([self.read_vec3()?, self.read_vec3()?, self.read_vec3()?])
    }

    /// Read a 4×4 matrix, row by row
    pub fn read_mat4(&mut self) -> Result<[[f32; 4]; 4]> {
        self.ensure(64)?;
        Ok([
            self.read_vec4()?,
            self.read_vec4()?,
            self.read_vec4()?,
            self.read_vec4()?,
        ])
    }
}
