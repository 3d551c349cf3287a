//! Bit-oriented LZ77 decoder (Bitknit1/Bitknit2 sections)
//!
//! Bits are consumed least-significant first. Each token starts with one flag bit:
//!
//! ```text
//! 0: literal        - 8 bits, one output byte
//! 1: back-reference - 4 bits (+1) offset width, offset,
//!                     4 bits length width, length - 3,
//!                     copy from output position (pos - offset - 1)
//! ```

use super::{MAX_PREALLOCATION, copy_back_reference};
use crate::error::{Gr2Error, Result};

/// Decompress a bit-oriented LZ stream into exactly `output_length` bytes
pub fn decompress_bit_lz(input: &[u8], output_length: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(output_length.min(MAX_PREALLOCATION));
    let mut reader = BitReader::new(input);

    while output.len() < output_length {
        let position = output.len();

        if reader.read_bits(1, position)? == 0 {
            output.push(reader.read_bits(8, position)? as u8);
            continue;
        }

        let offset_bits = reader.read_bits(4, position)? + 1;
        let offset = reader.read_bits(offset_bits, position)? as usize;
        let length_bits = reader.read_bits(4, position)?;
        let length = reader.read_bits(length_bits, position)? as usize + 3;

        copy_back_reference(&mut output, offset + 1, length, output_length)?;
    }

    Ok(output)
}

/// LSB-first bit reader with an explicit accumulator
///
/// Whole bytes are shifted in above the bits still pending; at most 16 bits are
/// requested at once, so the accumulator never holds more than 23 bits.
struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    accumulator: u32,
    available: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            accumulator: 0,
            available: 0,
        }
    }

    /// Read `count` bits (0..=16); `position` is only used for error context
    fn read_bits(&mut self, count: u32, position: usize) -> Result<u32> {
        debug_assert!(count <= 16);

        while self.available < count {
            let Some(&byte) = self.data.get(self.byte_pos) else {
                return Err(Gr2Error::CorruptStream {
                    position,
                    reason: "bit stream exhausted before output was filled",
                });
            };
            self.accumulator |= (byte as u32) << self.available;
            self.available += 8;
            self.byte_pos += 1;
        }

        let value = self.accumulator & ((1u32 << count) - 1);
        self.accumulator >>= count;
        self.available -= count;
        Ok(value)
    }
}
