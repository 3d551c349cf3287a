//! Per-section decompression
//!
//! Each section names its codec with a 32-bit tag. Decoders are pure functions of
//! their input and always produce exactly the declared number of bytes, so sections
//! can be decoded independently and in parallel.
//!
//! # Codec families
//!
//! - `None`: stored bytes, copied verbatim
//! - `Oodle0` / `Oodle1`: byte-oriented LZ77 ([`byte_lz`])
//! - `Bitknit1` / `Bitknit2`: bit-oriented LZ77, LSB-first bit packing ([`bit_lz`])

mod bit_lz;
mod byte_lz;


use serde::{Deserialize, Serialize};

use crate::error::{Gr2Error, Result};

pub use bit_lz::decompress_bit_lz;
pub use byte_lz::decompress_byte_lz;

/// Upper bound on output capacity reserved up front; declared sizes are untrusted,
/// so larger outputs grow as bytes are produced
pub(crate) const MAX_PREALLOCATION: usize = 1 << 24;

/// Section compression tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Codec {
    None = 0,
    Oodle0 = 1,
    Oodle1 = 2,
    Bitknit1 = 3,
    Bitknit2 = 4,
}

impl Codec {
    /// Map an on-disk tag to a codec
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Oodle0),
            2 => Some(Self::Oodle1),
            3 => Some(Self::Bitknit1),
            4 => Some(Self::Bitknit2),
            _ => None,
        }
    }

    /// On-disk tag
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Human-readable name (for logging)
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Oodle0 => "oodle0",
            Self::Oodle1 => "oodle1",
            Self::Bitknit1 => "bitknit1",
            Self::Bitknit2 => "bitknit2",
        }
    }
}

/// Decompress one section's bytes
///
/// # Arguments
/// * `input` - Compressed bytes as stored in the container
/// * `expected_size` - Declared decompressed size; the output has exactly this length
/// * `tag` - Compression tag from the section descriptor
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decompressed arena bytes
/// * `Err(Gr2Error)` - `UnsupportedCodec`, `SizeMismatch` or `CorruptStream`
pub fn decompress(input: &[u8], expected_size: usize, tag: u32) -> Result<Vec<u8>> {
    let codec = Codec::from_tag(tag).ok_or(Gr2Error::UnsupportedCodec { tag })?;

    match codec {
        Codec::None => {
            if input.len() != expected_size {
                return Err(Gr2Error::SizeMismatch {
                    expected: expected_size,
                    actual: input.len(),
                });
            }
            Ok(input.to_vec())
        }
        Codec::Oodle0 | Codec::Oodle1 => decompress_byte_lz(input, expected_size),
        Codec::Bitknit1 | Codec::Bitknit2 => decompress_bit_lz(input, expected_size),
    }
}

/// Copy `length` bytes from `distance` bytes back, one byte at a time
///
/// Source and destination may overlap (distance < length), which repeats the tail of
/// the output. Copies stop at `limit` bytes of output.
pub(crate) fn copy_back_reference(
    output: &mut Vec<u8>,
    distance: usize,
    length: usize,
    limit: usize,
) -> Result<()> {
    if distance == 0 || distance > output.len() {
        return Err(Gr2Error::CorruptStream {
            position: output.len(),
            reason: "back-reference before start of output",
        });
    }

    let count = length.min(limit - output.len());
    for _ in 0..count {
        let byte = output[output.len() - distance];
        output.push(byte);
    }
    Ok(())
}
