//! Byte-oriented LZ77 decoder (Oodle0/Oodle1 sections)
//!
//! # Stream layout
//! ```text
//! control < 0x80:  literal run, (control + 1) raw bytes follow
//! control >= 0x80: back-reference, u16 LE distance follows,
//!                  length = (control & 0x7F) + 3
//! ```

use super::{MAX_PREALLOCATION, copy_back_reference};
use crate::error::{Gr2Error, Result};

/// Decompress a byte-oriented LZ stream into exactly `output_length` bytes
pub fn decompress_byte_lz(input: &[u8], output_length: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(output_length.min(MAX_PREALLOCATION));
    let mut pos = 0;

    while output.len() < output_length {
        let Some(&control) = input.get(pos) else {
            return Err(exhausted(&output));
        };
        pos += 1;

        if control < 0x80 {
            let run = (control as usize + 1).min(output_length - output.len());
            let literals = input.get(pos..pos + run).ok_or_else(|| exhausted(&output))?;
            output.extend_from_slice(literals);
            pos += run;
        } else {
            let length = (control & 0x7F) as usize + 3;
            let distance = input.get(pos..pos + 2).ok_or_else(|| exhausted(&output))?;
            let distance = u16::from_le_bytes([distance[0], distance[1]]) as usize;
            pos += 2;
            copy_back_reference(&mut output, distance, length, output_length)?;
        }
    }

    Ok(output)
}

fn exhausted(output: &[u8]) -> Gr2Error {
    Gr2Error::CorruptStream {
        position: output.len(),
        reason: "input exhausted before output was filled",
    }
}
