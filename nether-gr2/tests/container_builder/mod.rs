//! Programmatic GR2 container generation for integration tests

#![allow(dead_code)]

use nether_gr2::{CollectionKind, FILE_INFO_SIZE, GR2_MAGIC, SECTION_DESCRIPTOR_SIZE, Transform};

const HEADER_SIZE: u32 = 32;

/// One section: codec tag, decompressed arena and relocation entries
/// `(slot_offset, target_section, target_offset)`
pub struct TestSection {
    pub codec: u32,
    pub arena: Vec<u8>,
    pub relocations: Vec<[u32; 3]>,
}

impl TestSection {
    pub fn stored(arena: Vec<u8>) -> Self {
        Self {
            codec: 0,
            arena,
            relocations: Vec::new(),
        }
    }

    pub fn with_codec(codec: u32, arena: Vec<u8>) -> Self {
        Self {
            codec,
            arena,
            relocations: Vec::new(),
        }
    }

    fn encoded(&self) -> Vec<u8> {
        match self.codec {
            1 | 2 => encode_byte_lz(&self.arena),
            3 | 4 => encode_bit_lz_literals(&self.arena),
            _ => self.arena.clone(),
        }
    }
}

/// Assemble a complete container image
pub fn build_container(sections: &[TestSection]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = sections.iter().map(TestSection::encoded).collect();

    let table_end = HEADER_SIZE as usize + 4 + sections.len() * SECTION_DESCRIPTOR_SIZE;
    let data_end = table_end + encoded.iter().map(Vec::len).sum::<usize>();

    let mut data = GR2_MAGIC.to_vec();
    push_u32(&mut data, HEADER_SIZE);
    push_u32(&mut data, 7);
    push_u32(&mut data, 0);
    push_u32(&mut data, 0);
    push_u32(&mut data, sections.len() as u32);

    let mut data_offset = table_end;
    let mut relocation_offset = data_end;
    for (section, bytes) in sections.iter().zip(&encoded) {
        let fields = [
            section.codec,
            data_offset as u32,
            bytes.len() as u32,
            section.arena.len() as u32,
            4,
            0,
            0,
            relocation_offset as u32,
            section.relocations.len() as u32,
            0,
            0,
        ];
        for field in fields {
            push_u32(&mut data, field);
        }
        data_offset += bytes.len();
        relocation_offset += section.relocations.len() * 12;
    }

    for bytes in &encoded {
        data.extend_from_slice(bytes);
    }
    for section in sections {
        for entry in &section.relocations {
            for value in entry {
                push_u32(&mut data, *value);
            }
        }
    }
    data
}

fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_le_bytes());
}

// ============================================================================
// Encoders
// ============================================================================

/// Greedy byte-oriented LZ encoder producing literal runs and back-references
pub fn encode_byte_lz(data: &[u8]) -> Vec<u8> {
    const MIN_MATCH: usize = 3;
    const MAX_MATCH: usize = 0x7F + MIN_MATCH;

    let mut out = Vec::new();
    let mut literals: Vec<u8> = Vec::new();
    let flush = |out: &mut Vec<u8>, literals: &mut Vec<u8>| {
        for chunk in literals.chunks(128) {
            out.push((chunk.len() - 1) as u8);
            out.extend_from_slice(chunk);
        }
        literals.clear();
    };

    let mut pos = 0;
    while pos < data.len() {
        let mut best = (0, 0);
        let window_start = pos.saturating_sub(u16::MAX as usize);
        for start in window_start..pos {
            let mut len = 0;
            while len < MAX_MATCH && pos + len < data.len() && data[start + len] == data[pos + len]
            {
                len += 1;
            }
            if len > best.1 {
                best = (pos - start, len);
            }
        }

        if best.1 >= MIN_MATCH {
            flush(&mut out, &mut literals);
            out.push(0x80 | (best.1 - MIN_MATCH) as u8);
            out.extend_from_slice(&(best.0 as u16).to_le_bytes());
            pos += best.1;
        } else {
            literals.push(data[pos]);
            pos += 1;
        }
    }
    flush(&mut out, &mut literals);
    out
}

/// Bit-oriented LZ stream made only of literals (flag bit 0 + 8 bits, LSB-first)
pub fn encode_bit_lz_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut accumulator = 0u32;
    let mut bits = 0;
    for &byte in data {
        accumulator |= (byte as u32) << (bits + 1);
        bits += 9;
        while bits >= 8 {
            out.push(accumulator as u8);
            accumulator >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push(accumulator as u8);
    }
    out
}

// ============================================================================
// Arenas
// ============================================================================

/// Little-endian arena writer
pub struct ArenaWriter {
    pub bytes: Vec<u8>,
}

impl ArenaWriter {
    /// Primary arena: starts with an all-zero file info table
    pub fn primary() -> Self {
        Self {
            bytes: vec![0; FILE_INFO_SIZE],
        }
    }

    pub fn bare() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn transform(&mut self, t: &Transform) -> &mut Self {
        self.u32(t.flags);
        let rows = t.scale_shear.iter().flatten();
        for value in t.position.iter().chain(&t.orientation).chain(rows) {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn cstring(&mut self, text: &str) -> u32 {
        let at = self.offset();
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        at
    }

    pub fn patch(&mut self, at: u32, value: u32) {
        let at = at as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn table_entry(&mut self, kind: CollectionKind, count: u32, pointer: u32) {
        let at = kind as u32 * 8;
        self.patch(at, count);
        self.patch(at + 4, pointer);
    }
}

/// Primary arena with skeleton "Rig" (bones "root", "arm") and model "Hero" bound to it
pub fn character_arena() -> Vec<u8> {
    let mut w = ArenaWriter::primary();
    let rig = w.cstring("Rig");
    let root = w.cstring("root");
    let arm = w.cstring("arm");
    let hero = w.cstring("Hero");

    let bones = w.offset();
    w.u32(root).i32(-1).transform(&Transform::IDENTITY);
    let mut arm_transform = Transform::IDENTITY;
    arm_transform.position = [0.0, 1.5, 0.0];
    w.u32(arm).i32(0).transform(&arm_transform);

    let skeleton = w.offset();
    w.u32(rig).u32(2).u32(bones);

    let model = w.offset();
    w.u32(hero)
        .u32(skeleton)
        .transform(&Transform::IDENTITY)
        .u32(0)
        .u32(0);

    w.table_entry(CollectionKind::Skeletons, 1, skeleton);
    w.table_entry(CollectionKind::Models, 1, model);
    w.bytes
}
