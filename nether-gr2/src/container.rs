//! GR2 container: header, section table and per-section arenas
//!
//! # Layout
//! ```text
//! 0x00: magic [u8; 16]
//! 0x10: header_size u32
//! 0x14: header_format u32
//! 0x18: reserved [u32; 2]
//! header_size:      section_count u32
//! header_size + 4:  section descriptors (section_count × 44 bytes)
//! ```
//!
//! Section bytes live at each descriptor's `data_offset` in the original buffer.
//! Relocation (12-byte) and mixed-marshalling (16-byte) entries are also addressed
//! from the start of the original buffer.

use hashbrown::HashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::compression::{self, Codec};
use crate::cursor::ByteCursor;
use crate::error::{Gr2Error, Result};
use crate::options::LoadOptions;
use crate::records::SectionPointer;
use crate::{GR2_MAGIC, SECTION_DESCRIPTOR_SIZE};

/// Fixed container header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
    pub magic: [u8; 16],
    pub header_size: u32,
    pub header_format: u32,
    pub reserved: [u32; 2],
}

impl ContainerHeader {
    /// Bytes from the magic through the reserved words
    pub const SIZE: usize = 32;

    /// Read and validate the header; a magic mismatch fails before anything else is read
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let data = cursor.data();
        let found = cursor.read_bytes(16).map_err(|_| Gr2Error::InvalidFormat {
            found: data[..data.len().min(16)].to_vec(),
        })?;
        if found != GR2_MAGIC {
            return Err(Gr2Error::InvalidFormat {
                found: found.to_vec(),
            });
        }
        let mut magic = [0u8; 16];
        magic.copy_from_slice(found);

        Ok(Self {
            magic,
            header_size: cursor.read_u32()?,
            header_format: cursor.read_u32()?,
            reserved: [cursor.read_u32()?, cursor.read_u32()?],
        })
    }
}

/// One entry of the section table (44 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionDescriptor {
    pub compression: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub decompressed_size: u32,
    pub alignment: u32,
    pub first_16bit: u32,
    pub first_8bit: u32,
    pub relocations_offset: u32,
    pub relocations_count: u32,
    pub mixed_marshalling_offset: u32,
    pub mixed_marshalling_count: u32,
}

impl SectionDescriptor {
    pub const SIZE: usize = SECTION_DESCRIPTOR_SIZE;

    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            compression: cursor.read_u32()?,
            data_offset: cursor.read_u32()?,
            data_size: cursor.read_u32()?,
            decompressed_size: cursor.read_u32()?,
            alignment: cursor.read_u32()?,
            first_16bit: cursor.read_u32()?,
            first_8bit: cursor.read_u32()?,
            relocations_offset: cursor.read_u32()?,
            relocations_count: cursor.read_u32()?,
            mixed_marshalling_offset: cursor.read_u32()?,
            mixed_marshalling_count: cursor.read_u32()?,
        })
    }

    /// Codec named by the compression tag, if known
    pub fn codec(&self) -> Option<Codec> {
        Codec::from_tag(self.compression)
    }

    /// Stored bytes of this section within the original buffer
    pub fn stored_bytes<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.data_offset as usize;
        let cursor = ByteCursor::new(data);
        Ok(cursor.sub_cursor(start, self.data_size as usize)?.data())
    }
}

/// Relocation entry: the pointer slot at `slot_offset` addresses `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub slot_offset: u32,
    pub target: SectionPointer,
}

impl Relocation {
    pub const SIZE: usize = 12;
}

/// Mixed-marshalling entry (retained, not applied)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarshallingEntry {
    pub count: u32,
    pub offset: u32,
    pub type_section: u32,
    pub type_offset: u32,
}

impl MarshallingEntry {
    pub const SIZE: usize = 16;
}

/// Decompressed bytes of one section; offsets inside it are relative to its start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena {
    section: u32,
    bytes: Vec<u8>,
}

impl Arena {
    pub fn new(section: u32, bytes: Vec<u8>) -> Self {
        Self { section, bytes }
    }

    pub fn section(&self) -> u32 {
        self.section
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cursor positioned at `offset`
    pub fn cursor_at(&self, offset: usize) -> Result<ByteCursor<'_>> {
        ByteCursor::at(&self.bytes, offset)
    }
}

/// Relocations of every section, keyed by (section, slot offset)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationIndex {
    slots: HashMap<(u32, u32), SectionPointer>,
}

impl RelocationIndex {
    pub fn get(&self, section: u32, slot_offset: u32) -> Option<SectionPointer> {
        self.slots.get(&(section, slot_offset)).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A validated container with every section decompressed
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub header: ContainerHeader,
    pub sections: Vec<SectionDescriptor>,
    /// One arena per section, indexed like `sections`
    pub arenas: Vec<Arena>,
    /// Relocation entries per section (empty when relocations are not applied)
    pub relocations: Vec<Vec<Relocation>>,
    /// Mixed-marshalling entries per section
    pub marshalling: Vec<Vec<MarshallingEntry>>,
}

impl Container {
    /// Index relocations by slot, checking every entry against the section table
    pub fn relocation_index(&self) -> Result<RelocationIndex> {
        let mut slots = HashMap::new();
        for (section, entries) in self.relocations.iter().enumerate() {
            let section = section as u32;
            let arena_len = self.arenas.get(section as usize).map_or(0, Arena::len);
            for entry in entries {
                let target = entry.target;
                let slot_fits = (entry.slot_offset as usize)
                    .checked_add(4)
                    .is_some_and(|end| end <= arena_len);
                let target_fits = self
                    .arenas
                    .get(target.section as usize)
                    .is_some_and(|arena| target.offset as usize <= arena.len());
                if !slot_fits || !target_fits {
                    return Err(Gr2Error::DanglingRelocation {
                        section,
                        slot: entry.slot_offset,
                        target_section: target.section,
                    });
                }
                slots.insert((section, entry.slot_offset), target);
            }
        }
        Ok(RelocationIndex { slots })
    }
}

/// Validate the header, read the section table and decompress every section
///
/// # Arguments
/// * `data` - Complete container image
/// * `options` - Load options (relocations, parallel decompression)
///
/// # Returns
/// * `Ok(Container)` - Header, descriptors and one arena per section
/// * `Err(Gr2Error)` - First fatal error; no partial container is returned
pub fn load_container(data: &[u8], options: &LoadOptions) -> Result<Container> {
    let mut cursor = ByteCursor::new(data);
    let header = ContainerHeader::read(&mut cursor)?;

    cursor.seek(header.header_size as usize)?;
    let section_count = cursor.read_u32()? as usize;
    if section_count > cursor.remaining() / SECTION_DESCRIPTOR_SIZE {
        return Err(Gr2Error::OutOfBounds {
            offset: cursor.position(),
            needed: section_count.saturating_mul(SECTION_DESCRIPTOR_SIZE),
            len: data.len(),
        });
    }

    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        sections.push(SectionDescriptor::read(&mut cursor)?);
    }
    debug!(
        "GR2 header: format {}, {} sections",
        header.header_format, section_count
    );

    let arenas = decompress_sections(data, &sections, options)?;

    let mut relocations = Vec::with_capacity(section_count);
    let mut marshalling = Vec::with_capacity(section_count);
    for (index, section) in sections.iter().enumerate() {
        let entries = if options.apply_relocations {
            read_relocations(data, section)
                .map_err(|e| e.in_section(index, section.compression))?
        } else {
            Vec::new()
        };
        trace!("section {}: {} relocations", index, entries.len());
        relocations.push(entries);

        let entries = read_marshalling(data, section)
            .map_err(|e| e.in_section(index, section.compression))?;
        if !entries.is_empty() {
            debug!(
                "section {}: {} mixed-marshalling entries retained, not applied",
                index,
                entries.len()
            );
        }
        marshalling.push(entries);
    }

    Ok(Container {
        header,
        sections,
        arenas,
        relocations,
        marshalling,
    })
}

fn decompress_section(data: &[u8], index: usize, section: &SectionDescriptor) -> Result<Arena> {
    let wrap = |e: Gr2Error| e.in_section(index, section.compression);

    let stored = section.stored_bytes(data).map_err(wrap)?;
    let bytes = compression::decompress(
        stored,
        section.decompressed_size as usize,
        section.compression,
    )
    .map_err(wrap)?;

    debug!(
        "section {}: {} -> {} bytes ({})",
        index,
        stored.len(),
        bytes.len(),
        section.codec().map_or("unknown", Codec::name)
    );
    Ok(Arena::new(index as u32, bytes))
}

#[cfg(feature = "parallel")]
fn decompress_sections(
    data: &[u8],
    sections: &[SectionDescriptor],
    options: &LoadOptions,
) -> Result<Vec<Arena>> {
    use rayon::prelude::*;

    if options.parallel_decompression && sections.len() > 1 {
        return sections
            .par_iter()
            .enumerate()
            .map(|(index, section)| decompress_section(data, index, section))
            .collect();
    }
    decompress_sequential(data, sections)
}

#[cfg(not(feature = "parallel"))]
fn decompress_sections(
    data: &[u8],
    sections: &[SectionDescriptor],
    _options: &LoadOptions,
) -> Result<Vec<Arena>> {
    decompress_sequential(data, sections)
}

fn decompress_sequential(data: &[u8], sections: &[SectionDescriptor]) -> Result<Vec<Arena>> {
    sections
        .iter()
        .enumerate()
        .map(|(index, section)| decompress_section(data, index, section))
        .collect()
}

/// Bounds-checked cursor over a table of `count` fixed-size entries
fn table_cursor(data: &[u8], offset: u32, count: u32, entry_size: usize) -> Result<ByteCursor<'_>> {
    let len = (count as usize)
        .checked_mul(entry_size)
        .ok_or(Gr2Error::OutOfBounds {
            offset: offset as usize,
            needed: usize::MAX,
            len: data.len(),
        })?;
    ByteCursor::new(data).sub_cursor(offset as usize, len)
}

fn read_relocations(data: &[u8], section: &SectionDescriptor) -> Result<Vec<Relocation>> {
    if section.relocations_count == 0 {
        return Ok(Vec::new());
    }
    let mut cursor = table_cursor(
        data,
        section.relocations_offset,
        section.relocations_count,
        Relocation::SIZE,
    )?;

    let mut entries = Vec::with_capacity(section.relocations_count as usize);
    for _ in 0..section.relocations_count {
        let slot_offset = cursor.read_u32()?;
        let target_section = cursor.read_u32()?;
        let target_offset = cursor.read_u32()?;
        entries.push(Relocation {
            slot_offset,
            target: SectionPointer::new(target_section, target_offset),
        });
    }
    Ok(entries)
}

fn read_marshalling(data: &[u8], section: &SectionDescriptor) -> Result<Vec<MarshallingEntry>> {
    if section.mixed_marshalling_count == 0 {
        return Ok(Vec::new());
    }
    let mut cursor = table_cursor(
        data,
        section.mixed_marshalling_offset,
        section.mixed_marshalling_count,
        MarshallingEntry::SIZE,
    )?;

    let mut entries = Vec::with_capacity(section.mixed_marshalling_count as usize);
    for _ in 0..section.mixed_marshalling_count {
        entries.push(MarshallingEntry {
            count: cursor.read_u32()?,
            offset: cursor.read_u32()?,
            type_section: cursor.read_u32()?,
            type_offset: cursor.read_u32()?,
        });
    }
    Ok(entries)
}
