//! Nether-GR2: loader for GR2 (Granny) binary 3D asset containers
//!
//! This crate reads a complete GR2 container image and produces a [`FileGraph`]:
//! typed skeletons, meshes and models with their cross-references resolved, plus
//! the decompressed section arenas for anything not expanded into records.
//!
//! # Key Features
//!
//! - **Pure Rust**: all four section codecs are decoded in-crate
//! - **Bounds-checked**: every read goes through [`ByteCursor`]; corrupt input yields
//!   an error, never a panic
//! - **Forward references**: model -> skeleton/mesh links are matched by address after
//!   every collection is decoded, so record order in the file does not matter
//! - **Recoverable structure issues**: inconsistent count/pointer pairs leave the
//!   affected collection empty instead of failing the whole load
//!
//! # Container Overview
//!
//! A container holds:
//! - A 16-byte magic and a fixed header
//! - A section table (compression tag, offsets, sizes, relocation tables)
//! - Section bodies, each stored or compressed
//!
//! Section 0 (the primary arena) starts with the file info table, which addresses
//! every top-level collection.
//!
//! # Usage
//!
//! ```ignore
//! use nether_gr2::load_gr2;
//!
//! let data = std::fs::read("character.gr2").unwrap();
//! let graph = load_gr2(&data).unwrap();
//!
//! for model in &graph.models {
//!     let skeleton = graph.skeleton_for(model);
//!     println!("{:?}: {} bones", model.name, skeleton.map_or(0, |s| s.bones.len()));
//! }
//! ```

pub mod compression;
pub mod container;
pub mod cursor;
mod error;
mod graph;
mod options;
mod records;
mod resolver;

pub use compression::{Codec, decompress};
pub use container::{
    Arena, Container, ContainerHeader, MarshallingEntry, Relocation, RelocationIndex,
    SectionDescriptor, load_container,
};
pub use cursor::ByteCursor;
pub use error::{ErrorKind, Gr2Error, Result};
pub use graph::{
    Collection, CollectionKind, CollectionSummary, FileGraph, StructureIssue, Unexpanded,
};
pub use options::{LayoutProfile, LoadOptions};
pub use records::{
    Bone, BoneBinding, ExtendedDataRef, Mesh, MeshBinding, Model, SectionPointer, Skeleton,
    Transform,
};
pub use resolver::{FILE_INFO_SIZE, resolve};

/// Magic bytes at the start of every GR2 container
pub const GR2_MAGIC: [u8; 16] = [
    0xB8, 0x67, 0xB0, 0xCA, 0xF8, 0x6D, 0xB1, 0x0F, 0x84, 0x72, 0x8C, 0x7E, 0x5E, 0x19, 0x00, 0x1E,
];

/// Size of one section table entry
pub const SECTION_DESCRIPTOR_SIZE: usize = 44;

/// Load a GR2 container with default options
///
/// # Arguments
/// * `data` - Complete container image
///
/// # Returns
/// * `Ok(FileGraph)` - Resolved records; recovered issues are listed in `issues`
/// * `Err(Gr2Error)` - First fatal error
pub fn load_gr2(data: &[u8]) -> Result<FileGraph> {
    load_gr2_with(data, &LoadOptions::default())
}

/// Load a GR2 container with explicit options
pub fn load_gr2_with(data: &[u8], options: &LoadOptions) -> Result<FileGraph> {
    let container = load_container(data, options)?;
    resolve(container, options)
}
