//! Assembled output of a load: one collection per record kind
//!
//! The graph always has every collection, even for kinds whose records are not
//! expanded yet; those decode to an empty sequence while keeping their declared
//! count and address, so callers can decode them from the retained arenas.

use serde::Serialize;

use crate::container::{Arena, ContainerHeader, SectionDescriptor};
use crate::records::{Mesh, Model, SectionPointer, Skeleton};

/// Top-level collections, in the order their count/pointer pairs are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Textures,
    Materials,
    Skeletons,
    VertexData,
    TriTopologies,
    Meshes,
    Models,
    TrackGroups,
    Animations,
}

impl CollectionKind {
    /// All kinds in on-disk order
    pub const ALL: [CollectionKind; 9] = [
        Self::Textures,
        Self::Materials,
        Self::Skeletons,
        Self::VertexData,
        Self::TriTopologies,
        Self::Meshes,
        Self::Models,
        Self::TrackGroups,
        Self::Animations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Textures => "textures",
            Self::Materials => "materials",
            Self::Skeletons => "skeletons",
            Self::VertexData => "vertex_data",
            Self::TriTopologies => "tri_topologies",
            Self::Meshes => "meshes",
            Self::Models => "models",
            Self::TrackGroups => "track_groups",
            Self::Animations => "animations",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Record kind whose decoder is not written yet; such collections are always empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Unexpanded {}

/// Inconsistency found while resolving; the affected records are left empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StructureIssue {
    /// Top-level count/pointer pair with exactly one side zero
    Collection {
        collection: CollectionKind,
        count: u32,
        pointer: u32,
    },
    /// Count/pointer pair inside a record (bones, mesh bindings, bone bindings)
    Nested {
        owner: CollectionKind,
        index: usize,
        field: &'static str,
        count: u32,
        pointer: u32,
    },
    /// Cross-collection pointer that matches no decoded record
    UnresolvedReference {
        owner: CollectionKind,
        index: usize,
        target: CollectionKind,
        pointer: SectionPointer,
    },
}

impl std::fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collection {
                collection,
                count,
                pointer,
            } => write!(
                f,
                "{collection}: count {count} with pointer {pointer:#x}"
            ),
            Self::Nested {
                owner,
                index,
                field,
                count,
                pointer,
            } => write!(
                f,
                "{owner}[{index}].{field}: count {count} with pointer {pointer:#x}"
            ),
            Self::UnresolvedReference {
                owner,
                index,
                target,
                pointer,
            } => write!(f, "{owner}[{index}]: no {target} record at {pointer}"),
        }
    }
}

/// One top-level collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
    /// Count stored in the file info table
    pub declared_count: u32,
    /// Stored address of the record array
    pub pointer: Option<SectionPointer>,
    /// Decoded records
    pub records: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            declared_count: 0,
            pointer: None,
            records: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Declared vs decoded record count of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub kind: CollectionKind,
    pub declared: u32,
    pub decoded: usize,
}

/// Everything loaded from one container
///
/// Immutable once returned; consumers only read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileGraph {
    pub header: ContainerHeader,
    pub sections: Vec<SectionDescriptor>,

    pub textures: Collection<Unexpanded>,
    pub materials: Collection<Unexpanded>,
    pub skeletons: Collection<Skeleton>,
    pub vertex_data: Collection<Unexpanded>,
    pub tri_topologies: Collection<Unexpanded>,
    pub meshes: Collection<Mesh>,
    pub models: Collection<Model>,
    pub track_groups: Collection<Unexpanded>,
    pub animations: Collection<Unexpanded>,

    /// Recovered inconsistencies, in the order they were found
    pub issues: Vec<StructureIssue>,

    #[serde(skip)]
    pub(crate) arenas: Vec<Arena>,
}

impl FileGraph {
    /// Decompressed arena of a section (empty when arenas were not retained)
    pub fn arena(&self, section: usize) -> Option<&Arena> {
        self.arenas.get(section)
    }

    pub fn arenas(&self) -> &[Arena] {
        &self.arenas
    }

    /// Skeleton a model is bound to
    pub fn skeleton_for(&self, model: &Model) -> Option<&Skeleton> {
        model.skeleton.and_then(|i| self.skeletons.get(i))
    }

    /// Resolved meshes of a model, in binding order
    pub fn meshes_for<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a Mesh> + 'a {
        model
            .mesh_bindings
            .iter()
            .filter_map(|binding| binding.mesh.and_then(|i| self.meshes.get(i)))
    }

    pub fn find_skeleton(&self, name: &str) -> Option<&Skeleton> {
        self.skeletons
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
    }

    pub fn find_model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name.as_deref() == Some(name))
    }

    /// Declared and decoded counts for every collection, in on-disk order
    pub fn summary(&self) -> [CollectionSummary; 9] {
        CollectionKind::ALL.map(|kind| {
            let (declared, decoded) = match kind {
                CollectionKind::Textures => counts(&self.textures),
                CollectionKind::Materials => counts(&self.materials),
                CollectionKind::Skeletons => counts(&self.skeletons),
                CollectionKind::VertexData => counts(&self.vertex_data),
                CollectionKind::TriTopologies => counts(&self.tri_topologies),
                CollectionKind::Meshes => counts(&self.meshes),
                CollectionKind::Models => counts(&self.models),
                CollectionKind::TrackGroups => counts(&self.track_groups),
                CollectionKind::Animations => counts(&self.animations),
            };
            CollectionSummary {
                kind,
                declared,
                decoded,
            }
        })
    }
}

fn counts<T>(collection: &Collection<T>) -> (u32, usize) {
    (collection.declared_count, collection.len())
}
