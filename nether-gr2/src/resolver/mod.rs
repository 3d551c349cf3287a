//! Record resolution: arenas -> typed records
//!
//! The primary arena (section 0) starts with the file info table: nine
//! `(count u32, pointer u32)` pairs, one per [`CollectionKind`] in on-disk order.
//! Each consistent pair addresses a fixed-stride record array.
//!
//! Names and inline aggregates are resolved immediately, and so are arrays reached
//! through nested count/pointer pairs. References between top-level collections
//! (model -> skeleton, model -> mesh) are kept as addresses until every collection
//! is decoded, then matched against each record's on-disk address.
//!
//! # Record layouts
//! ```text
//! Skeleton: name ptr, bone_count u32, bones ptr [, lod_type i32]
//! Bone:     name ptr, parent_index i32, transform (68)
//!           [, inverse_world 4x4 f32, lod_error f32, ext type ptr, ext object ptr]
//! Model:    name ptr, skeleton ptr, transform (68), mesh_binding_count u32, mesh_bindings ptr
//!           mesh binding: mesh ptr
//! Mesh:     name ptr, vertex_data ptr, morph_count u32, morphs ptr, topology ptr,
//!           material_binding_count u32, material_bindings ptr,
//!           bone_binding_count u32, bone_bindings ptr, ext type ptr, ext object ptr
//!           bone binding: name ptr, obb_min [f32; 3], obb_max [f32; 3],
//!                         triangle_count u32, triangle_indices ptr
//! ```
//! Bracketed fields are only present with [`LayoutProfile::Extended`].

#[cfg(test)]
mod tests;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::container::{Arena, Container, RelocationIndex};
use crate::cursor::ByteCursor;
use crate::error::{Gr2Error, Result};
use crate::graph::{Collection, CollectionKind, FileGraph, StructureIssue};
use crate::options::{LayoutProfile, LoadOptions};
use crate::records::{
    Bone, BoneBinding, ExtendedDataRef, Mesh, MeshBinding, Model, SectionPointer, Skeleton,
    Transform,
};

/// Size of the file info table at the start of the primary arena
pub const FILE_INFO_SIZE: usize = CollectionKind::ALL.len() * 8;

type TableEntry = (u32, Option<SectionPointer>);

/// Resolve every collection of a loaded container into a [`FileGraph`]
///
/// Recoverable inconsistencies leave the affected collection empty and are listed in
/// [`FileGraph::issues`]; any other error aborts resolution.
pub fn resolve(container: Container, options: &LoadOptions) -> Result<FileGraph> {
    let relocations = if options.apply_relocations {
        container.relocation_index()?
    } else {
        RelocationIndex::default()
    };
    let Container {
        header,
        sections,
        arenas,
        ..
    } = container;

    if arenas.is_empty() {
        return Err(Gr2Error::EmptyContainer);
    }

    let mut resolver = Resolver::new(&arenas, relocations, options.layout);
    let table = resolver.read_file_info()?;
    let entry = |kind: CollectionKind| table[kind as usize];

    let textures = resolver.unexpanded(CollectionKind::Textures, entry(CollectionKind::Textures));
    let materials =
        resolver.unexpanded(CollectionKind::Materials, entry(CollectionKind::Materials));
    let skeletons = resolver.decode_collection(
        CollectionKind::Skeletons,
        entry(CollectionKind::Skeletons),
        options.layout.skeleton_stride(),
        Resolver::read_skeleton,
    )?;
    let vertex_data =
        resolver.unexpanded(CollectionKind::VertexData, entry(CollectionKind::VertexData));
    let tri_topologies = resolver.unexpanded(
        CollectionKind::TriTopologies,
        entry(CollectionKind::TriTopologies),
    );
    let meshes = resolver.decode_collection(
        CollectionKind::Meshes,
        entry(CollectionKind::Meshes),
        Mesh::SIZE,
        Resolver::read_mesh,
    )?;
    let mut models = resolver.decode_collection(
        CollectionKind::Models,
        entry(CollectionKind::Models),
        Model::SIZE,
        Resolver::read_model,
    )?;
    let track_groups =
        resolver.unexpanded(CollectionKind::TrackGroups, entry(CollectionKind::TrackGroups));
    let animations =
        resolver.unexpanded(CollectionKind::Animations, entry(CollectionKind::Animations));

    let mut issues = resolver.finish();
    link_references(&skeletons, &meshes, &mut models, &mut issues);

    Ok(FileGraph {
        header,
        sections,
        textures,
        materials,
        skeletons,
        vertex_data,
        tri_topologies,
        meshes,
        models,
        track_groups,
        animations,
        issues,
        arenas: if options.retain_arenas {
            arenas
        } else {
            Vec::new()
        },
    })
}

/// Walks arenas and decodes records
struct Resolver<'a> {
    arenas: &'a [Arena],
    relocations: RelocationIndex,
    layout: LayoutProfile,
    issues: Vec<StructureIssue>,
}

impl<'a> Resolver<'a> {
    fn new(arenas: &'a [Arena], relocations: RelocationIndex, layout: LayoutProfile) -> Self {
        Self {
            arenas,
            relocations,
            layout,
            issues: Vec::new(),
        }
    }

    fn finish(self) -> Vec<StructureIssue> {
        self.issues
    }

    fn cursor_at(&self, pointer: SectionPointer) -> Result<ByteCursor<'a>> {
        let arena = self
            .arenas
            .get(pointer.section as usize)
            .ok_or(Gr2Error::OutOfBounds {
                offset: pointer.offset as usize,
                needed: 0,
                len: 0,
            })?;
        arena.cursor_at(pointer.offset as usize)
    }

    /// Cursor over `count` records of `stride` bytes, checked before anything is allocated
    fn array_cursor(
        &self,
        pointer: SectionPointer,
        count: u32,
        stride: usize,
    ) -> Result<ByteCursor<'a>> {
        let cursor = self.cursor_at(pointer)?;
        let needed = (count as usize).saturating_mul(stride);
        if needed > cursor.remaining() {
            return Err(Gr2Error::OutOfBounds {
                offset: cursor.position(),
                needed,
                len: cursor.len(),
            });
        }
        Ok(cursor)
    }

    /// Read a pointer slot of `section`
    ///
    /// A relocation covering the slot wins over the stored value; otherwise the stored
    /// value is an offset into the same section and 0 means absent.
    fn read_pointer(
        &self,
        cursor: &mut ByteCursor<'a>,
        section: u32,
    ) -> Result<Option<SectionPointer>> {
        let slot = cursor.position() as u32;
        let raw = cursor.read_u32()?;
        if let Some(target) = self.relocations.get(section, slot) {
            return Ok(Some(target));
        }
        Ok((raw != 0).then_some(SectionPointer::new(section, raw)))
    }

    fn read_name(&self, pointer: Option<SectionPointer>) -> Result<Option<String>> {
        pointer
            .map(|pointer| self.cursor_at(pointer)?.read_cstring())
            .transpose()
    }

    /// Check a count/pointer pair; an inconsistent pair is recorded and yields nothing
    fn checked_pair(
        &mut self,
        count: u32,
        pointer: Option<SectionPointer>,
        issue: impl FnOnce(u32) -> StructureIssue,
    ) -> Option<SectionPointer> {
        match (count, pointer) {
            (0, None) => None,
            (1.., Some(pointer)) => Some(pointer),
            _ => {
                let issue = issue(pointer.map_or(0, |p| p.offset));
                warn!("{}", Gr2Error::CorruptStructure(issue.clone()));
                self.issues.push(issue);
                None
            }
        }
    }

    fn read_file_info(&mut self) -> Result<[TableEntry; 9]> {
        let mut cursor = self.cursor_at(SectionPointer::new(0, 0))?;
        let mut table = [(0, None); 9];
        for entry in table.iter_mut() {
            let count = cursor.read_u32()?;
            let pointer = self.read_pointer(&mut cursor, 0)?;
            *entry = (count, pointer);
        }
        Ok(table)
    }

    fn unexpanded<T>(&mut self, kind: CollectionKind, (count, pointer): TableEntry) -> Collection<T> {
        self.checked_pair(count, pointer, |raw| StructureIssue::Collection {
            collection: kind,
            count,
            pointer: raw,
        });
        if count > 0 {
            debug!("{}: {} records declared, not expanded", kind, count);
        }
        Collection {
            declared_count: count,
            pointer,
            records: Vec::new(),
        }
    }

    fn decode_collection<T>(
        &mut self,
        kind: CollectionKind,
        (count, pointer): TableEntry,
        stride: usize,
        mut read: impl FnMut(&mut Self, &mut ByteCursor<'a>, SectionPointer, usize) -> Result<T>,
    ) -> Result<Collection<T>> {
        let mut collection = Collection {
            declared_count: count,
            pointer,
            records: Vec::new(),
        };
        let Some(base) = self.checked_pair(count, pointer, |raw| StructureIssue::Collection {
            collection: kind,
            count,
            pointer: raw,
        }) else {
            return Ok(collection);
        };

        let mut cursor = self.array_cursor(base, count, stride)?;
        collection.records.reserve(count as usize);
        for index in 0..count as usize {
            let origin = SectionPointer::new(base.section, cursor.position() as u32);
            let record = read(self, &mut cursor, origin, index)?;
            debug_assert_eq!(cursor.position(), origin.offset as usize + stride);
            collection.records.push(record);
        }

        debug!("{}: decoded {} records at {}", kind, count, base);
        Ok(collection)
    }

    fn read_extended_data(
        &self,
        cursor: &mut ByteCursor<'a>,
        section: u32,
    ) -> Result<ExtendedDataRef> {
        Ok(ExtendedDataRef {
            type_pointer: self.read_pointer(cursor, section)?,
            object_pointer: self.read_pointer(cursor, section)?,
        })
    }

    fn read_skeleton(
        &mut self,
        cursor: &mut ByteCursor<'a>,
        origin: SectionPointer,
        index: usize,
    ) -> Result<Skeleton> {
        let name_pointer = self.read_pointer(cursor, origin.section)?;
        let bone_count = cursor.read_u32()?;
        let bones_pointer = self.read_pointer(cursor, origin.section)?;
        let lod_type = match self.layout {
            LayoutProfile::Compact => None,
            LayoutProfile::Extended => Some(cursor.read_i32()?),
        };

        let name = self.read_name(name_pointer)?;

        let mut bones = Vec::new();
        let bones_at = self.checked_pair(bone_count, bones_pointer, |raw| StructureIssue::Nested {
            owner: CollectionKind::Skeletons,
            index,
            field: "bones",
            count: bone_count,
            pointer: raw,
        });
        if let Some(bones_at) = bones_at {
            let stride = self.layout.bone_stride();
            let mut bone_cursor = self.array_cursor(bones_at, bone_count, stride)?;
            bones.reserve(bone_count as usize);
            for _ in 0..bone_count {
                bones.push(self.read_bone(&mut bone_cursor, bones_at.section)?);
            }
        }

        Ok(Skeleton {
            origin,
            name,
            bones,
            lod_type,
        })
    }

    fn read_bone(&self, cursor: &mut ByteCursor<'a>, section: u32) -> Result<Bone> {
        let name_pointer = self.read_pointer(cursor, section)?;
        let parent_index = cursor.read_i32()?;
        let local_transform = Transform::read(cursor)?;

        let (inverse_world, lod_error, extended_data) = match self.layout {
            LayoutProfile::Compact => (None, None, None),
            LayoutProfile::Extended => (
                Some(cursor.read_mat4()?),
                Some(cursor.read_f32()?),
                Some(self.read_extended_data(cursor, section)?),
            ),
        };

        Ok(Bone {
            name: self.read_name(name_pointer)?,
            parent_index,
            local_transform,
            inverse_world,
            lod_error,
            extended_data,
        })
    }

    fn read_model(
        &mut self,
        cursor: &mut ByteCursor<'a>,
        origin: SectionPointer,
        index: usize,
    ) -> Result<Model> {
        let name_pointer = self.read_pointer(cursor, origin.section)?;
        let skeleton_pointer = self.read_pointer(cursor, origin.section)?;
        let initial_placement = Transform::read(cursor)?;
        let binding_count = cursor.read_u32()?;
        let bindings_pointer = self.read_pointer(cursor, origin.section)?;

        let mut mesh_bindings = Vec::new();
        let bindings_at =
            self.checked_pair(binding_count, bindings_pointer, |raw| StructureIssue::Nested {
                owner: CollectionKind::Models,
                index,
                field: "mesh_bindings",
                count: binding_count,
                pointer: raw,
            });
        if let Some(bindings_at) = bindings_at {
            let mut binding_cursor =
                self.array_cursor(bindings_at, binding_count, MeshBinding::SIZE)?;
            mesh_bindings.reserve(binding_count as usize);
            for _ in 0..binding_count {
                mesh_bindings.push(MeshBinding {
                    mesh_pointer: self.read_pointer(&mut binding_cursor, bindings_at.section)?,
                    mesh: None,
                });
            }
        }

        Ok(Model {
            origin,
            name: self.read_name(name_pointer)?,
            skeleton_pointer,
            skeleton: None,
            initial_placement,
            mesh_bindings,
        })
    }

    fn read_mesh(
        &mut self,
        cursor: &mut ByteCursor<'a>,
        origin: SectionPointer,
        index: usize,
    ) -> Result<Mesh> {
        let section = origin.section;
        let name_pointer = self.read_pointer(cursor, section)?;
        let primary_vertex_data = self.read_pointer(cursor, section)?;
        let morph_target_count = cursor.read_u32()?;
        // Morph target array (not expanded)
        cursor.skip(4)?;
        let primary_topology = self.read_pointer(cursor, section)?;
        let material_binding_count = cursor.read_u32()?;
        // Material binding array (not expanded)
        cursor.skip(4)?;
        let bone_binding_count = cursor.read_u32()?;
        let bone_bindings_pointer = self.read_pointer(cursor, section)?;
        let extended_data = self.read_extended_data(cursor, section)?;

        let mut bone_bindings = Vec::new();
        let bindings_at = self.checked_pair(bone_binding_count, bone_bindings_pointer, |raw| {
            StructureIssue::Nested {
                owner: CollectionKind::Meshes,
                index,
                field: "bone_bindings",
                count: bone_binding_count,
                pointer: raw,
            }
        });
        if let Some(bindings_at) = bindings_at {
            let mut binding_cursor =
                self.array_cursor(bindings_at, bone_binding_count, BoneBinding::SIZE)?;
            bone_bindings.reserve(bone_binding_count as usize);
            for _ in 0..bone_binding_count {
                bone_bindings.push(self.read_bone_binding(&mut binding_cursor, bindings_at.section)?);
            }
        }

        Ok(Mesh {
            origin,
            name: self.read_name(name_pointer)?,
            primary_vertex_data,
            morph_target_count,
            primary_topology,
            material_binding_count,
            bone_bindings,
            extended_data,
        })
    }

    fn read_bone_binding(&self, cursor: &mut ByteCursor<'a>, section: u32) -> Result<BoneBinding> {
        let name_pointer = self.read_pointer(cursor, section)?;
        let obb_min = cursor.read_vec3()?;
        let obb_max = cursor.read_vec3()?;
        let triangle_count = cursor.read_u32()?;
        let triangle_indices = self.read_pointer(cursor, section)?;

        Ok(BoneBinding {
            bone_name: self.read_name(name_pointer)?,
            obb_min,
            obb_max,
            triangle_count,
            triangle_indices,
        })
    }
}

/// Second pass: turn model -> skeleton/mesh addresses into collection indices
fn link_references(
    skeletons: &Collection<Skeleton>,
    meshes: &Collection<Mesh>,
    models: &mut Collection<Model>,
    issues: &mut Vec<StructureIssue>,
) {
    let skeleton_at: HashMap<SectionPointer, usize> = skeletons
        .iter()
        .enumerate()
        .map(|(i, skeleton)| (skeleton.origin, i))
        .collect();
    let mesh_at: HashMap<SectionPointer, usize> = meshes
        .iter()
        .enumerate()
        .map(|(i, mesh)| (mesh.origin, i))
        .collect();

    let mut unresolved = |index: usize, target: CollectionKind, pointer: SectionPointer| {
        let issue = StructureIssue::UnresolvedReference {
            owner: CollectionKind::Models,
            index,
            target,
            pointer,
        };
        warn!("{}", issue);
        issues.push(issue);
    };

    for (index, model) in models.records.iter_mut().enumerate() {
        if let Some(pointer) = model.skeleton_pointer {
            model.skeleton = skeleton_at.get(&pointer).copied();
            if model.skeleton.is_none() {
                unresolved(index, CollectionKind::Skeletons, pointer);
            }
        }

        for binding in &mut model.mesh_bindings {
            if let Some(pointer) = binding.mesh_pointer {
                binding.mesh = mesh_at.get(&pointer).copied();
                if binding.mesh.is_none() {
                    unresolved(index, CollectionKind::Meshes, pointer);
                }
            }
        }
    }
}
