//! Tests for record resolution

use super::*;
use crate::container::{ContainerHeader, Relocation, SectionDescriptor};
use crate::error::ErrorKind;
use crate::GR2_MAGIC;

// ============================================================================
// Arena builder
// ============================================================================

/// Little-endian arena writer; starts with an all-zero file info table
struct ArenaWriter {
    bytes: Vec<u8>,
}

impl ArenaWriter {
    fn new() -> Self {
        Self {
            bytes: vec![0; FILE_INFO_SIZE],
        }
    }

    /// Section without a file info table
    fn bare() -> Self {
        Self { bytes: Vec::new() }
    }

    fn offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn floats(&mut self, values: &[f32]) -> &mut Self {
        for &value in values {
            self.f32(value);
        }
        self
    }

    fn transform(&mut self, t: &Transform) -> &mut Self {
        self.u32(t.flags).floats(&t.position).floats(&t.orientation);
        for row in &t.scale_shear {
            self.floats(row);
        }
        self
    }

    fn cstring(&mut self, text: &str) -> u32 {
        let at = self.offset();
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        at
    }

    fn patch(&mut self, at: u32, value: u32) {
        let at = at as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn table_entry(&mut self, kind: CollectionKind, count: u32, pointer: u32) {
        let at = kind as u32 * 8;
        self.patch(at, count);
        self.patch(at + 4, pointer);
    }

    fn compact_bone(&mut self, name: u32, parent: i32) -> &mut Self {
        self.u32(name).i32(parent).transform(&Transform::IDENTITY)
    }

    fn model(&mut self, name: u32, skeleton: u32, binding_count: u32, bindings: u32) -> u32 {
        let at = self.offset();
        self.u32(name)
            .u32(skeleton)
            .transform(&Transform::IDENTITY)
            .u32(binding_count)
            .u32(bindings);
        at
    }

    fn mesh(&mut self, name: u32, bone_binding_count: u32, bone_bindings: u32) -> u32 {
        let at = self.offset();
        self.u32(name)
            .u32(0x10) // vertex data
            .u32(2) // morph targets
            .u32(0x20)
            .u32(0x30) // topology
            .u32(1) // material bindings
            .u32(0x40)
            .u32(bone_binding_count)
            .u32(bone_bindings)
            .u32(0)
            .u32(0);
        at
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

fn container(arenas: Vec<Vec<u8>>) -> Container {
    container_with_relocations(arenas, Vec::new())
}

fn container_with_relocations(
    arenas: Vec<Vec<u8>>,
    mut relocations: Vec<Vec<Relocation>>,
) -> Container {
    let count = arenas.len();
    relocations.resize(count, Vec::new());

    let sections = arenas
        .iter()
        .map(|bytes| SectionDescriptor {
            compression: 0,
            data_offset: 0,
            data_size: bytes.len() as u32,
            decompressed_size: bytes.len() as u32,
            alignment: 4,
            first_16bit: 0,
            first_8bit: 0,
            relocations_offset: 0,
            relocations_count: 0,
            mixed_marshalling_offset: 0,
            mixed_marshalling_count: 0,
        })
        .collect();

    Container {
        header: ContainerHeader {
            magic: GR2_MAGIC,
            header_size: ContainerHeader::SIZE as u32,
            header_format: 7,
            reserved: [0; 2],
        },
        sections,
        arenas: arenas
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| Arena::new(i as u32, bytes))
            .collect(),
        relocations,
        marshalling: vec![Vec::new(); count],
    }
}

fn resolve_default(arenas: Vec<Vec<u8>>) -> Result<FileGraph> {
    resolve(container(arenas), &LoadOptions::default())
}

// ============================================================================
// Skeletons
// ============================================================================

#[test]
fn test_skeleton_with_bones() {
    let mut w = ArenaWriter::new();
    let hero = w.cstring("Hero");
    let root = w.cstring("root");
    let spine = w.cstring("spine");
    let bones = w.offset();
    w.compact_bone(root, -1).compact_bone(spine, 0);
    let skeleton = w.offset();
    w.u32(hero).u32(2).u32(bones);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);

    let graph = resolve_default(vec![w.finish()]).unwrap();

    assert!(graph.issues.is_empty());
    assert_eq!(graph.skeletons.len(), 1);
    let skeleton_record = &graph.skeletons.records[0];
    assert_eq!(skeleton_record.origin, SectionPointer::new(0, skeleton));
    assert_eq!(skeleton_record.name.as_deref(), Some("Hero"));
    assert_eq!(skeleton_record.lod_type, None);

    let bones = &skeleton_record.bones;
    assert_eq!(bones.len(), 2);
    assert_eq!(bones[0].name.as_deref(), Some("root"));
    assert_eq!(bones[0].parent_index, -1);
    assert_eq!(bones[1].name.as_deref(), Some("spine"));
    assert_eq!(bones[1].parent(), Some(0));
    assert_eq!(bones[1].local_transform, Transform::IDENTITY);
    assert_eq!(bones[1].inverse_world, None);
    assert_eq!(skeleton_record.root_bones().collect::<Vec<_>>(), vec![0]);
    assert_eq!(skeleton_record.find_bone("spine"), Some(1));

    assert!(graph.meshes.is_empty());
    assert!(graph.models.is_empty());
    assert_eq!(graph.meshes.declared_count, 0);
}

#[test]
fn test_null_name_pointer() {
    let mut w = ArenaWriter::new();
    let skeleton = w.offset();
    w.u32(0).u32(0).u32(0);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert_eq!(graph.skeletons.records[0].name, None);
    assert!(graph.skeletons.records[0].bones.is_empty());
}

#[test]
fn test_unterminated_name() {
    let mut w = ArenaWriter::new();
    let skeleton = w.offset();
    w.u32(skeleton + 12).u32(0).u32(0);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);
    let mut bytes = w.finish();
    bytes.extend_from_slice(b"abc");

    let err = resolve_default(vec![bytes]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_extended_layout() {
    let mut w = ArenaWriter::new();
    let name = w.cstring("pelvis");
    let bones = w.offset();
    w.u32(name).i32(-1).transform(&Transform::IDENTITY);
    for i in 0..16 {
        w.f32(i as f32);
    }
    w.f32(0.25).u32(0).u32(0);
    let skeleton = w.offset();
    w.u32(0).u32(1).u32(bones).i32(2);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);

    let options = LoadOptions {
        layout: LayoutProfile::Extended,
        ..LoadOptions::default()
    };
    let graph = resolve(container(vec![w.finish()]), &options).unwrap();

    let skeleton = &graph.skeletons.records[0];
    assert_eq!(skeleton.lod_type, Some(2));
    let bone = &skeleton.bones[0];
    assert_eq!(bone.name.as_deref(), Some("pelvis"));
    assert_eq!(bone.lod_error, Some(0.25));
    assert_eq!(bone.inverse_world.unwrap()[1][2], 6.0);
    assert_eq!(
        bone.extended_data,
        Some(ExtendedDataRef {
            type_pointer: None,
            object_pointer: None
        })
    );
}

// ============================================================================
// Structure issues
// ============================================================================

#[test]
fn test_inconsistent_collection_is_recovered() {
    let mut w = ArenaWriter::new();
    let skeleton = w.offset();
    w.u32(0).u32(0).u32(0);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);
    w.table_entry(CollectionKind::Meshes, 5, 0);

    let graph = resolve_default(vec![w.finish()]).unwrap();

    assert!(graph.meshes.is_empty());
    assert_eq!(graph.meshes.declared_count, 5);
    assert_eq!(graph.skeletons.len(), 1);
    assert_eq!(
        graph.issues,
        vec![StructureIssue::Collection {
            collection: CollectionKind::Meshes,
            count: 5,
            pointer: 0
        }]
    );
}

#[test]
fn test_pointer_without_count() {
    let mut w = ArenaWriter::new();
    w.table_entry(CollectionKind::Models, 0, 0x48);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert!(graph.models.is_empty());
    assert_eq!(
        graph.issues,
        vec![StructureIssue::Collection {
            collection: CollectionKind::Models,
            count: 0,
            pointer: 0x48
        }]
    );
}

#[test]
fn test_inconsistent_bones() {
    let mut w = ArenaWriter::new();
    let skeleton = w.offset();
    w.u32(0).u32(3).u32(0);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert_eq!(graph.skeletons.len(), 1);
    assert!(graph.skeletons.records[0].bones.is_empty());
    assert_eq!(
        graph.issues,
        vec![StructureIssue::Nested {
            owner: CollectionKind::Skeletons,
            index: 0,
            field: "bones",
            count: 3,
            pointer: 0
        }]
    );
}

#[test]
fn test_count_exceeds_arena() {
    let mut w = ArenaWriter::new();
    w.u32(0).u32(0).u32(0);
    w.table_entry(CollectionKind::Skeletons, 1000, FILE_INFO_SIZE as u32);

    let err = resolve_default(vec![w.finish()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_huge_count_does_not_allocate() {
    let mut w = ArenaWriter::new();
    w.table_entry(CollectionKind::Meshes, u32::MAX, 4);

    let err = resolve_default(vec![w.finish()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_unexpanded_collections_keep_counts() {
    let mut w = ArenaWriter::new();
    w.table_entry(CollectionKind::Textures, 3, 0x10);
    w.table_entry(CollectionKind::Animations, 2, 0x20);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert!(graph.textures.is_empty());
    assert_eq!(graph.textures.declared_count, 3);
    assert_eq!(graph.textures.pointer, Some(SectionPointer::new(0, 0x10)));

    let summary = graph.summary();
    assert_eq!(summary[0].kind, CollectionKind::Textures);
    assert_eq!(summary[0].declared, 3);
    assert_eq!(summary[0].decoded, 0);
    assert_eq!(summary[8].declared, 2);
    assert!(graph.issues.is_empty());
}

#[test]
fn test_empty_container() {
    let err = resolve_default(Vec::new()).unwrap_err();
    assert_eq!(err, Gr2Error::EmptyContainer);
}

#[test]
fn test_primary_arena_too_small() {
    let err = resolve_default(vec![vec![0u8; 40]]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
}

// ============================================================================
// Models and meshes
// ============================================================================

#[test]
fn test_model_forward_reference() {
    let mut w = ArenaWriter::new();
    let model_name = w.cstring("Knight");
    // Model is written before the skeleton it references
    let model = w.model(model_name, 0, 0, 0);
    let skeleton_name = w.cstring("KnightRig");
    let skeleton = w.offset();
    w.u32(skeleton_name).u32(0).u32(0);
    w.patch(model + 4, skeleton);
    w.table_entry(CollectionKind::Models, 1, model);
    w.table_entry(CollectionKind::Skeletons, 1, skeleton);

    let graph = resolve_default(vec![w.finish()]).unwrap();

    assert!(graph.issues.is_empty());
    let model = &graph.models.records[0];
    assert_eq!(model.name.as_deref(), Some("Knight"));
    assert_eq!(model.skeleton, Some(0));
    assert_eq!(model.initial_placement, Transform::IDENTITY);
    assert_eq!(
        graph.skeleton_for(model).and_then(|s| s.name.as_deref()),
        Some("KnightRig")
    );
    assert!(graph.find_model("Knight").is_some());
    assert!(graph.find_skeleton("KnightRig").is_some());
}

#[test]
fn test_model_without_skeleton() {
    let mut w = ArenaWriter::new();
    let model = w.model(0, 0, 0, 0);
    w.table_entry(CollectionKind::Models, 1, model);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert_eq!(graph.models.records[0].skeleton_pointer, None);
    assert_eq!(graph.models.records[0].skeleton, None);
    assert!(graph.issues.is_empty());
}

#[test]
fn test_unresolved_skeleton_reference() {
    let mut w = ArenaWriter::new();
    let model = w.model(0, 0x4000, 0, 0);
    w.table_entry(CollectionKind::Models, 1, model);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert_eq!(graph.models.records[0].skeleton, None);
    assert_eq!(
        graph.issues,
        vec![StructureIssue::UnresolvedReference {
            owner: CollectionKind::Models,
            index: 0,
            target: CollectionKind::Skeletons,
            pointer: SectionPointer::new(0, 0x4000)
        }]
    );
}

#[test]
fn test_meshes_and_bindings() {
    let mut w = ArenaWriter::new();
    let body = w.cstring("body");
    let head = w.cstring("head");
    let neck = w.cstring("neck");

    let bone_bindings = w.offset();
    w.u32(neck)
        .floats(&[-1.0, -1.0, -1.0])
        .floats(&[1.0, 1.0, 1.0])
        .u32(12)
        .u32(0x80);

    let meshes = w.mesh(body, 0, 0);
    w.mesh(head, 1, bone_bindings);

    let binding_array = w.offset();
    w.u32(meshes + Mesh::SIZE as u32).u32(meshes);
    let model = w.model(0, 0, 2, binding_array);

    w.table_entry(CollectionKind::Meshes, 2, meshes);
    w.table_entry(CollectionKind::Models, 1, model);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert!(graph.issues.is_empty());

    let head = &graph.meshes.records[1];
    assert_eq!(head.name.as_deref(), Some("head"));
    assert_eq!(head.origin, SectionPointer::new(0, meshes + Mesh::SIZE as u32));
    assert_eq!(head.primary_vertex_data, Some(SectionPointer::new(0, 0x10)));
    assert_eq!(head.primary_topology, Some(SectionPointer::new(0, 0x30)));
    assert_eq!(head.morph_target_count, 2);
    assert_eq!(head.material_binding_count, 1);
    assert_eq!(head.bone_bindings.len(), 1);

    let binding = &head.bone_bindings[0];
    assert_eq!(binding.bone_name.as_deref(), Some("neck"));
    assert_eq!(binding.obb_min, [-1.0; 3]);
    assert_eq!(binding.obb_max, [1.0; 3]);
    assert_eq!(binding.triangle_count, 12);
    assert_eq!(binding.triangle_indices, Some(SectionPointer::new(0, 0x80)));

    // Binding order is preserved: head first, then body
    let model = &graph.models.records[0];
    let names: Vec<_> = graph
        .meshes_for(model)
        .map(|mesh| mesh.name.as_deref())
        .collect();
    assert_eq!(names, vec![Some("head"), Some("body")]);
    assert_eq!(model.mesh_bindings[0].mesh, Some(1));
}

#[test]
fn test_unresolved_mesh_binding() {
    let mut w = ArenaWriter::new();
    let binding_array = w.offset();
    w.u32(0x200);
    let model = w.model(0, 0, 1, binding_array);
    w.table_entry(CollectionKind::Models, 1, model);

    let graph = resolve_default(vec![w.finish()]).unwrap();
    assert_eq!(graph.models.records[0].mesh_bindings[0].mesh, None);
    assert_eq!(graph.meshes_for(&graph.models.records[0]).count(), 0);
    assert!(matches!(
        graph.issues.as_slice(),
        [StructureIssue::UnresolvedReference {
            target: CollectionKind::Meshes,
            ..
        }]
    ));
}

// ============================================================================
// Relocations and arenas
// ============================================================================

fn cross_section_container() -> Container {
    let mut primary = ArenaWriter::new();
    let model = primary.model(0, 0, 0, 0);
    primary.table_entry(CollectionKind::Models, 1, model);
    // Skeleton table pointer left as 0; the relocation supplies it
    primary.table_entry(CollectionKind::Skeletons, 1, 0);

    let mut secondary = ArenaWriter::bare();
    let name = secondary.cstring("Remote");
    let skeleton = secondary.offset();
    secondary.u32(0).u32(0).u32(0);

    let skeleton_slot = CollectionKind::Skeletons as u32 * 8 + 4;
    let relocations = vec![vec![
        Relocation {
            slot_offset: skeleton_slot,
            target: SectionPointer::new(1, skeleton),
        },
        Relocation {
            slot_offset: model + 4,
            target: SectionPointer::new(1, skeleton),
        },
        Relocation {
            slot_offset: model,
            target: SectionPointer::new(1, name),
        },
    ]];

    container_with_relocations(vec![primary.finish(), secondary.finish()], relocations)
}

#[test]
fn test_cross_section_relocations() {
    let graph = resolve(cross_section_container(), &LoadOptions::default()).unwrap();

    assert!(graph.issues.is_empty());
    let skeleton = &graph.skeletons.records[0];
    assert_eq!(skeleton.origin.section, 1);

    let model = &graph.models.records[0];
    assert_eq!(model.name.as_deref(), Some("Remote"));
    assert_eq!(model.skeleton, Some(0));
}

#[test]
fn test_relocations_disabled() {
    let options = LoadOptions {
        apply_relocations: false,
        ..LoadOptions::default()
    };
    let graph = resolve(cross_section_container(), &options).unwrap();

    // Without the relocation the skeleton pair is (1, null)
    assert!(graph.skeletons.is_empty());
    assert_eq!(graph.models.records[0].skeleton_pointer, None);
    assert_eq!(graph.models.records[0].name, None);
    assert_eq!(graph.issues.len(), 1);
}

#[test]
fn test_arena_retention() {
    let graph = resolve(cross_section_container(), &LoadOptions::default()).unwrap();
    assert_eq!(graph.arenas().len(), 2);
    assert_eq!(graph.arena(1).map(Arena::section), Some(1));

    let options = LoadOptions {
        retain_arenas: false,
        ..LoadOptions::default()
    };
    let graph = resolve(cross_section_container(), &options).unwrap();
    assert!(graph.arenas().is_empty());
    assert_eq!(graph.skeletons.len(), 1);
}

#[test]
fn test_resolve_is_deterministic() {
    let first = resolve(cross_section_container(), &LoadOptions::default()).unwrap();
    let second = resolve(cross_section_container(), &LoadOptions::default()).unwrap();
    assert_eq!(first, second);
}
