//! Typed records decoded from arenas
//!
//! Records own their data; nothing borrows from the arenas they were read from.
//!
//! # Transform layout (68 bytes)
//! ```text
//! 0x00: flags u32
//! 0x04: position [f32; 3]
//! 0x10: orientation [f32; 4] (quaternion x, y, z, w)
//! 0x20: scale_shear [[f32; 3]; 3] (row by row)
//! ```

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::error::Result;

/// Resolved pointer: a byte offset inside a specific section's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionPointer {
    pub section: u32,
    pub offset: u32,
}

impl SectionPointer {
    pub const fn new(section: u32, offset: u32) -> Self {
        Self { section, offset }
    }
}

impl std::fmt::Display for SectionPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:#x}", self.section, self.offset)
    }
}

/// Placement transform
///
/// Values are passed through as stored: the orientation is not re-normalized and
/// the scale/shear matrix is not checked for invertibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub flags: u32,
    pub position: [f32; 3],
    pub orientation: [f32; 4],
    pub scale_shear: [[f32; 3]; 3],
}

impl Transform {
    pub const SIZE: usize = 68;

    /// Identity transform (no flags, unit orientation and scale)
    pub const IDENTITY: Self = Self {
        flags: 0,
        position: [0.0; 3],
        orientation: [0.0, 0.0, 0.0, 1.0],
        scale_shear: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Read an inline transform at the cursor
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            flags: cursor.read_u32()?,
            position: cursor.read_vec3()?,
            orientation: cursor.read_vec4()?,
            scale_shear: cursor.read_mat3()?,
        })
    }

    pub fn position_vec3(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Orientation as stored (not normalized)
    pub fn orientation_quat(&self) -> Quat {
        let [x, y, z, w] = self.orientation;
        Quat::from_xyzw(x, y, z, w)
    }

    /// Scale/shear matrix; stored rows become matrix rows
    pub fn scale_shear_mat3(&self) -> Mat3 {
        Mat3::from_cols_array_2d(&self.scale_shear).transpose()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Reference to an extended data block (type descriptor + object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedDataRef {
    pub type_pointer: Option<SectionPointer>,
    pub object_pointer: Option<SectionPointer>,
}

/// One bone of a skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: Option<String>,
    /// Index of the parent bone in the same skeleton; negative for a root bone
    pub parent_index: i32,
    pub local_transform: Transform,
    /// Extended layout only
    pub inverse_world: Option<[[f32; 4]; 4]>,
    /// Extended layout only
    pub lod_error: Option<f32>,
    /// Extended layout only
    pub extended_data: Option<ExtendedDataRef>,
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// Parent index as a usize, if this bone has a parent
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent_index).ok()
    }
}

/// Skeleton: an ordered bone hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    /// On-disk address of this record
    pub origin: SectionPointer,
    pub name: Option<String>,
    /// Bones in on-disk order; parent indices refer into this list
    pub bones: Vec<Bone>,
    /// Extended layout only
    pub lod_type: Option<i32>,
}

impl Skeleton {
    /// Indices of bones without a parent
    pub fn root_bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.is_root())
            .map(|(i, _)| i)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones
            .iter()
            .position(|bone| bone.name.as_deref() == Some(name))
    }
}

/// Bone influence record of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneBinding {
    pub bone_name: Option<String>,
    pub obb_min: [f32; 3],
    pub obb_max: [f32; 3],
    pub triangle_count: u32,
    pub triangle_indices: Option<SectionPointer>,
}

impl BoneBinding {
    pub const SIZE: usize = 36;
}

/// Mesh header
///
/// Vertex data and topology bodies are not expanded; their addresses are kept so a
/// renderer can decode them from the retained arenas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// On-disk address of this record
    pub origin: SectionPointer,
    pub name: Option<String>,
    pub primary_vertex_data: Option<SectionPointer>,
    pub morph_target_count: u32,
    pub primary_topology: Option<SectionPointer>,
    pub material_binding_count: u32,
    pub bone_bindings: Vec<BoneBinding>,
    pub extended_data: ExtendedDataRef,
}

impl Mesh {
    pub const SIZE: usize = 44;
}

/// Reference from a model to one of its meshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshBinding {
    /// Stored mesh address
    pub mesh_pointer: Option<SectionPointer>,
    /// Index into [`crate::FileGraph::meshes`], filled in once all collections are decoded
    pub mesh: Option<usize>,
}

impl MeshBinding {
    pub const SIZE: usize = 4;
}

/// Model: a skeleton instance with its initial placement and meshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// On-disk address of this record
    pub origin: SectionPointer,
    pub name: Option<String>,
    /// Stored skeleton address
    pub skeleton_pointer: Option<SectionPointer>,
    /// Index into [`crate::FileGraph::skeletons`], filled in once all collections are decoded
    pub skeleton: Option<usize>,
    pub initial_placement: Transform,
    pub mesh_bindings: Vec<MeshBinding>,
}

impl Model {
    /// name + skeleton + transform + mesh binding count/pointer
    pub const SIZE: usize = 8 + Transform::SIZE + 8;
}
