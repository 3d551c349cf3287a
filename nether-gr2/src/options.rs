//! Load options
//!
//! Every field has a default, so an empty TOML document (or none at all) yields
//! [`LoadOptions::default`].
//!
//! ```toml
//! layout = "extended"
//! apply_relocations = true
//! parallel_decompression = false
//! retain_arenas = false
//! ```

use serde::{Deserialize, Serialize};

/// Record layout profile
///
/// Selects the on-disk strides used for skeleton and bone records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutProfile {
    /// Skeleton: name, bone count, bones (12 bytes).
    /// Bone: name, parent index, local transform (76 bytes).
    #[default]
    Compact,
    /// Skeleton adds a trailing LOD type (16 bytes).
    /// Bone adds inverse world matrix, LOD error and an extended data reference (152 bytes).
    Extended,
}

impl LayoutProfile {
    /// Skeleton record stride in bytes
    pub fn skeleton_stride(self) -> usize {
        match self {
            Self::Compact => 12,
            Self::Extended => 16,
        }
    }

    /// Bone record stride in bytes
    pub fn bone_stride(self) -> usize {
        match self {
            Self::Compact => 76,
            Self::Extended => 152,
        }
    }
}

/// Options controlling a single container load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Record layout profile (default: compact)
    #[serde(default)]
    pub layout: LayoutProfile,
    /// Address pointer slots through each section's relocation table (default: true)
    #[serde(default = "default_true")]
    pub apply_relocations: bool,
    /// Decompress sections on the rayon pool when the `parallel` feature is on (default: true)
    #[serde(default = "default_true")]
    pub parallel_decompression: bool,
    /// Keep decompressed arenas on the resulting graph (default: true)
    #[serde(default = "default_true")]
    pub retain_arenas: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            layout: LayoutProfile::default(),
            apply_relocations: true,
            parallel_decompression: true,
            retain_arenas: true,
        }
    }
}

impl LoadOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Serialize options to a TOML document
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
