//! Error types for GR2 container loading

use thiserror::Error;

use crate::graph::StructureIssue;

/// Errors that can occur while loading a GR2 container
///
/// Only [`Gr2Error::CorruptStructure`] is ever recovered locally (the affected
/// collection becomes empty and is listed in [`crate::FileGraph::issues`]).
/// Every other variant aborts the load.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Gr2Error {
    /// First 16 bytes are not the GR2 magic
    #[error("invalid GR2 magic: found {found:02X?}")]
    InvalidFormat { found: Vec<u8> },

    /// A read went past the end of its buffer
    #[error("read of {needed} bytes at offset {offset:#x} exceeds buffer length {len}")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// Section declares a compression tag we have no decoder for
    #[error("unsupported compression tag {tag}")]
    UnsupportedCodec { tag: u32 },

    /// Compressed stream cannot produce the declared output
    #[error("corrupt compressed stream at output position {position}: {reason}")]
    CorruptStream {
        position: usize,
        reason: &'static str,
    },

    /// Stored (uncompressed) section length disagrees with its declared size
    #[error("section size mismatch: declared {expected} bytes, stored {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A count/pointer pair is inconsistent
    #[error("corrupt structure: {0}")]
    CorruptStructure(StructureIssue),

    /// Container has no sections, so there is no primary arena to resolve
    #[error("container has no sections")]
    EmptyContainer,

    /// Relocation entry targets a missing section or a slot outside its arena
    #[error(
        "relocation in section {section} at slot {slot:#x} targets invalid section {target_section}"
    )]
    DanglingRelocation {
        section: u32,
        slot: u32,
        target_section: u32,
    },

    /// Error raised while processing one section
    #[error("section {index} (compression {codec}): {source}")]
    Section {
        index: usize,
        codec: u32,
        #[source]
        source: Box<Gr2Error>,
    },
}

/// Flat classification of [`Gr2Error`], looking through section context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFormat,
    OutOfBounds,
    UnsupportedCodec,
    CorruptStream,
    SizeMismatch,
    CorruptStructure,
    EmptyContainer,
    DanglingRelocation,
}

impl Gr2Error {
    /// Classify this error, unwrapping any section context
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::UnsupportedCodec { .. } => ErrorKind::UnsupportedCodec,
            Self::CorruptStream { .. } => ErrorKind::CorruptStream,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::CorruptStructure(_) => ErrorKind::CorruptStructure,
            Self::EmptyContainer => ErrorKind::EmptyContainer,
            Self::DanglingRelocation { .. } => ErrorKind::DanglingRelocation,
            Self::Section { source, .. } => source.kind(),
        }
    }

    /// Whether the resolver may recover from this error and keep loading
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::CorruptStructure
    }

    /// Attach section context
    pub(crate) fn in_section(self, index: usize, codec: u32) -> Self {
        Self::Section {
            index,
            codec,
            source: Box::new(self),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Gr2Error>;
