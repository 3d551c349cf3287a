//! gr2-inspect library
//!
//! Loading and report rendering used by the `gr2-inspect` binary.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use nether_gr2::{CollectionSummary, FileGraph, LoadOptions, StructureIssue};
use serde::Serialize;

/// Read load options from a TOML file, or use the defaults when no file is given
pub fn load_options(path: Option<&Path>) -> Result<LoadOptions> {
    let Some(path) = path else {
        return Ok(LoadOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {:?}", path))?;
    LoadOptions::from_toml_str(&text)
        .with_context(|| format!("Failed to parse options file {:?}", path))
}

/// Read and load a container file
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<FileGraph> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    tracing::debug!("Read {} bytes from {:?}", data.len(), path);
    nether_gr2::load_gr2_with(&data, options).with_context(|| format!("Failed to load {:?}", path))
}

/// Machine-readable summary
#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    pub header_format: u32,
    pub sections: usize,
    pub collections: [CollectionSummary; 9],
    pub issues: &'a [StructureIssue],
}

impl<'a> SummaryReport<'a> {
    pub fn new(graph: &'a FileGraph) -> Self {
        Self {
            header_format: graph.header.header_format,
            sections: graph.sections.len(),
            collections: graph.summary(),
            issues: &graph.issues,
        }
    }
}

/// Human-readable summary: section table, collection counts, issues and models
pub fn render_summary(graph: &FileGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "format {}, {} sections",
        graph.header.header_format,
        graph.sections.len()
    );

    for (index, section) in graph.sections.iter().enumerate() {
        let codec = section.codec().map_or("unknown", |codec| codec.name());
        let _ = writeln!(
            out,
            "  section {}: {}, {} -> {} bytes, {} relocations",
            index,
            codec,
            section.data_size,
            section.decompressed_size,
            section.relocations_count
        );
    }

    out.push_str("collections (decoded/declared):\n");
    for entry in graph.summary() {
        let _ = writeln!(
            out,
            "  {:<16}{}/{}",
            entry.kind.name(),
            entry.decoded,
            entry.declared
        );
    }

    if !graph.issues.is_empty() {
        out.push_str("issues:\n");
        for issue in &graph.issues {
            let _ = writeln!(out, "  {}", issue);
        }
    }

    if !graph.models.is_empty() {
        out.push_str("models:\n");
        for model in &graph.models {
            let skeleton = graph
                .skeleton_for(model)
                .map_or("-", |s| s.name.as_deref().unwrap_or("<unnamed>"));
            let _ = writeln!(
                out,
                "  {} (skeleton {}, {} meshes)",
                model.name.as_deref().unwrap_or("<unnamed>"),
                skeleton,
                graph.meshes_for(model).count()
            );
        }
    }

    out
}

/// Summary as JSON
pub fn render_summary_json(graph: &FileGraph) -> Result<String> {
    serde_json::to_string_pretty(&SummaryReport::new(graph)).context("Failed to serialize summary")
}

/// Full resolved graph as JSON (arenas are not included)
pub fn render_dump(graph: &FileGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).context("Failed to serialize graph")
}
