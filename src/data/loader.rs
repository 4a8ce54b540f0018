// ============================================================
// Layer 4 — Molecule Loaders
// ============================================================
// Reads the molecule collection and the split index files.
//
// Two on-disk collection formats are supported:
//
//   <data_root>/graphs.json   — one JSON array of molecules
//   <data_root>/graphs.jsonl  — one molecule object per line
//
// Each molecule looks like:
//   { "atom_types": [6, 6, 8], "bonds": [[0, 1], [1, 2]] }
//
// Split indices live next to each other in one folder:
//
//   <split_index_folder>/train_index.json  — e.g. [0, 3, 4, 7]
//   <split_index_folder>/val_index.json    — e.g. [1, 2]
//
// Indices refer to positions in the loaded collection, so
// the loaders must preserve file order.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::molecule::MolecularGraph;
use crate::domain::traits::GraphSource;

/// Loads a collection stored as a single JSON array.
pub struct JsonGraphLoader {
    path: PathBuf,
}

impl JsonGraphLoader {
    pub const FILE_NAME: &'static str = "graphs.json";

    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self { path: data_root.as_ref().join(Self::FILE_NAME) }
    }
}

impl GraphSource for JsonGraphLoader {
    fn load_all(&self) -> Result<Vec<MolecularGraph>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read molecule file '{}'", self.path.display()))?;
        let graphs: Vec<MolecularGraph> = serde_json::from_str(&text)
            .with_context(|| format!("Malformed molecule file '{}'", self.path.display()))?;
        tracing::debug!("Loaded {} molecules from '{}'", graphs.len(), self.path.display());
        Ok(graphs)
    }
}

/// Loads a collection stored as JSON Lines (one molecule per line).
pub struct JsonLinesGraphLoader {
    path: PathBuf,
}

impl JsonLinesGraphLoader {
    pub const FILE_NAME: &'static str = "graphs.jsonl";

    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self { path: data_root.as_ref().join(Self::FILE_NAME) }
    }
}

impl GraphSource for JsonLinesGraphLoader {
    fn load_all(&self) -> Result<Vec<MolecularGraph>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read molecule file '{}'", self.path.display()))?;

        let mut graphs = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let graph: MolecularGraph = serde_json::from_str(line).with_context(|| {
                format!("Malformed molecule on line {} of '{}'", line_no + 1, self.path.display())
            })?;
            graphs.push(graph);
        }

        tracing::debug!("Loaded {} molecules from '{}'", graphs.len(), self.path.display());
        Ok(graphs)
    }
}

/// Which side of the train/validation split to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
        }
    }

    fn index_file(self) -> String {
        format!("{}_index.json", self.name())
    }
}

/// Read `<folder>/<split>_index.json` as a list of collection indices.
pub fn load_split_indices(folder: impl AsRef<Path>, split: Split) -> Result<Vec<usize>> {
    let path = folder.as_ref().join(split.index_file());
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read split index '{}'", path.display()))?;
    let indices: Vec<usize> = serde_json::from_str(&text)
        .with_context(|| format!("Malformed split index '{}'", path.display()))?;
    Ok(indices)
}
