use anyhow::{bail, ensure, Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, sync::Arc};

use crate::data::loader::{load_split_indices, JsonGraphLoader, JsonLinesGraphLoader, Split};
use crate::data::splitter::subsample;
use crate::data::transform::{FeatureConfig, MaskAtomType};
use crate::domain::molecule::MolecularGraph;
use crate::domain::traits::GraphSource;

/// A molecule with the graph quantities the sampler needs precomputed.
#[derive(Debug, Clone)]
pub struct PreparedGraph {
    pub molecule:  MolecularGraph,
    pub in_ring:   Vec<bool>,
    pub degrees:   Vec<usize>,
    /// Row-major `n × n` matrix `D^-½ (A + I) D^-½`
    pub adjacency: Vec<f32>,
}

impl PreparedGraph {
    pub fn new(molecule: MolecularGraph) -> Self {
        let in_ring   = molecule.ring_membership();
        let degrees   = molecule.degrees();
        let adjacency = normalized_adjacency(&molecule);
        Self { molecule, in_ring, degrees, adjacency }
    }

    pub fn num_atoms(&self) -> usize {
        self.molecule.num_atoms()
    }
}

/// Symmetric-normalised adjacency with self loops.
pub fn normalized_adjacency(molecule: &MolecularGraph) -> Vec<f32> {
    let adj = molecule.adjacency_list();
    let n = adj.len();
    // Self loop counts toward the degree
    let inv_sqrt: Vec<f32> = adj.iter().map(|nb| 1.0 / ((nb.len() + 1) as f32).sqrt()).collect();

    let mut out = vec![0.0f32; n * n];
    for i in 0..n {
        out[i * n + i] = inv_sqrt[i] * inv_sqrt[i];
        for &j in &adj[i] {
            out[i * n + j] = inv_sqrt[i] * inv_sqrt[j];
        }
    }
    out
}

/// One masked molecule, ready to be collated into a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskedGraphSample {
    pub num_nodes:         usize,
    pub feat_dim:          usize,
    /// Row-major `num_nodes × feat_dim`
    pub node_features:     Vec<f32>,
    /// Row-major `num_nodes × num_nodes`
    pub adjacency:         Vec<f32>,
    /// Positions of masked atoms within this molecule, unique and ascending
    pub masked_atom_index: Vec<usize>,
    /// True atom type of each masked atom, aligned with `masked_atom_index`
    pub masked_atom_type:  Vec<usize>,
}

// ─── Dataset registry ─────────────────────────────────────────────────────────

/// The known molecule collection formats, selected by `--dataset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    Json,
    JsonLines,
}

impl DatasetKind {
    /// Resolve a dataset name from the command line.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json"  => Ok(DatasetKind::Json),
            "jsonl" | "json-lines" => Ok(DatasetKind::JsonLines),
            other   => bail!("Unknown dataset '{other}' (expected 'json' or 'jsonl')"),
        }
    }

    pub fn source(self, data_root: &Path) -> Box<dyn GraphSource> {
        match self {
            DatasetKind::Json      => Box::new(JsonGraphLoader::new(data_root)),
            DatasetKind::JsonLines => Box::new(JsonLinesGraphLoader::new(data_root)),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Json      => write!(f, "json"),
            DatasetKind::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// Every molecule of a dataset, validated and prepared once and
/// shared by the train and validation splits.
#[derive(Debug, Clone)]
pub struct GraphCollection {
    graphs:    Arc<Vec<PreparedGraph>>,
    num_atoms: usize,
}

impl GraphCollection {
    pub fn load(kind: DatasetKind, data_root: &Path, num_atoms: usize) -> Result<Self> {
        let molecules = kind.source(data_root).load_all()?;
        Self::from_molecules(molecules, num_atoms)
    }

    pub fn from_molecules(molecules: Vec<MolecularGraph>, num_atoms: usize) -> Result<Self> {
        let mut graphs = Vec::with_capacity(molecules.len());
        for (i, molecule) in molecules.into_iter().enumerate() {
            molecule.validate(num_atoms).with_context(|| format!("Invalid molecule #{i}"))?;
            graphs.push(PreparedGraph::new(molecule));
        }
        tracing::info!("Prepared {} molecules (vocabulary size {})", graphs.len(), num_atoms);
        Ok(Self { graphs: Arc::new(graphs), num_atoms })
    }

    /// Inverse-frequency class weights: `total / (num_atoms · count_c)`,
    /// zero for atom types that never occur.
    pub fn compute_class_weights(&self) -> Vec<f32> {
        let mut counts = vec![0usize; self.num_atoms];
        for g in self.graphs.iter() {
            for &t in &g.molecule.atom_types {
                counts[t] += 1;
            }
        }
        let total: usize = counts.iter().sum();

        counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    0.0
                } else {
                    total as f32 / (self.num_atoms as f32 * c as f32)
                }
            })
            .collect()
    }

    /// Build one split: read its index file, subsample it, attach the transform.
    pub fn split(
        &self,
        split:              Split,
        split_index_folder: &Path,
        transform:          MaskAtomType,
        features:           FeatureConfig,
        sample_ratio:       f64,
        seed:               u64,
    ) -> Result<MaskedAtomDataset> {
        let indices = load_split_indices(split_index_folder, split)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.graphs.len()) {
            bail!(
                "{} split references molecule {bad}, but only {} were loaded",
                split.name(),
                self.graphs.len()
            );
        }
        let indices = subsample(indices, sample_ratio, seed);
        tracing::info!("{} split: {} molecules", split.name(), indices.len());

        MaskedAtomDataset::new(self.graphs.clone(), indices, transform, features)
    }
}

// ─── Burn dataset ─────────────────────────────────────────────────────────────

/// One split of the collection. Every `get` draws a fresh mask.
pub struct MaskedAtomDataset {
    graphs:    Arc<Vec<PreparedGraph>>,
    indices:   Vec<usize>,
    transform: MaskAtomType,
    features:  FeatureConfig,
}

impl MaskedAtomDataset {
    pub fn new(
        graphs:    Arc<Vec<PreparedGraph>>,
        indices:   Vec<usize>,
        transform: MaskAtomType,
        features:  FeatureConfig,
    ) -> Result<Self> {
        ensure!(indices.iter().all(|&i| i < graphs.len()), "split index out of range");
        Ok(Self { graphs, indices, transform, features })
    }

    pub fn features(&self) -> FeatureConfig {
        self.features
    }
}

impl Dataset<MaskedGraphSample> for MaskedAtomDataset {
    fn get(&self, index: usize) -> Option<MaskedGraphSample> {
        let graph = self.graphs.get(*self.indices.get(index)?)?;
        let mut rng = rand::thread_rng();
        Some(self.transform.apply(graph, &self.features, &mut rng))
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tiny_collection() -> GraphCollection {
        GraphCollection::from_molecules(
            vec![
                MolecularGraph::new(vec![0, 0, 1], vec![[0, 1], [1, 2]]),
                MolecularGraph::new(vec![0, 2], vec![[0, 1]]),
                MolecularGraph::new(vec![0, 0, 0], vec![[0, 1], [1, 2], [2, 0]]),
            ],
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_kind_from_name() {
        assert_eq!(DatasetKind::from_name("json").unwrap(), DatasetKind::Json);
        assert_eq!(DatasetKind::from_name("JSONL").unwrap(), DatasetKind::JsonLines);
        assert!(DatasetKind::from_name("zinc").is_err());
    }

    #[test]
    fn test_class_weights_inverse_frequency() {
        // counts: type0 = 6, type1 = 1, type2 = 1, type3 = 0 → total 8
        let w = tiny_collection().compute_class_weights();
        assert_eq!(w.len(), 4);
        assert!((w[0] - 8.0 / 24.0).abs() < 1e-6);
        assert!((w[1] - 2.0).abs() < 1e-6);
        assert!((w[2] - 2.0).abs() < 1e-6);
        assert_eq!(w[3], 0.0);
    }

    #[test]
    fn test_normalized_adjacency_is_symmetric() {
        let m = MolecularGraph::new(vec![0, 0, 0], vec![[0, 1], [1, 2]]);
        let a = normalized_adjacency(&m);
        // atom 1 has two neighbours, so degree with self loop is 3
        assert!((a[4] - 1.0 / 3.0).abs() < 1e-6);
        assert!((a[1] - a[3]).abs() < 1e-6);
        assert!((a[1] - 1.0 / (2.0f32 * 3.0).sqrt()).abs() < 1e-6);
        assert_eq!(a[2], 0.0);
    }

    #[test]
    fn test_split_rejects_out_of_range_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train_index.json"), "[0, 7]").unwrap();
        let res = tiny_collection().split(
            Split::Train,
            dir.path(),
            MaskAtomType::new(0.3, None),
            FeatureConfig::new(4, false, false),
            1.0,
            0,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_get_draws_masked_sample() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("val_index.json"), "[2, 0]").unwrap();
        let ds = tiny_collection()
            .split(
                Split::Val,
                dir.path(),
                MaskAtomType::new(0.3, None),
                FeatureConfig::new(4, true, false),
                1.0,
                0,
            )
            .unwrap();

        assert_eq!(ds.len(), 2);
        let sample = ds.get(0).unwrap();
        assert_eq!(sample.num_nodes, 3);
        assert_eq!(sample.feat_dim, 6);
        assert_eq!(sample.masked_atom_index.len(), 1);
        assert_eq!(sample.masked_atom_type, vec![0]);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_invalid_molecule_rejected() {
        let res = GraphCollection::from_molecules(vec![MolecularGraph::new(vec![9], vec![])], 4);
        assert!(res.is_err());
    }
}
