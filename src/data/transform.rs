// ============================================================
// Layer 4 — Node Features and Atom-Type Masking
// ============================================================
// Turns a prepared molecule into a training sample:
//
//   1. Pick which atoms to hide (MaskAtomType)
//   2. Build the per-node input features, with hidden atoms
//      showing the mask token instead of their type
//   3. Record the hidden atoms' true types as targets
//
// Node feature layout (FeatureConfig::dim() columns):
//
//   [ one-hot atom type (num_atoms) | mask token (1) | ring? | degree? ]
//
// The ring and degree columns only exist when enabled.
//
// A fresh mask is drawn every time a sample is read, so the
// model sees different hidden atoms for the same molecule on
// every epoch.

use rand::{seq::index, seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::data::dataset::{MaskedGraphSample, PreparedGraph};

/// Shape of the per-node input features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub num_atoms:   usize,
    pub cycle_feat:  bool,
    pub degree_feat: bool,
}

impl FeatureConfig {
    pub fn new(num_atoms: usize, cycle_feat: bool, degree_feat: bool) -> Self {
        Self { num_atoms, cycle_feat, degree_feat }
    }

    /// Column index of the mask token in the one-hot block
    pub fn mask_slot(&self) -> usize {
        self.num_atoms
    }

    /// Total number of feature columns per node
    pub fn dim(&self) -> usize {
        self.num_atoms + 1 + self.cycle_feat as usize + self.degree_feat as usize
    }
}

/// Hides a fraction of the atom types in each molecule.
#[derive(Debug, Clone)]
pub struct MaskAtomType {
    mask_ratio: f64,
    /// Per-class sampling weights; `None` samples atoms uniformly
    weight: Option<Vec<f32>>,
}

// Zero-weight classes stay selectable so a molecule can always be masked.
const MIN_SAMPLE_WEIGHT: f64 = 1e-6;

impl MaskAtomType {
    pub fn new(mask_ratio: f64, weight: Option<Vec<f32>>) -> Self {
        Self { mask_ratio, weight }
    }

    /// How many atoms of an `n`-atom molecule get masked: at least one.
    pub fn num_masked(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        ((n as f64 * self.mask_ratio).round() as usize).clamp(1, n)
    }

    /// Pick distinct atom positions to hide, sorted ascending.
    pub fn sample_positions<R: Rng + ?Sized>(&self, atom_types: &[usize], rng: &mut R) -> Vec<usize> {
        let n = atom_types.len();
        let k = self.num_masked(n);

        let mut picked: Vec<usize> = match &self.weight {
            Some(weight) => {
                let positions: Vec<usize> = (0..n).collect();
                let weighted = positions.choose_multiple_weighted(rng, k, |&i| {
                    f64::from(weight.get(atom_types[i]).copied().unwrap_or(0.0)).max(MIN_SAMPLE_WEIGHT)
                });
                match weighted {
                    Ok(iter) => iter.copied().collect(),
                    Err(e) => {
                        tracing::warn!("Weighted mask sampling failed ({e}); falling back to uniform");
                        index::sample(rng, n, k).into_vec()
                    }
                }
            }
            None => index::sample(rng, n, k).into_vec(),
        };

        picked.sort_unstable();
        picked
    }

    /// Build a masked training sample from a prepared molecule.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        graph:    &PreparedGraph,
        features: &FeatureConfig,
        rng:      &mut R,
    ) -> MaskedGraphSample {
        let atom_types = &graph.molecule.atom_types;
        let masked_atom_index = self.sample_positions(atom_types, rng);
        let masked_atom_type: Vec<usize> = masked_atom_index.iter().map(|&i| atom_types[i]).collect();

        let dim = features.dim();
        let n   = atom_types.len();
        let mut node_features = vec![0.0f32; n * dim];

        for (atom, &atom_type) in atom_types.iter().enumerate() {
            let row = &mut node_features[atom * dim..(atom + 1) * dim];
            let slot = if masked_atom_index.binary_search(&atom).is_ok() {
                features.mask_slot()
            } else {
                atom_type
            };
            row[slot] = 1.0;

            let mut col = features.num_atoms + 1;
            if features.cycle_feat {
                row[col] = if graph.in_ring[atom] { 1.0 } else { 0.0 };
                col += 1;
            }
            if features.degree_feat {
                row[col] = graph.degrees[atom] as f32;
            }
        }

        MaskedGraphSample {
            num_nodes: n,
            feat_dim: dim,
            node_features,
            adjacency: graph.adjacency.clone(),
            masked_atom_index,
            masked_atom_type,
        }
    }
}
