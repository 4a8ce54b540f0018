// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from molecule files on disk
// all the way to tensor batches.
//
//   graphs.json / graphs.jsonl
//       │
//       ▼
//   GraphLoader        → reads molecules (atom types + bonds)
//       │
//       ▼
//   GraphCollection    → validates, precomputes rings, degrees
//       │                and normalised adjacency
//       ▼
//   split indices      → train_index.json / val_index.json,
//       │                optionally subsampled
//       ▼
//   MaskAtomType       → hides atoms, builds node features
//       │
//       ▼
//   MaskedAtomDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   GraphBatcher       → block-diagonal graph batches
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads molecule collections and split index files
pub mod loader;

/// Node features and random atom-type masking
pub mod transform;

/// Prepared molecules and Burn's Dataset implementation
pub mod dataset;

/// Implements Burn's Batcher trait for variable-size graphs
pub mod batcher;

/// Split subsampling and overlap checks
pub mod splitter;
