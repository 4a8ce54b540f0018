// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only sees `GraphSource`, so the
// on-disk format of the molecule collection can change
// without touching the training workflow.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::molecule::MolecularGraph;

// ─── GraphSource ──────────────────────────────────────────────────────────────
/// Any component that can load the full, ordered molecule collection.
///
/// Implementations:
///   - JsonGraphLoader      → one JSON array file
///   - JsonLinesGraphLoader → one molecule per line
pub trait GraphSource {
    /// Load every molecule, in the order split indices refer to them.
    fn load_all(&self) -> Result<Vec<MolecularGraph>>;
}
