// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the training loop:
//
//   checkpoint.rs — run directory, args.json, per-epoch
//                   encoder checkpoints and best.mpk
//
//   metrics.rs    — running averages, macro precision,
//                   best-score tracking and the per-epoch
//                   scalar log (scalars.csv)
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Run directory and encoder checkpoints
pub mod checkpoint;

/// Training metrics and scalar logging
pub mod metrics;
