// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and optimiser code lives here.
//
//   model.rs     — graph convolution encoder plus the linear
//                  atom-type classifier used for pre-training
//
//   placement.rs — single vs multi device placement and the
//                  parameter snapshot written to checkpoints
//
//   trainer.rs   — the epoch loop: masked forward pass,
//                  cross-entropy, Adam step, validation,
//                  best-checkpoint tracking
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Kipf & Welling (2017) Graph Convolutional Networks

/// Graph encoder and atom-type classifier
pub mod model;

/// Device placement and checkpoint snapshots
pub mod placement;

/// Training loop with validation and checkpointing
pub mod trainer;
