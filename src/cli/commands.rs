// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the `pretrain` subcommand and all its flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for malformed values
//   - type conversion (string → usize, f64, PathBuf, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::pretrain_use_case::{BackendKind, PretrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pre-train a graph encoder by predicting masked atom types
    Pretrain(PretrainArgs),
}

/// Compute backend selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    /// GPU through wgpu (Vulkan, Metal, DX12)
    Wgpu,
    /// CPU through ndarray
    Ndarray,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Wgpu    => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

/// All arguments for the `pretrain` command.
#[derive(Args, Debug)]
pub struct PretrainArgs {
    // ── Run bookkeeping ──────────────────────────────────────────────────────
    /// Prefix of the run name; the run directory is <title>_<timestamp>
    #[arg(long, default_value = "")]
    pub title: String,

    /// Root directory for run directories and checkpoints (required)
    #[arg(long)]
    pub ckpt: Option<PathBuf>,

    /// Write per-epoch scalars to <tb-root>/<run_name>/scalars.csv
    #[arg(long)]
    pub tb_log: bool,

    #[arg(long, default_value = "runs")]
    pub tb_root: PathBuf,

    /// Debug mode: no run directory, no checkpoints, no scalar log
    #[arg(long)]
    pub debug: bool,

    // ── Data ─────────────────────────────────────────────────────────────────
    /// Molecule collection format: `json` or `jsonl`
    #[arg(long, default_value = "json")]
    pub dataset: String,

    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Folder holding train_index.json and val_index.json (required)
    #[arg(long)]
    pub split_index_folder: Option<PathBuf>,

    /// Add a ring-membership flag to every node
    #[arg(long)]
    pub use_cycle_feat: bool,

    /// Add the node degree to every node
    #[arg(long)]
    pub use_degree_feat: bool,

    /// Fraction of atoms hidden in each molecule
    #[arg(long, default_value_t = 0.15)]
    pub mask_ratio: f64,

    /// Pick masked atoms with probability proportional to their class weight
    #[arg(long)]
    pub weighted_sample_mask: bool,

    /// Weight the cross-entropy loss by inverse class frequency
    #[arg(long)]
    pub weighted_ce: bool,

    /// Fraction of each split actually used
    #[arg(long, default_value_t = 1.0)]
    pub sample_ratio: f64,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Background loader workers; 0 loads on the training thread
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    // ── Model ────────────────────────────────────────────────────────────────
    /// Number of atom types (classifier outputs)
    #[arg(long, default_value_t = 100)]
    pub num_atoms: usize,

    #[arg(long, default_value_t = 128)]
    pub hidden_dim: usize,

    /// Encoder output width before the raw features are appended
    #[arg(long, default_value_t = 64)]
    pub output_dim: usize,

    #[arg(long, default_value_t = 3)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    // ── Optimisation ─────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Number of epochs
    #[arg(long, default_value_t = 100)]
    pub epoch: usize,

    /// Comma-separated device indices, e.g. `0,1`
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub devices: Vec<usize>,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,

    /// Seed for split subsampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// The boundary between Layer 1 and Layer 2:
/// the application layer never sees clap types.
impl From<PretrainArgs> for PretrainConfig {
    fn from(a: PretrainArgs) -> Self {
        PretrainConfig {
            title:                a.title,
            ckpt:                 a.ckpt,
            tb_log:               a.tb_log,
            tb_root:              a.tb_root,
            debug:                a.debug,
            dataset:              a.dataset,
            data_root:            a.data_root,
            split_index_folder:   a.split_index_folder,
            use_cycle_feat:       a.use_cycle_feat,
            use_degree_feat:      a.use_degree_feat,
            mask_ratio:           a.mask_ratio,
            weighted_sample_mask: a.weighted_sample_mask,
            weighted_ce:          a.weighted_ce,
            sample_ratio:         a.sample_ratio,
            batch_size:           a.batch_size,
            num_workers:          a.num_workers,
            num_atoms:            a.num_atoms,
            hidden_dim:           a.hidden_dim,
            output_dim:           a.output_dim,
            num_layers:           a.num_layers,
            dropout:              a.dropout,
            lr:                   a.lr,
            weight_decay:         a.weight_decay,
            epoch:                a.epoch,
            devices:              a.devices,
            backend:              a.backend.into(),
            seed:                 a.seed,
        }
    }
}
