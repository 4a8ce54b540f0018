// ============================================================
// Layer 2 — PretrainUseCase
// ============================================================
// Orchestrates one pre-training run in order:
//
//   Step 1: Validate the configuration     (fail before any I/O)
//   Step 2: Create run directory + config  (Layer 6 - infra, skipped in debug)
//   Step 3: Open the scalar log            (Layer 6 - infra, optional)
//   Step 4: Load and prepare molecules     (Layer 4 - data)
//   Step 5: Build masked train/val splits  (Layer 4 - data)
//   Step 6: Run the training loop          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Context, Result};
use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::{DatasetKind, GraphCollection},
    loader::{load_split_indices, Split},
    splitter::ensure_disjoint,
    transform::{FeatureConfig, MaskAtomType},
};
use crate::infra::{
    checkpoint::{run_name, RunDirectory},
    metrics::{EpochMetrics, ScalarLogger},
};
use crate::ml::trainer::{run_training, RunOutputs};

/// Compute backend for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Wgpu,
    NdArray,
}

// ─── Pre-training Configuration ──────────────────────────────────────────────
// All hyperparameters and paths of one run. Written to
// <ckpt>/<run_name>/args.json so a downstream task can rebuild
// the encoder that produced the checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainConfig {
    pub title:                String,
    pub ckpt:                 Option<PathBuf>,
    pub tb_log:               bool,
    pub tb_root:              PathBuf,
    pub debug:                bool,
    pub dataset:              String,
    pub data_root:            PathBuf,
    pub split_index_folder:   Option<PathBuf>,
    pub use_cycle_feat:       bool,
    pub use_degree_feat:      bool,
    pub mask_ratio:           f64,
    pub weighted_sample_mask: bool,
    pub weighted_ce:          bool,
    pub sample_ratio:         f64,
    pub batch_size:           usize,
    pub num_workers:          usize,
    pub num_atoms:            usize,
    pub hidden_dim:           usize,
    pub output_dim:           usize,
    pub num_layers:           usize,
    pub dropout:              f64,
    pub lr:                   f64,
    pub weight_decay:         f64,
    pub epoch:                usize,
    pub devices:              Vec<usize>,
    pub backend:              BackendKind,
    pub seed:                 u64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            title:                String::new(),
            ckpt:                 None,
            tb_log:               false,
            tb_root:              PathBuf::from("runs"),
            debug:                false,
            dataset:              "json".to_string(),
            data_root:            PathBuf::from("data"),
            split_index_folder:   None,
            use_cycle_feat:       false,
            use_degree_feat:      false,
            mask_ratio:           0.15,
            weighted_sample_mask: false,
            weighted_ce:          false,
            sample_ratio:         1.0,
            batch_size:           32,
            num_workers:          1,
            num_atoms:            100,
            hidden_dim:           128,
            output_dim:           64,
            num_layers:           3,
            dropout:              0.0,
            lr:                   1e-3,
            weight_decay:         0.0,
            epoch:                100,
            devices:              vec![0],
            backend:              BackendKind::Wgpu,
            seed:                 42,
        }
    }
}

impl PretrainConfig {
    /// Reject unusable settings before any file or model is created.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.ckpt.is_some(), "--ckpt is required");
        ensure!(self.split_index_folder.is_some(), "--split-index-folder is required");
        ensure!(
            self.mask_ratio > 0.0 && self.mask_ratio <= 1.0,
            "--mask-ratio must be in (0, 1], got {}", self.mask_ratio
        );
        ensure!(
            self.sample_ratio > 0.0 && self.sample_ratio <= 1.0,
            "--sample-ratio must be in (0, 1], got {}", self.sample_ratio
        );
        ensure!(self.batch_size > 0, "--batch-size must be positive");
        ensure!(self.num_atoms > 0, "--num-atoms must be positive");
        ensure!(!self.devices.is_empty(), "--devices must list at least one device");
        Ok(())
    }
}

// ─── PretrainUseCase ──────────────────────────────────────────────────────────
pub struct PretrainUseCase {
    config: PretrainConfig,
}

impl PretrainUseCase {
    pub fn new(config: PretrainConfig) -> Self {
        Self { config }
    }

    /// Run on the configured backend and devices.
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;
        match cfg.backend {
            BackendKind::Wgpu => {
                let devices = wgpu_devices(&cfg.devices);
                self.run::<Autodiff<Wgpu>>(devices)
            }
            BackendKind::NdArray => {
                if cfg.devices.len() > 1 {
                    tracing::warn!("ndarray backend runs on the CPU only; ignoring extra devices");
                }
                self.run::<Autodiff<NdArray>>(vec![NdArrayDevice::Cpu])
            }
        }
    }

    /// Full pipeline on an explicit backend and device list.
    pub fn run<B: AutodiffBackend>(&self, devices: Vec<B::Device>) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;
        let split_folder = cfg.split_index_folder.as_deref().context("--split-index-folder is required")?;
        let ckpt_root    = cfg.ckpt.as_deref().context("--ckpt is required")?;

        // ── Steps 2-3: Run directory, config snapshot, scalar log ─────────────
        let outputs = if cfg.debug {
            tracing::info!("Debug mode: no run directory, checkpoints or logs");
            RunOutputs::disabled()
        } else {
            let name    = run_name(&cfg.title);
            let run_dir = RunDirectory::create(ckpt_root, &name)?;
            run_dir.save_config(cfg)?;

            let scalars = if cfg.tb_log {
                Some(ScalarLogger::new(cfg.tb_root.join(&name))?)
            } else {
                None
            };
            RunOutputs { run_dir: Some(run_dir), scalars }
        };

        // ── Step 4: Load molecules ────────────────────────────────────────────
        let kind = DatasetKind::from_name(&cfg.dataset)?;
        tracing::info!("Loading '{}' dataset from '{}'", kind, cfg.data_root.display());
        let collection = GraphCollection::load(kind, &cfg.data_root, cfg.num_atoms)?;

        ensure_disjoint(
            &load_split_indices(split_folder, Split::Train)?,
            &load_split_indices(split_folder, Split::Val)?,
        )?;

        let class_weights = (cfg.weighted_sample_mask || cfg.weighted_ce)
            .then(|| collection.compute_class_weights());

        // ── Step 5: Masked splits ─────────────────────────────────────────────
        let transform = MaskAtomType::new(
            cfg.mask_ratio,
            if cfg.weighted_sample_mask { class_weights.clone() } else { None },
        );
        let features = FeatureConfig::new(cfg.num_atoms, cfg.use_cycle_feat, cfg.use_degree_feat);

        let train_dataset = collection.split(
            Split::Train, split_folder, transform.clone(), features, cfg.sample_ratio, cfg.seed,
        )?;
        let val_dataset = collection.split(
            Split::Val, split_folder, transform, features, cfg.sample_ratio, cfg.seed.wrapping_add(1),
        )?;

        // ── Step 6: Training loop (Layer 5) ───────────────────────────────────
        let ce_weights = if cfg.weighted_ce { class_weights } else { None };
        run_training::<B>(cfg, train_dataset, val_dataset, ce_weights, outputs, devices)
    }
}

/// Map device indices to wgpu devices; a lone index 0 means the default adapter.
fn wgpu_devices(ids: &[usize]) -> Vec<WgpuDevice> {
    match ids {
        [0] => vec![WgpuDevice::default()],
        _   => ids.iter().map(|&i| WgpuDevice::DiscreteGpu(i)).collect(),
    }
}
