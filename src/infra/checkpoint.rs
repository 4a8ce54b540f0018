// ============================================================
// Layer 6 — Run Directory and Checkpoints
// ============================================================
// Every non-debug run gets its own directory:
//
//   <ckpt_root>/<run_name>/
//     args.json   ← the full run configuration
//     1.mpk       ← encoder weights after epoch 1
//     2.mpk       ← encoder weights after epoch 2
//     ...
//     best.mpk    ← byte copy of the epoch with the best
//                   validation accuracy
//
// The run name is `<title>_<timestamp>` (or just the
// timestamp without a title), so repeated runs never write
// into each other's directories.
//
// Weights are written with Burn's NamedMpkFileRecorder at full
// precision. Only the encoder is stored; a downstream task
// rebuilds the encoder from args.json and loads the weights.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::ml::model::{GraphEncoder, GraphEncoderRecord};

/// File extension NamedMpkFileRecorder appends to checkpoint paths
pub const CHECKPOINT_EXT: &str = "mpk";

const CONFIG_FILE: &str = "args.json";
const BEST_NAME: &str = "best";

/// Unique name for one training invocation.
pub fn run_name(title: &str) -> String {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let title = title.trim();
    if title.is_empty() {
        stamp.to_string()
    } else {
        format!("{title}_{stamp}")
    }
}

/// Owns `<ckpt_root>/<run_name>/` and everything written into it.
pub struct RunDirectory {
    dir: PathBuf,
}

impl RunDirectory {
    /// Create the run directory (and any missing parents).
    pub fn create(ckpt_root: impl AsRef<Path>, run_name: &str) -> Result<Self> {
        let dir = ckpt_root.as_ref().join(run_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        tracing::info!("Run directory: '{}'", dir.display());
        Ok(Self { dir })
    }

    /// Open an existing run directory for reading checkpoints back.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the run configuration as pretty JSON.
    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<C: DeserializeOwned>(&self) -> Result<C> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Full path of the checkpoint file for an epoch.
    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch}.{CHECKPOINT_EXT}"))
    }

    pub fn best_path(&self) -> PathBuf {
        self.dir.join(format!("{BEST_NAME}.{CHECKPOINT_EXT}"))
    }

    /// Write `<epoch>.mpk` from an encoder parameter snapshot.
    pub fn save_epoch<B: Backend>(&self, record: GraphEncoderRecord<B>, epoch: usize) -> Result<PathBuf> {
        // The recorder adds the extension itself
        let stem = self.dir.join(epoch.to_string());
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(record, stem.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", stem.display()))?;

        let path = self.epoch_path(epoch);
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }

    /// Duplicate an epoch's checkpoint as `best.mpk`.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        let from = self.epoch_path(epoch);
        let to   = self.best_path();
        fs::copy(&from, &to).with_context(|| {
            format!("Cannot copy '{}' to '{}'", from.display(), to.display())
        })?;
        tracing::info!("Epoch {} is the new best checkpoint", epoch);
        Ok(())
    }

    /// Load a checkpoint (`"best"` or an epoch number) into `encoder`.
    pub fn load_encoder<B: Backend>(
        &self,
        encoder: GraphEncoder<B>,
        name:    &str,
        device:  &B::Device,
    ) -> Result<GraphEncoder<B>> {
        let stem = self.dir.join(name);
        let record: GraphEncoderRecord<B> = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(stem.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", stem.display()))?;
        Ok(encoder.load_record(record))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::model::GraphEncoderConfig;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_run_name_keeps_title() {
        assert!(run_name("zinc_mask").starts_with("zinc_mask_"));
        assert!(!run_name("").starts_with('_'));
    }

    #[test]
    fn test_save_mark_best_and_reload() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "r").unwrap();
        let device = Default::default();
        let cfg = GraphEncoderConfig::new(4, 6, 3);
        let encoder = cfg.init::<TestBackend>(&device);

        let path = run.save_epoch(encoder.clone().into_record(), 1).unwrap();
        assert_eq!(path, root.path().join("r").join("1.mpk"));
        assert!(path.exists());

        run.mark_best(1).unwrap();
        assert_eq!(fs::read(run.best_path()).unwrap(), fs::read(&path).unwrap());

        let fresh  = cfg.init::<TestBackend>(&device);
        let loaded = run.load_encoder(fresh, "best", &device).unwrap();
        loaded
            .input_proj
            .weight
            .val()
            .into_data()
            .assert_eq(&encoder.input_proj.weight.val().into_data(), true);
    }

    #[test]
    fn test_config_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "cfg").unwrap();
        run.save_config(&vec![1usize, 2, 3]).unwrap();
        let back: Vec<usize> = run.load_config().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_mark_best_without_checkpoint_fails() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "empty").unwrap();
        assert!(run.mark_best(3).is_err());
    }
}
