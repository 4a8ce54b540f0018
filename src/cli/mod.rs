// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// One command is supported:
//   `pretrain` — masked atom-type pre-training of a graph
//                encoder, writing per-epoch checkpoints
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PretrainArgs};
use crate::infra::metrics::EpochMetrics;

#[derive(Parser, Debug)]
#[command(
    name = "masked-atom-pretrain",
    version = "0.1.0",
    about = "Pre-train a molecular graph encoder by predicting masked atom types."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Pretrain(args) => run_pretrain(args),
        }
    }
}

fn run_pretrain(args: PretrainArgs) -> Result<()> {
    use crate::application::pretrain_use_case::PretrainUseCase;

    tracing::info!("Starting pre-training on '{}' ({})", args.data_root.display(), args.dataset);

    let history = PretrainUseCase::new(args.into()).execute()?;
    println!("Pre-training complete. Best checkpoint: {}", best_summary(&history));
    Ok(())
}

/// The most recent epoch flagged as best is the one `best.mpk` holds.
fn best_summary(history: &[EpochMetrics]) -> String {
    history
        .iter()
        .rfind(|m| m.is_best)
        .map(|m| format!("epoch {} (val accuracy {:.4})", m.epoch, m.val_accuracy))
        .unwrap_or_else(|| "none".to_string())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pretrain_use_case::{BackendKind, PretrainConfig};

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "masked-atom-pretrain", "pretrain",
            "--title", "zinc",
            "--ckpt", "ckpt",
            "--split-index-folder", "splits",
            "--dataset", "jsonl",
            "--use-cycle-feat",
            "--weighted-ce",
            "--mask-ratio", "0.25",
            "--devices", "0,1",
            "--backend", "ndarray",
            "--epoch", "5",
        ])
        .unwrap();

        let Commands::Pretrain(args) = cli.command;
        let cfg: PretrainConfig = args.into();
        assert_eq!(cfg.title, "zinc");
        assert_eq!(cfg.dataset, "jsonl");
        assert!(cfg.use_cycle_feat);
        assert!(!cfg.use_degree_feat);
        assert!(cfg.weighted_ce);
        assert_eq!(cfg.mask_ratio, 0.25);
        assert_eq!(cfg.devices, vec![0, 1]);
        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert_eq!(cfg.epoch, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_best_summary_reports_latest_best_epoch() {
        let epoch = |epoch, val_accuracy, is_best| EpochMetrics {
            epoch, loss: 1.0, train_accuracy: 0.5, val_accuracy, is_best,
        };
        let history = vec![epoch(1, 0.2, true), epoch(2, 0.4, true), epoch(3, 0.4, false)];
        assert_eq!(best_summary(&history), "epoch 2 (val accuracy 0.4000)");
        assert_eq!(best_summary(&[]), "none");
    }

    #[test]
    fn test_defaults_leave_mandatory_paths_unset() {
        let cli = Cli::try_parse_from(["masked-atom-pretrain", "pretrain"]).unwrap();
        let Commands::Pretrain(args) = cli.command;
        let cfg: PretrainConfig = args.into();
        assert!(cfg.ckpt.is_none());
        assert!(cfg.validate().is_err());
    }
}
