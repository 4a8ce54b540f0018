// ============================================================
// Layer 6 — Metrics
// ============================================================
// Everything the training loop measures:
//
//   AverageMeter    — running mean, reset every epoch
//   macro_precision — unweighted mean of per-class precision
//                     over the FULL atom vocabulary
//   BestScore       — best validation accuracy so far
//   ScalarLogger    — per-epoch scalar series on disk
//
// Why macro precision over the full vocabulary?
//   A model that always predicts carbon scores well on plain
//   accuracy. Averaging per-class precision with every class
//   counted (absent classes score 0) penalises that collapse.
//
// Scalar log file: <log_root>/<run_name>/scalars.csv
//
//   tag,epoch,value
//   loss,1,2.301245
//   train_accuracy,1,0.081200
//   val_accuracy,1,0.094400
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

// ─── AverageMeter ─────────────────────────────────────────────────────────────
/// Running mean of a per-batch value.
#[derive(Debug, Clone, Default)]
pub struct AverageMeter {
    sum:   f64,
    count: usize,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.sum   += value;
        self.count += 1;
    }

    /// Mean of all values seen so far; 0.0 before the first update.
    pub fn avg(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum / self.count as f64 }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

// ─── Macro precision ──────────────────────────────────────────────────────────
/// Macro-averaged precision over labels `0..num_classes`.
///
/// Precision of a class that was never predicted is 0, and every class
/// counts toward the mean whether or not it appears in `truth`.
pub fn macro_precision(truth: &[usize], pred: &[usize], num_classes: usize) -> f64 {
    if num_classes == 0 {
        return 0.0;
    }

    let mut true_pos  = vec![0usize; num_classes];
    let mut predicted = vec![0usize; num_classes];
    for (&t, &p) in truth.iter().zip(pred) {
        if p < num_classes {
            predicted[p] += 1;
            if t == p {
                true_pos[p] += 1;
            }
        }
    }

    let total: f64 = true_pos
        .iter()
        .zip(&predicted)
        .map(|(&tp, &n)| if n == 0 { 0.0 } else { tp as f64 / n as f64 })
        .sum();
    total / num_classes as f64
}

// ─── BestScore ────────────────────────────────────────────────────────────────
/// Best validation accuracy seen so far. Starts below any valid score.
#[derive(Debug, Clone)]
pub struct BestScore {
    best: f64,
}

impl Default for BestScore {
    fn default() -> Self {
        Self { best: -1.0 }
    }
}

impl BestScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `score`; returns true only on a strict improvement.
    pub fn update(&mut self, score: f64) -> bool {
        if score > self.best {
            self.best = score;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// Summary of one epoch, returned by the training loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    /// Mean cross-entropy over training batches
    pub loss:           f64,
    /// Mean per-batch macro precision on training batches
    pub train_accuracy: f64,
    /// Mean per-batch macro precision on validation batches
    pub val_accuracy:   f64,
    /// Whether this epoch set a new best validation accuracy
    pub is_best:        bool,
}

// ─── ScalarLogger ─────────────────────────────────────────────────────────────
/// Appends `tag,epoch,value` rows to a CSV file.
pub struct ScalarLogger {
    csv_path: PathBuf,
}

impl ScalarLogger {
    pub const FILE_NAME: &'static str = "scalars.csv";

    /// Create the log directory and write the CSV header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join(Self::FILE_NAME);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "tag,epoch,value")?;
            tracing::debug!("Created scalar log: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn add_scalar(&self, tag: &str, value: f64, epoch: usize) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{tag},{epoch},{value:.6}")?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_meter_is_arithmetic_mean() {
        let values = [0.5, 1.25, 3.0, 0.125];
        let mut meter = AverageMeter::new();
        for v in values {
            meter.update(v);
        }
        assert_eq!(meter.avg(), values.iter().sum::<f64>() / values.len() as f64);
        assert_eq!(meter.count(), 4);
    }

    #[test]
    fn test_average_meter_empty() {
        assert_eq!(AverageMeter::new().avg(), 0.0);
    }

    #[test]
    fn test_macro_precision_counts_absent_classes() {
        // Perfect on the two classes present, three classes never seen
        let p = macro_precision(&[0, 1, 1], &[0, 1, 1], 5);
        assert!((p - 2.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_macro_precision_penalises_collapse() {
        // Always predicting class 0: precision(0) = 2/4, others 0
        let p = macro_precision(&[0, 0, 1, 2], &[0, 0, 0, 0], 3);
        assert!((p - 0.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_macro_precision_bounds() {
        assert_eq!(macro_precision(&[], &[], 4), 0.0);
        let p = macro_precision(&[3, 3, 3], &[0, 1, 2], 4);
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(macro_precision(&[0, 1], &[0, 1], 2), 1.0);
    }

    #[test]
    fn test_best_score_strict_improvement() {
        let mut best = BestScore::new();
        assert!(best.update(0.0));
        assert!(best.update(0.4));
        assert!(!best.update(0.4));
        assert!(!best.update(0.2));
        assert!(best.update(0.41));
        assert_eq!(best.best(), 0.41);
    }

    #[test]
    fn test_scalar_logger_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ScalarLogger::new(dir.path().join("run")).unwrap();
        logger.add_scalar("loss", 1.5, 1).unwrap();
        logger.add_scalar("val_accuracy", 0.25, 1).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["tag,epoch,value", "loss,1,1.500000", "val_accuracy,1,0.250000"]);
    }
}
