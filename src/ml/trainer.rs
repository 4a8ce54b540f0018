// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Masked atom-type pre-training with Burn's DataLoader and Adam.
//
// Per epoch:
//   train(epoch) — forward, cross-entropy on masked atoms,
//                  backward, Adam step; running loss and
//                  macro precision; writes <epoch>.mpk
//   eval(epoch)  — forward only on the validation split;
//                  running macro precision; best-score check,
//                  copies <epoch>.mpk to best.mpk on a new best
//
// Burn notes:
//   - Training runs on B (an AutodiffBackend)
//   - model.valid() returns the model on B::InnerBackend, which
//     records no graph; the loop hands that model to eval(), so
//     turning gradients off is the caller's job
//   - Gradients come fresh out of every backward pass, there is
//     nothing to zero between steps
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use crate::application::pretrain_use_case::PretrainConfig;
use crate::data::{
    batcher::{GraphBatch, GraphBatcher},
    dataset::MaskedAtomDataset,
};
use crate::infra::{
    checkpoint::RunDirectory,
    metrics::{macro_precision, AverageMeter, BestScore, EpochMetrics, ScalarLogger},
};
use crate::ml::model::{GraphEncoderConfig, PretrainModel};
use crate::ml::placement::{placement_for, ParameterSnapshot};

/// Where a run writes its side effects. Both are `None` in debug mode.
#[derive(Default)]
pub struct RunOutputs {
    pub run_dir: Option<RunDirectory>,
    pub scalars: Option<ScalarLogger>,
}

impl RunOutputs {
    /// Debug mode: nothing touches the filesystem.
    pub fn disabled() -> Self {
        Self::default()
    }
}

type TrainLoader<B> = Arc<dyn DataLoader<B, GraphBatch<B>>>;
type ValidLoader<B> = Arc<
    dyn DataLoader<<B as AutodiffBackend>::InnerBackend, GraphBatch<<B as AutodiffBackend>::InnerBackend>>,
>;

/// One training session: model, optimizer, loaders and all mutable run state.
pub struct Trainer<B: AutodiffBackend, O> {
    model:         PretrainModel<B>,
    optim:         O,
    criterion:     CrossEntropyLoss<B>,
    train_loader:  TrainLoader<B>,
    val_loader:    ValidLoader<B>,
    train_batches: usize,
    val_batches:   usize,
    placement:     Box<dyn ParameterSnapshot<B>>,
    outputs:       RunOutputs,
    best:          BestScore,
    lr:            f64,
    epochs:        usize,
    num_atoms:     usize,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<PretrainModel<B>, B>,
{
    pub fn model(&self) -> &PretrainModel<B> {
        &self.model
    }

    pub fn best_score(&self) -> f64 {
        self.best.best()
    }

    /// One pass over the training split. Returns (mean loss, mean macro precision).
    pub fn train(&mut self, epoch: usize) -> Result<(f64, f64)> {
        let mut loss_meter     = AverageMeter::new();
        let mut accuracy_meter = AverageMeter::new();
        let bar = progress_bar(self.train_batches);

        for batch in self.train_loader.iter() {
            let logits = self.model.forward_masked(&batch);
            let loss   = self.criterion.forward(logits.clone(), batch.masked_atom_type.clone());
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optim.step(self.lr, self.model.clone(), grads);

            loss_meter.update(loss_val);
            let pred  = int_values(logits.argmax(1).flatten::<1>(0, 1));
            let truth = int_values(batch.masked_atom_type);
            accuracy_meter.update(macro_precision(&truth, &pred, self.num_atoms));

            bar.set_message(format!(
                "[{}/{}] loss: {:.4}, accuracy: {:.4}",
                epoch, self.epochs, loss_meter.avg(), accuracy_meter.avg(),
            ));
            bar.inc(1);
        }
        bar.finish();

        if let Some(scalars) = &self.outputs.scalars {
            scalars.add_scalar("loss", loss_meter.avg(), epoch)?;
            scalars.add_scalar("train_accuracy", accuracy_meter.avg(), epoch)?;
        }

        if let Some(run_dir) = &self.outputs.run_dir {
            let record = self.placement.snapshot(&self.model.encoder);
            run_dir.save_epoch(record, epoch)?;
        }

        Ok((loss_meter.avg(), accuracy_meter.avg()))
    }

    /// One pass over the validation split with a gradient-free model.
    /// Returns (mean macro precision, whether it is a new best).
    pub fn eval(&mut self, epoch: usize, model: &PretrainModel<B::InnerBackend>) -> Result<(f64, bool)> {
        let mut accuracy_meter = AverageMeter::new();
        let bar = progress_bar(self.val_batches);

        for batch in self.val_loader.iter() {
            let logits = model.forward_masked(&batch);
            let pred   = int_values(logits.argmax(1).flatten::<1>(0, 1));
            let truth  = int_values(batch.masked_atom_type);
            accuracy_meter.update(macro_precision(&truth, &pred, self.num_atoms));

            bar.set_message(format!(
                "[{}/{}] accuracy: {:.4}",
                epoch, self.epochs, accuracy_meter.avg(),
            ));
            bar.inc(1);
        }
        bar.finish();

        let accuracy = accuracy_meter.avg();
        if let Some(scalars) = &self.outputs.scalars {
            scalars.add_scalar("val_accuracy", accuracy, epoch)?;
        }

        let is_best = self.best.update(accuracy);
        if is_best {
            if let Some(run_dir) = &self.outputs.run_dir {
                run_dir.mark_best(epoch)?;
            }
        }

        Ok((accuracy, is_best))
    }
}

/// Build the model, loss, optimizer and loaders for one run.
pub fn build_trainer<B: AutodiffBackend>(
    cfg:           &PretrainConfig,
    train_dataset: MaskedAtomDataset,
    val_dataset:   MaskedAtomDataset,
    class_weights: Option<Vec<f32>>,
    outputs:       RunOutputs,
    devices:       Vec<B::Device>,
) -> Result<Trainer<B, impl Optimizer<PretrainModel<B>, B>>> {
    let placement = placement_for::<B>(devices)?;
    let device    = placement.primary_device().clone();
    tracing::info!("Placement: {}", placement.describe());

    // ── Build model ───────────────────────────────────────────────────────────
    let features = train_dataset.features();
    let encoder_cfg = GraphEncoderConfig::new(features.dim(), cfg.hidden_dim, cfg.output_dim)
        .with_num_layers(cfg.num_layers)
        .with_dropout(cfg.dropout);
    let model: PretrainModel<B> = PretrainModel::new(&encoder_cfg, cfg.num_atoms, &device);
    tracing::info!(
        "Model ready: {} graph layers, node features {}, classifier input {}",
        cfg.num_layers, features.dim(), encoder_cfg.embedding_dim(),
    );

    // ── Loss ──────────────────────────────────────────────────────────────────
    let weighted = class_weights.is_some();
    let criterion = CrossEntropyLossConfig::new()
        .with_weights(class_weights)
        .init(&device);
    tracing::info!("Cross-entropy loss ({})", if weighted { "class weighted" } else { "unweighted" });

    // ── Adam over encoder and classifier together ─────────────────────────────
    let optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
        .init::<B, PretrainModel<B>>();

    // ── Loaders ───────────────────────────────────────────────────────────────
    let train_batches = train_dataset.len().div_ceil(cfg.batch_size);
    let val_batches   = val_dataset.len().div_ceil(cfg.batch_size);

    let mut train_builder = DataLoaderBuilder::<B, _, _>::new(GraphBatcher::new())
        .batch_size(cfg.batch_size)
        .set_device(device.clone());
    let mut val_builder = DataLoaderBuilder::<B::InnerBackend, _, _>::new(GraphBatcher::new())
        .batch_size(cfg.batch_size)
        .set_device(device.clone());
    if cfg.num_workers > 0 {
        train_builder = train_builder.num_workers(cfg.num_workers);
        val_builder   = val_builder.num_workers(cfg.num_workers);
    }
    let train_loader = train_builder.build(train_dataset);
    let val_loader   = val_builder.build(val_dataset);

    Ok(Trainer {
        model,
        optim,
        criterion,
        train_loader,
        val_loader,
        train_batches,
        val_batches,
        placement,
        outputs,
        best: BestScore::new(),
        lr: cfg.lr,
        epochs: cfg.epoch,
        num_atoms: cfg.num_atoms,
    })
}

/// Build a trainer, then run every epoch: train, then eval on a gradient-free copy.
pub fn run_training<B: AutodiffBackend>(
    cfg:           &PretrainConfig,
    train_dataset: MaskedAtomDataset,
    val_dataset:   MaskedAtomDataset,
    class_weights: Option<Vec<f32>>,
    outputs:       RunOutputs,
    devices:       Vec<B::Device>,
) -> Result<Vec<EpochMetrics>> {
    let mut trainer =
        build_trainer::<B>(cfg, train_dataset, val_dataset, class_weights, outputs, devices)?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut history = Vec::with_capacity(cfg.epoch);
    for epoch in 1..=cfg.epoch {
        let (loss, train_accuracy) = trainer.train(epoch)?;

        let valid_model = trainer.model().valid();
        let (val_accuracy, is_best) = trainer.eval(epoch, &valid_model)?;

        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | train_acc={:.4} | val_acc={:.4}{}",
            epoch, cfg.epoch, loss, train_accuracy, val_accuracy,
            if is_best { " | best" } else { "" },
        );
        history.push(EpochMetrics { epoch, loss, train_accuracy, val_accuracy, is_best });
    }

    tracing::info!("Pre-training complete, best val accuracy {:.4}", trainer.best_score());
    Ok(history)
}

fn int_values<B: Backend>(t: Tensor<B, 1, Int>) -> Vec<usize> {
    t.into_data().iter::<i64>().map(|v| v as usize).collect()
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{wide_msg} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use std::fs;

    use crate::data::dataset::PreparedGraph;
    use crate::data::transform::{FeatureConfig, MaskAtomType};
    use crate::domain::molecule::MolecularGraph;
    use crate::infra::checkpoint::RunDirectory;

    type TestBackend = Autodiff<NdArray<f32>>;

    const NUM_ATOMS: usize = 3;

    fn tiny_config() -> PretrainConfig {
        PretrainConfig {
            num_atoms:   NUM_ATOMS,
            hidden_dim:  8,
            output_dim:  4,
            num_layers:  2,
            batch_size:  2,
            num_workers: 0,
            lr:          1e-2,
            epoch:       2,
            ..PretrainConfig::default()
        }
    }

    /// Every atom is masked, so each read of a molecule yields the same sample.
    fn fully_masked_dataset() -> MaskedAtomDataset {
        let graphs = vec![
            MolecularGraph::new(vec![0, 1, 2], vec![[0, 1], [1, 2], [2, 0]]),
            MolecularGraph::new(vec![2, 0], vec![[0, 1]]),
            MolecularGraph::new(vec![1, 1, 0, 2], vec![[0, 1], [1, 2], [2, 3]]),
            MolecularGraph::new(vec![0, 2, 2], vec![[0, 1], [0, 2]]),
        ]
        .into_iter()
        .map(PreparedGraph::new)
        .collect();

        MaskedAtomDataset::new(
            Arc::new(graphs),
            vec![0, 1, 2, 3],
            MaskAtomType::new(1.0, None),
            FeatureConfig::new(NUM_ATOMS, true, false),
        )
        .unwrap()
    }

    #[test]
    fn test_train_writes_epoch_checkpoint() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = RunDirectory::create(root.path(), "run").unwrap();
        let epoch_file = run_dir.epoch_path(1);
        let outputs = RunOutputs { run_dir: Some(run_dir), scalars: None };

        let mut trainer = build_trainer::<TestBackend>(
            &tiny_config(), fully_masked_dataset(), fully_masked_dataset(),
            None, outputs, vec![Default::default()],
        )
        .unwrap();

        let (loss, accuracy) = trainer.train(1).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(epoch_file.exists());
    }

    #[test]
    fn test_equal_val_score_keeps_previous_best() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = RunDirectory::create(root.path(), "tie").unwrap();
        let (first_file, second_file, best_file) =
            (run_dir.epoch_path(1), run_dir.epoch_path(2), run_dir.best_path());
        let outputs = RunOutputs { run_dir: Some(run_dir), scalars: None };

        let mut trainer = build_trainer::<TestBackend>(
            &tiny_config(), fully_masked_dataset(), fully_masked_dataset(),
            None, outputs, vec![Default::default()],
        )
        .unwrap();

        trainer.train(1).unwrap();
        let frozen = trainer.model().valid();
        let (first, is_best) = trainer.eval(1, &frozen).unwrap();
        assert!(is_best);

        // Weights move in epoch 2, but the same frozen model scores the same.
        trainer.train(2).unwrap();
        let (second, is_best) = trainer.eval(2, &frozen).unwrap();
        assert_eq!(first, second);
        assert!(!is_best);
        assert_eq!(trainer.best_score(), first);

        let best = fs::read(&best_file).unwrap();
        assert_eq!(best, fs::read(&first_file).unwrap());
        assert_ne!(best, fs::read(&second_file).unwrap());
    }

    #[test]
    fn test_train_and_eval_without_run_directory() {
        let mut trainer = build_trainer::<TestBackend>(
            &tiny_config(), fully_masked_dataset(), fully_masked_dataset(),
            None, RunOutputs::disabled(), vec![Default::default()],
        )
        .unwrap();

        trainer.train(1).unwrap();
        let frozen = trainer.model().valid();
        let (_, is_best) = trainer.eval(1, &frozen).unwrap();
        assert!(is_best, "first epoch beats the initial score");
    }
}
