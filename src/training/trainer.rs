//! Training and evaluation loop for the hybrid model
//!
//! This module provides the epoch loop with the combined reconstruction +
//! entropy objective, evaluation with gradients disabled, and optional
//! checkpointing of the best epoch.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tch::nn::{self, OptimizerConfig};
use tracing::{debug, info};

use super::losses::{combined_loss, reconstruction_loss, DEFAULT_LAMBDA_ENTROPY};
use super::metrics::EpochMetrics;
use crate::context::{ExecutionContext, GradMode};
use crate::data::{DataLoader, WindowDataset};
use crate::error::{AnomalyError, Result};
use crate::model::HybridModel;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Weight decay (L2 regularization)
    pub weight_decay: f64,
    /// Weight of the attention entropy term
    pub lambda_entropy: f64,
    /// Shuffle windows every epoch
    pub shuffle: bool,
    /// Seed for shuffling; random when absent
    pub seed: Option<u64>,
    /// Log every N epochs
    pub log_interval: usize,
    /// Path to save the best model
    pub checkpoint_path: Option<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 16,
            learning_rate: 0.001,
            weight_decay: 0.0,
            lambda_entropy: DEFAULT_LAMBDA_ENTROPY,
            shuffle: true,
            seed: Some(42),
            log_interval: 1,
            checkpoint_path: None,
        }
    }
}

/// Trainer for hybrid models
pub struct Trainer {
    config: TrainingConfig,
    ctx: ExecutionContext,
}

impl Trainer {
    /// Create a trainer on CUDA if available, otherwise the CPU
    pub fn new(config: TrainingConfig) -> Self {
        Self::with_context(config, ExecutionContext::auto())
    }

    /// Create a trainer bound to a specific device
    pub fn with_context(config: TrainingConfig, ctx: ExecutionContext) -> Self {
        info!("Using device: {:?}", ctx.device());
        Self { config, ctx }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train the model
    ///
    /// Returns the metrics of every epoch. A NaN or infinite batch loss stops
    /// training with [`AnomalyError::NonFiniteLoss`].
    pub fn train(
        &self,
        model: &mut HybridModel,
        train_data: &WindowDataset,
        val_data: Option<&WindowDataset>,
    ) -> Result<Vec<EpochMetrics>> {
        self.check_dataset(model, train_data)?;
        if let Some(val) = val_data {
            self.check_dataset(model, val)?;
        }

        if model.device() != self.ctx.device() {
            model.var_store_mut().set_device(self.ctx.device());
        }

        let mut optimizer = nn::Adam::default()
            .wd(self.config.weight_decay)
            .build(model.var_store(), self.config.learning_rate)?;

        let mut loader = match self.config.seed {
            Some(seed) => DataLoader::seeded(
                train_data.len(),
                self.config.batch_size,
                self.config.shuffle,
                seed,
            ),
            None => DataLoader::new(train_data.len(), self.config.batch_size, self.config.shuffle),
        };

        info!(
            "Training on {} windows ({} batches/epoch) for {} epochs",
            train_data.len(),
            loader.num_batches(),
            self.config.epochs
        );

        let pb = ProgressBar::new(self.config.epochs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut history: Vec<EpochMetrics> = Vec::with_capacity(self.config.epochs);
        let mut best: Option<EpochMetrics> = None;

        for epoch in 1..=self.config.epochs {
            loader.reset();
            let mut metrics = self.train_epoch(model, &mut optimizer, train_data, &mut loader, epoch)?;

            if let Some(val) = val_data {
                metrics.val_loss = Some(self.evaluate(model, val)?);
            }

            if metrics.improved_over(best.as_ref()) {
                if let Some(ref path) = self.config.checkpoint_path {
                    model.save(path)?;
                    debug!("Saved best model to {}", path);
                }
                best = Some(metrics.clone());
            }

            if self.config.log_interval > 0 && epoch % self.config.log_interval == 0 {
                info!("{}", metrics);
            }

            pb.set_message(format!("loss {:.6}", metrics.train_loss));
            pb.inc(1);
            history.push(metrics);
        }

        pb.finish_with_message("Training complete");

        if let Some(best) = best {
            info!(
                "Best epoch {} with loss {:.6}",
                best.epoch,
                best.monitored_loss()
            );
        }

        Ok(history)
    }

    /// Train for one epoch
    fn train_epoch(
        &self,
        model: &HybridModel,
        optimizer: &mut nn::Optimizer,
        data: &WindowDataset,
        loader: &mut DataLoader,
        epoch: usize,
    ) -> Result<EpochMetrics> {
        let ctx = self.ctx.train();
        let _grad = GradMode::Enabled.enter();
        let start = Instant::now();

        let mut metrics = EpochMetrics::new(epoch);
        let mut total = 0.0;
        let mut recon_total = 0.0;
        let mut entropy_total = 0.0;

        for (batch_idx, indices) in loader.by_ref().enumerate() {
            let x = data.batch(&indices, ctx.device())?;

            let out = model.forward(&x, &ctx)?;
            let loss = combined_loss(
                &x,
                &out.reconstruction,
                &out.attention,
                self.config.lambda_entropy,
            );

            let value = loss.total.double_value(&[]);
            if !value.is_finite() {
                return Err(AnomalyError::NonFiniteLoss {
                    epoch,
                    batch: batch_idx,
                    value,
                });
            }

            optimizer.zero_grad();
            loss.total.backward();
            optimizer.step();

            total += value;
            recon_total += loss.reconstruction.double_value(&[]);
            entropy_total += loss.entropy.double_value(&[]);
            metrics.steps += 1;
        }

        let steps = metrics.steps.max(1) as f64;
        metrics.train_loss = total / steps;
        metrics.reconstruction_loss = recon_total / steps;
        metrics.entropy_loss = entropy_total / steps;
        metrics.duration = start.elapsed();

        Ok(metrics)
    }

    /// Mean reconstruction loss over all batches, without gradient tracking
    pub fn evaluate(&self, model: &HybridModel, data: &WindowDataset) -> Result<f64> {
        self.check_dataset(model, data)?;

        let ctx = self.ctx.eval();
        let _grad = GradMode::Disabled.enter();

        let loader = DataLoader::new(data.len(), self.config.batch_size, false);
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for indices in loader {
            let x = data.batch(&indices, ctx.device())?;
            let out = model.forward(&x, &ctx)?;
            total_loss += reconstruction_loss(&x, &out.reconstruction).double_value(&[]);
            num_batches += 1;
        }

        Ok(total_loss / num_batches.max(1) as f64)
    }

    fn check_dataset(&self, model: &HybridModel, data: &WindowDataset) -> Result<()> {
        let expected = model.config().input_size as usize;
        if data.num_features() != expected {
            return Err(AnomalyError::shape(
                "dataset features",
                expected,
                data.num_features(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use ndarray::Array2;
    use tch::Device;

    fn small_model(features: i64) -> HybridModel {
        HybridModel::new(
            ModelConfig {
                input_size: features,
                cnn_out_channels: 4,
                kernel_size: 3,
                lstm_hidden_size: 8,
                lstm_layers: 2,
                ae_hidden_size: 4,
            },
            Device::Cpu,
        )
        .unwrap()
    }

    fn ramp_dataset(timesteps: usize, features: usize, window: usize) -> WindowDataset {
        let series = Array2::from_shape_fn((timesteps, features), |(t, f)| {
            ((t * (f + 1)) % 17) as f32 / 17.0
        });
        WindowDataset::new(series, window).unwrap()
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.batch_size, 16);
        assert!((config.lambda_entropy - 0.1).abs() < 1e-12);
        assert!(config.checkpoint_path.is_none());
    }

    #[test]
    fn test_non_finite_loss_stops_training() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("best.ot");

        let mut series = Array2::<f32>::zeros((40, 3));
        series.fill(f32::NAN);
        let dataset = WindowDataset::new(series, 8).unwrap();

        let config = TrainingConfig {
            epochs: 3,
            batch_size: 8,
            checkpoint_path: Some(checkpoint.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let trainer = Trainer::with_context(config, ExecutionContext::cpu());
        let mut model = small_model(3);

        let err = trainer.train(&mut model, &dataset, None).unwrap_err();
        assert!(matches!(err, AnomalyError::NonFiniteLoss { epoch: 1, batch: 0, .. }));
        assert!(!checkpoint.exists());
    }

    #[test]
    fn test_infinite_input_is_reported() {
        let mut series = Array2::<f32>::zeros((30, 2));
        series.fill(f32::INFINITY);
        let dataset = WindowDataset::new(series, 5).unwrap();

        let config = TrainingConfig {
            epochs: 1,
            ..Default::default()
        };
        let trainer = Trainer::with_context(config, ExecutionContext::cpu());
        let mut model = small_model(2);

        match trainer.train(&mut model, &dataset, None) {
            Err(AnomalyError::NonFiniteLoss { epoch, value, .. }) => {
                assert_eq!(epoch, 1);
                assert!(!value.is_finite());
            }
            other => panic!("expected a non-finite loss, got {:?}", other.map(|h| h.len())),
        }
    }

    #[test]
    fn test_checkpoint_written_for_best_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("best.ot");

        let config = TrainingConfig {
            epochs: 2,
            batch_size: 8,
            checkpoint_path: Some(checkpoint.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let trainer = Trainer::with_context(config, ExecutionContext::cpu());
        let mut model = small_model(3);
        let dataset = ramp_dataset(40, 3, 8);

        let history = trainer.train(&mut model, &dataset, None).unwrap();
        assert_eq!(history.len(), 2);
        assert!(checkpoint.exists());

        // The checkpoint restores into a model of the same configuration
        let mut restored = small_model(3);
        restored.load(&checkpoint).unwrap();
    }
}
