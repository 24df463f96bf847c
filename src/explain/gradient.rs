//! Expected-gradients attribution against background windows
//!
//! For each draw a background window `b` and a mix `α ~ U(0, 1)` are
//! sampled; the gradient of every reconstructed output is taken at
//! `b + α(x − b)` and multiplied by `x − b`. Averaging the draws
//! approximates integrated gradients over the background distribution.

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};
use tracing::debug;

use super::attribution::FeatureAttribution;
use crate::context::{ExecutionContext, GradMode};
use crate::error::{AnomalyError, Result};
use crate::model::HybridModel;

/// Explanation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Number of (background, α) draws
    pub n_samples: usize,
    /// Draws evaluated per forward pass
    pub batch_size: usize,
    /// Background windows used as baselines
    pub background_size: usize,
    pub seed: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            n_samples: 200,
            batch_size: 50,
            background_size: 50,
            seed: 0,
        }
    }
}

/// Gradient explainer bound to a trained model and a background set
pub struct GradientExplainer<'a> {
    model: &'a HybridModel,
    background: Tensor,
    ctx: ExecutionContext,
    config: ExplainConfig,
}

impl<'a> GradientExplainer<'a> {
    /// Create an explainer
    ///
    /// # Arguments
    /// * `model` - Trained model; always run in eval mode here
    /// * `background` - Baseline windows of shape (n_background, window, features)
    pub fn new(model: &'a HybridModel, background: &Tensor, config: ExplainConfig) -> Result<Self> {
        let size = background.size();
        let features = model.config().input_size;
        if size.len() != 3 || size[0] < 1 || size[2] != features {
            return Err(AnomalyError::shape(
                "background (n_background, window, features)",
                format!("[>=1, _, {}]", features),
                size,
            ));
        }
        if config.n_samples == 0 {
            return Err(AnomalyError::InvalidConfig(
                "n_samples must be at least 1".to_string(),
            ));
        }

        let ctx = ExecutionContext::new(model.device()).eval();
        let background = background
            .to_device(ctx.device())
            .to_kind(Kind::Float)
            .detach();

        Ok(Self {
            model,
            background,
            ctx,
            config,
        })
    }

    pub fn background_len(&self) -> i64 {
        self.background.size()[0]
    }

    /// Mean reconstruction over the background windows
    pub fn expected_value(&self) -> Result<Vec<f32>> {
        let _grad = GradMode::Disabled.enter();
        let out = self.model.forward(&self.background, &self.ctx)?;
        let mean = out
            .reconstruction
            .mean_dim(Some([0].as_slice()), false, Kind::Float)
            .to_device(Device::Cpu);
        Ok(Vec::<f32>::try_from(&mean)?)
    }

    /// Attribute every reconstructed output of `target` to its inputs
    ///
    /// # Arguments
    /// * `target` - The window to explain, shape (1, window, features)
    /// * `feature_count` - Expected number of features
    ///
    /// # Returns
    /// Attribution values of shape (outputs, window, features).
    pub fn explain(&self, target: &Tensor, feature_count: usize) -> Result<FeatureAttribution> {
        let bg_size = self.background.size();
        let (window, features) = (bg_size[1], bg_size[2]);
        if features != feature_count as i64 {
            return Err(AnomalyError::shape("feature count", features, feature_count));
        }
        let expected = vec![1, window, features];
        if target.size() != expected {
            return Err(AnomalyError::shape("explained window", expected, target.size()));
        }

        let device = self.ctx.device();
        let outputs = self.model.config().input_size;
        let x = target.to_device(device).to_kind(Kind::Float).detach();

        let _grad = GradMode::Enabled.enter();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut sums: Vec<Tensor> = (0..outputs)
            .map(|_| Tensor::zeros([window, features], (Kind::Float, device)))
            .collect();

        let mut remaining = self.config.n_samples;
        while remaining > 0 {
            let n = remaining.min(self.config.batch_size.max(1));
            remaining -= n;

            let picks: Vec<i64> = (0..n)
                .map(|_| rng.gen_range(0..self.background_len()))
                .collect();
            let alphas: Vec<f32> = (0..n).map(|_| rng.gen::<f32>()).collect();

            let baselines = self
                .background
                .index_select(0, &Tensor::from_slice(&picks).to_device(device));
            let alpha = Tensor::from_slice(&alphas)
                .to_device(device)
                .view([n as i64, 1, 1]);
            let delta = &x - &baselines;
            let interpolated = (&baselines + &alpha * &delta)
                .detach()
                .set_requires_grad(true);

            let reconstruction = self.model.forward(&interpolated, &self.ctx)?.reconstruction;

            for (o, sum) in sums.iter_mut().enumerate() {
                let output = reconstruction.select(1, o as i64).sum(Kind::Float);
                let grads = Tensor::f_run_backward(&[&output], &[&interpolated], true, false)?;
                let contribution = (&grads[0] * &delta).sum_dim_intlist([0].as_slice(), false, Kind::Float);
                *sum = &*sum + contribution;
            }
        }

        let values = Tensor::stack(&sums, 0) / self.config.n_samples as f64;
        let flat = Vec::<f32>::try_from(&values.to_device(Device::Cpu).flatten(0, -1))?;
        let values = Array3::from_shape_vec(
            (outputs as usize, window as usize, features as usize),
            flat,
        )
        .map_err(|e| AnomalyError::shape("attribution values", [outputs, window, features], e.to_string()))?;

        debug!(
            "Explained window with {} draws over {} background windows",
            self.config.n_samples,
            self.background_len()
        );

        Ok(FeatureAttribution::new(values, self.expected_value()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;

    fn model(features: i64) -> HybridModel {
        HybridModel::new(
            ModelConfig {
                input_size: features,
                cnn_out_channels: 4,
                kernel_size: 3,
                lstm_hidden_size: 8,
                lstm_layers: 1,
                ae_hidden_size: 4,
            },
            Device::Cpu,
        )
        .unwrap()
    }

    fn small_config() -> ExplainConfig {
        ExplainConfig {
            n_samples: 16,
            batch_size: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_attribution_shape() {
        let model = model(3);
        let background = Tensor::rand([6, 10, 3], (Kind::Float, Device::Cpu));
        let target = Tensor::rand([1, 10, 3], (Kind::Float, Device::Cpu));

        let explainer = GradientExplainer::new(&model, &background, small_config()).unwrap();
        let attr = explainer.explain(&target, 3).unwrap();
        assert_eq!(attr.shape(), (3, 10, 3));
        assert_eq!(attr.expected_value.len(), 3);
        assert!(attr.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_feature_equal_to_baseline_gets_no_attribution() {
        let model = model(3);
        let target = Tensor::rand([1, 10, 3], (Kind::Float, Device::Cpu));

        // Background differs from the target only in features 0 and 2
        let background = target.repeat([4, 1, 1]);
        let noise = Tensor::rand([4, 10, 3], (Kind::Float, Device::Cpu));
        let mask = Tensor::from_slice(&[1.0f32, 0.0, 1.0]).view([1, 1, 3]);
        let background = background + noise * mask;

        let explainer = GradientExplainer::new(&model, &background, small_config()).unwrap();
        let attr = explainer.explain(&target, 3).unwrap();

        let importance = attr.feature_importance();
        assert_eq!(importance[1], 0.0);
    }

    #[test]
    fn test_seeded_explanations_repeat() {
        let model = model(2);
        let background = Tensor::rand([5, 8, 2], (Kind::Float, Device::Cpu));
        let target = Tensor::rand([1, 8, 2], (Kind::Float, Device::Cpu));

        let explainer = GradientExplainer::new(&model, &background, small_config()).unwrap();
        let a = explainer.explain(&target, 2).unwrap();
        let b = explainer.explain(&target, 2).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_shape_checks() {
        let model = model(3);
        let background = Tensor::rand([4, 10, 3], (Kind::Float, Device::Cpu));
        let explainer = GradientExplainer::new(&model, &background, small_config()).unwrap();

        let wrong_window = Tensor::rand([1, 12, 3], (Kind::Float, Device::Cpu));
        assert!(explainer.explain(&wrong_window, 3).unwrap_err().is_shape_mismatch());

        let target = Tensor::rand([1, 10, 3], (Kind::Float, Device::Cpu));
        assert!(explainer.explain(&target, 4).unwrap_err().is_shape_mismatch());

        let bad_background = Tensor::rand([4, 10, 2], (Kind::Float, Device::Cpu));
        assert!(GradientExplainer::new(&model, &bad_background, small_config()).is_err());
    }

    #[test]
    fn test_grad_mode_restored_after_explain() {
        let model = model(2);
        let background = Tensor::rand([3, 6, 2], (Kind::Float, Device::Cpu));
        let target = Tensor::rand([1, 6, 2], (Kind::Float, Device::Cpu));
        let explainer = GradientExplainer::new(&model, &background, small_config()).unwrap();

        GradMode::Disabled.run(|| {
            explainer.explain(&target, 2).unwrap();
            let probe = Tensor::ones([1], (Kind::Float, Device::Cpu)).set_requires_grad(true);
            assert!(!(&probe * 2.0).requires_grad());
        });
    }
}
