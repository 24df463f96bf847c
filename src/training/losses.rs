//! Loss functions for training
//!
//! The model reconstructs the last timestep of each window; the entropy
//! term regularizes how the attention spreads over the window.

use tch::{Kind, Reduction, Tensor};

/// Added inside the logarithm of the entropy term
pub const ENTROPY_EPSILON: f64 = 1e-8;

/// Default weight of the entropy term
pub const DEFAULT_LAMBDA_ENTROPY: f64 = 0.1;

/// Last timestep of each window, (batch, window, features) -> (batch, features)
pub fn reconstruction_target(batch: &Tensor) -> Tensor {
    batch.select(1, -1)
}

/// Mean squared error between the final timestep and its reconstruction
pub fn reconstruction_loss(batch: &Tensor, reconstruction: &Tensor) -> Tensor {
    reconstruction.mse_loss(&reconstruction_target(batch), Reduction::Mean)
}

/// Per-window mean squared error, shape (batch,)
pub fn per_window_error(batch: &Tensor, reconstruction: &Tensor) -> Tensor {
    (reconstruction - reconstruction_target(batch))
        .pow_tensor_scalar(2)
        .mean_dim(Some([1].as_slice()), false, Kind::Float)
}

/// Shannon entropy of attention weights over the time axis
///
/// `-Σ_t w·ln(w + ε)` per batch element and attention channel, averaged over
/// both. Uniform weights over `W` steps give `ln W`; one-hot weights give ~0.
pub fn entropy_loss(weights: &Tensor) -> Tensor {
    let plogp = weights * (weights + ENTROPY_EPSILON).log();
    -plogp
        .sum_dim_intlist([1].as_slice(), false, Kind::Float)
        .mean(Kind::Float)
}

/// Reconstruction loss plus `lambda_entropy` times the attention entropy
pub fn combined_loss(
    batch: &Tensor,
    reconstruction: &Tensor,
    attention: &Tensor,
    lambda_entropy: f64,
) -> LossBreakdown {
    let reconstruction = reconstruction_loss(batch, reconstruction);
    let entropy = entropy_loss(attention);
    let total = &reconstruction + &entropy * lambda_entropy;

    LossBreakdown {
        total,
        reconstruction,
        entropy,
    }
}

/// Individual terms of the training objective
#[derive(Debug)]
pub struct LossBreakdown {
    pub total: Tensor,
    pub reconstruction: Tensor,
    pub entropy: Tensor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tch::Device;

    #[test]
    fn test_uniform_attention_has_max_entropy() {
        let weights = Tensor::full([1, 20, 1], 1.0 / 20.0, (Kind::Float, Device::Cpu));
        let entropy = entropy_loss(&weights).double_value(&[]);
        assert_abs_diff_eq!(entropy, 20f64.ln(), epsilon = 1e-4);
    }

    #[test]
    fn test_one_hot_attention_has_zero_entropy() {
        let weights = Tensor::zeros([1, 20, 1], (Kind::Float, Device::Cpu));
        let _ = weights.get(0).get(3).fill_(1.0);
        let entropy = entropy_loss(&weights).double_value(&[]);
        assert!(entropy.abs() < 1e-6);
    }

    #[test]
    fn test_entropy_averages_over_batch() {
        let uniform = Tensor::full([1, 4, 2], 0.25, (Kind::Float, Device::Cpu));
        let one_hot = Tensor::zeros([1, 4, 2], (Kind::Float, Device::Cpu));
        let _ = one_hot.narrow(1, 0, 1).fill_(1.0);
        let batch = Tensor::cat(&[uniform, one_hot], 0);

        let entropy = entropy_loss(&batch).double_value(&[]);
        assert_abs_diff_eq!(entropy, 4f64.ln() / 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_reconstruction_targets_last_step() {
        let batch = Tensor::arange(12, (Kind::Float, Device::Cpu)).reshape([2, 3, 2]);
        let target = reconstruction_target(&batch);
        assert_eq!(target.size(), vec![2, 2]);
        assert_eq!(target.double_value(&[0, 0]), 4.0);
        assert_eq!(target.double_value(&[1, 1]), 11.0);

        let perfect = reconstruction_loss(&batch, &target).double_value(&[]);
        assert_eq!(perfect, 0.0);

        let off = &target + 1.0;
        assert_abs_diff_eq!(reconstruction_loss(&batch, &off).double_value(&[]), 1.0);
        let per_window = per_window_error(&batch, &off);
        assert_eq!(per_window.size(), vec![2]);
    }

    #[test]
    fn test_combined_loss() {
        let batch = Tensor::zeros([1, 20, 3], (Kind::Float, Device::Cpu));
        let recon = Tensor::ones([1, 3], (Kind::Float, Device::Cpu));
        let weights = Tensor::full([1, 20, 1], 0.05, (Kind::Float, Device::Cpu));

        let loss = combined_loss(&batch, &recon, &weights, 0.1);
        let expected = 1.0 + 0.1 * 20f64.ln();
        assert_abs_diff_eq!(loss.total.double_value(&[]), expected, epsilon = 1e-4);
        assert_abs_diff_eq!(loss.reconstruction.double_value(&[]), 1.0);
    }
}
