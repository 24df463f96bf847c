//! Attention autoencoder
//!
//! Collapses a latent sequence into one context vector with attention
//! weights over time, then decodes the context back to feature space.

use tch::{nn, Kind, Tensor};

/// Linear encoder, temporal attention and linear decoder
#[derive(Debug)]
pub struct AttentionAutoencoder {
    encoder: nn::Linear,
    decoder: nn::Linear,
}

impl AttentionAutoencoder {
    /// Create a new attention autoencoder
    ///
    /// # Arguments
    /// * `input_size` - Size of each latent vector
    /// * `hidden_size` - Size of the encoded vectors and of the context
    /// * `output_size` - Number of reconstructed features
    pub fn new(vs: &nn::Path, input_size: i64, hidden_size: i64, output_size: i64) -> Self {
        let encoder = nn::linear(vs / "encoder", input_size, hidden_size, Default::default());
        let decoder = nn::linear(vs / "decoder", hidden_size, output_size, Default::default());

        Self { encoder, decoder }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `latent` - Tensor of shape (batch, window, input_size)
    ///
    /// # Returns
    /// Reconstruction (batch, output_size) and attention weights
    /// (batch, window, hidden_size), which sum to one over the window axis.
    pub fn forward(&self, latent: &Tensor) -> (Tensor, Tensor) {
        let encoded = latent.apply(&self.encoder).relu();

        let energy = encoded.tanh();
        let weights = energy.softmax(1, Kind::Float);

        let context = (&weights * &encoded).sum_dim_intlist([1].as_slice(), false, Kind::Float);
        let reconstruction = context.apply(&self.decoder);

        (reconstruction, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_shapes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let ae = AttentionAutoencoder::new(&vs.root(), 16, 8, 5);
        let latent = Tensor::randn([3, 20, 16], (Kind::Float, Device::Cpu));

        let (recon, weights) = ae.forward(&latent);
        assert_eq!(recon.size(), vec![3, 5]);
        assert_eq!(weights.size(), vec![3, 20, 8]);
    }

    #[test]
    fn test_weights_form_distribution_over_time() {
        let vs = nn::VarStore::new(Device::Cpu);
        let ae = AttentionAutoencoder::new(&vs.root(), 6, 4, 2);
        let latent = Tensor::randn([5, 11, 6], (Kind::Float, Device::Cpu));

        let (_, weights) = ae.forward(&latent);
        assert!(weights.min().double_value(&[]) >= 0.0);

        let sums = weights.sum_dim_intlist([1].as_slice(), false, Kind::Float);
        let max_dev = (sums - 1.0).abs().max().double_value(&[]);
        assert!(max_dev < 1e-5);
    }
}
