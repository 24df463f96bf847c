//! Sequence encoders
//!
//! An encoder maps a batch of windows `[B, W, F]` to a per-timestep latent
//! sequence `[B, W, H]`. The hybrid model only depends on the
//! [`SequenceEncoder`] trait, so alternative encoders can be plugged in.

use tch::nn::{self, RNN};
use tch::Tensor;

use crate::context::ExecutionContext;

/// Dropout applied between stacked LSTM layers during training
pub const LSTM_INTER_LAYER_DROPOUT: f64 = 0.3;

/// Any component turning `[B, W, F]` windows into a `[B, W, H]` latent sequence
pub trait SequenceEncoder: std::fmt::Debug {
    /// Encode a batch; must not modify `x`
    fn forward(&self, x: &Tensor, ctx: &ExecutionContext) -> Tensor;

    /// Size `H` of each latent vector
    fn output_size(&self) -> i64;
}

/// Conv1d over time followed by a stack of LSTM layers
///
/// The convolution mixes the feature axis at each timestep (with a
/// receptive field of `kernel_size` steps); its padding keeps the window
/// length unchanged. The LSTM stack then carries temporal dependencies and
/// returns the hidden state of the top layer at every step.
#[derive(Debug)]
pub struct CnnLstmEncoder {
    conv: nn::Conv1D,
    lstm_layers: Vec<nn::LSTM>,
    dropout: f64,
    hidden_size: i64,
}

impl CnnLstmEncoder {
    /// Create a new encoder
    ///
    /// # Arguments
    /// * `input_size` - Number of input features `F`
    /// * `cnn_out_channels` - Channels produced by the convolution
    /// * `kernel_size` - Temporal kernel size (odd, so the length is preserved)
    /// * `lstm_hidden_size` - Hidden size of every LSTM layer
    /// * `lstm_layers` - Number of stacked LSTM layers
    pub fn new(
        vs: &nn::Path,
        input_size: i64,
        cnn_out_channels: i64,
        kernel_size: i64,
        lstm_hidden_size: i64,
        lstm_layers: i64,
    ) -> Self {
        let conv = nn::conv1d(
            vs / "conv",
            input_size,
            cnn_out_channels,
            kernel_size,
            nn::ConvConfig {
                padding: kernel_size / 2,
                ..Default::default()
            },
        );

        // One single-layer LSTM per level so that inter-layer dropout follows
        // the execution mode instead of a flag fixed at construction.
        let lstm_config = nn::RNNConfig {
            batch_first: true,
            ..Default::default()
        };
        let lstm_layers = (0..lstm_layers)
            .map(|i| {
                let in_dim = if i == 0 { cnn_out_channels } else { lstm_hidden_size };
                nn::lstm(vs / format!("lstm_{}", i), in_dim, lstm_hidden_size, lstm_config)
            })
            .collect();

        Self {
            conv,
            lstm_layers,
            dropout: LSTM_INTER_LAYER_DROPOUT,
            hidden_size: lstm_hidden_size,
        }
    }
}

impl SequenceEncoder for CnnLstmEncoder {
    fn forward(&self, x: &Tensor, ctx: &ExecutionContext) -> Tensor {
        // (batch, window, features) -> (batch, features, window) for conv1d
        let features = x
            .permute([0, 2, 1])
            .apply(&self.conv)
            .relu()
            .permute([0, 2, 1])
            .contiguous();

        let mut out = features;
        for (i, lstm) in self.lstm_layers.iter().enumerate() {
            if i > 0 {
                out = out.dropout(self.dropout, ctx.is_train());
            }
            let (seq, _) = lstm.seq(&out);
            out = seq;
        }
        out
    }

    fn output_size(&self) -> i64 {
        self.hidden_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn encoder(vs: &nn::VarStore) -> CnnLstmEncoder {
        CnnLstmEncoder::new(&vs.root(), 5, 8, 3, 12, 2)
    }

    #[test]
    fn test_output_shape_preserves_window() {
        let vs = nn::VarStore::new(Device::Cpu);
        let enc = encoder(&vs);
        let ctx = ExecutionContext::cpu();

        for window in [7, 20] {
            let x = Tensor::rand([4, window, 5], (Kind::Float, Device::Cpu));
            let latent = enc.forward(&x, &ctx);
            assert_eq!(latent.size(), vec![4, window, 12]);
        }
        assert_eq!(enc.output_size(), 12);
    }

    #[test]
    fn test_input_not_mutated() {
        let vs = nn::VarStore::new(Device::Cpu);
        let enc = encoder(&vs);
        let x = Tensor::rand([2, 10, 5], (Kind::Float, Device::Cpu));
        let before = x.copy();
        let _ = enc.forward(&x, &ExecutionContext::cpu().train());
        assert!(x.equal(&before));
    }

    #[test]
    fn test_eval_is_deterministic() {
        let vs = nn::VarStore::new(Device::Cpu);
        let enc = encoder(&vs);
        let ctx = ExecutionContext::cpu();
        let x = Tensor::rand([3, 10, 5], (Kind::Float, Device::Cpu));
        let a = enc.forward(&x, &ctx);
        let b = enc.forward(&x, &ctx);
        assert!(a.equal(&b));
    }
}
