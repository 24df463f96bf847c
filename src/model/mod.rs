//! Hybrid anomaly-detection model
//!
//! This module provides:
//! - The `SequenceEncoder` trait and the CNN-LSTM encoder
//! - The attention autoencoder collapsing a latent sequence into a context
//! - The hybrid model composing both, with parameter persistence

mod autoencoder;
mod encoder;
mod hybrid;

pub use autoencoder::AttentionAutoencoder;
pub use encoder::{CnnLstmEncoder, SequenceEncoder, LSTM_INTER_LAYER_DROPOUT};
pub use hybrid::{HybridModel, ModelConfig, ModelOutput};
