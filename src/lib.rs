//! # Hybrid Attention Anomaly Detection
//!
//! This crate detects anomalies in multivariate time series with a
//! CNN-LSTM sequence encoder followed by an attention autoencoder, and
//! explains individual decisions with gradient-based feature attribution.
//!
//! ## Modules
//!
//! - `data`: Sliding windows, min-max scaling and CSV loading
//! - `model`: Sequence encoder, attention autoencoder and the hybrid model
//! - `training`: Losses, training loop and evaluation
//! - `detection`: Per-window anomaly scores and thresholds
//! - `explain`: Expected-gradients attribution against background windows
//! - `context`: Explicit device, mode and gradient scopes
//! - `utils`: Configuration and logging
//!
//! ## Example
//!
//! ```no_run
//! use hybrid_attention_anomaly::{
//!     preprocess, ExecutionContext, HybridModel, ModelConfig, Trainer, TrainingConfig,
//!     WindowDataset,
//! };
//! use ndarray::Array2;
//!
//! fn main() -> anyhow::Result<()> {
//!     let raw = Array2::<f32>::zeros((120, 5));
//!     let (scaled, _scaler) = preprocess(&raw, true)?;
//!     let dataset = WindowDataset::new(scaled, 20)?;
//!
//!     let ctx = ExecutionContext::auto();
//!     let mut model = HybridModel::new(ModelConfig::default(), ctx.device())?;
//!     let trainer = Trainer::with_context(TrainingConfig::default(), ctx);
//!     trainer.train(&mut model, &dataset, None)?;
//!     println!("loss: {:.6}", trainer.evaluate(&model, &dataset)?);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod data;
pub mod detection;
pub mod error;
pub mod explain;
pub mod model;
pub mod training;
pub mod utils;

// Re-export main types for convenience
pub use context::{ExecutionContext, GradMode, Mode};
pub use data::{load_csv, preprocess, train_test_split, DataLoader, MinMaxScaler, WindowDataset};
pub use detection::{score_windows, AnomalyReport, AnomalyThreshold};
pub use error::{AnomalyError, Result};
pub use explain::{ExplainConfig, FeatureAttribution, GradientExplainer};
pub use model::{AttentionAutoencoder, CnnLstmEncoder, HybridModel, ModelConfig, ModelOutput, SequenceEncoder};
pub use training::{EpochMetrics, Trainer, TrainingConfig};
pub use utils::{setup_logging, Config};
