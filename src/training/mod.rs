//! Training module for the hybrid model
//!
//! This module provides:
//! - Reconstruction and attention-entropy losses
//! - Training loop with per-epoch logging and optional checkpointing
//! - Evaluation with gradients disabled

mod losses;
mod metrics;
mod trainer;

pub use losses::{
    combined_loss, entropy_loss, per_window_error, reconstruction_loss, reconstruction_target,
    LossBreakdown, DEFAULT_LAMBDA_ENTROPY, ENTROPY_EPSILON,
};
pub use metrics::EpochMetrics;
pub use trainer::{Trainer, TrainingConfig};
