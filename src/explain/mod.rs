//! Explainability for individual anomaly decisions
//!
//! This module provides:
//! - An expected-gradients explainer over a set of normal background windows
//! - Attribution results with per-feature and per-timestep rankings

mod attribution;
mod gradient;

pub use attribution::FeatureAttribution;
pub use gradient::{ExplainConfig, GradientExplainer};
