//! Anomaly detection on top of a trained hybrid model
//!
//! Windows are scored by reconstruction error; a percentile threshold fit
//! on normal data turns scores into flags.

mod scorer;

pub use scorer::{score_windows, AnomalyReport, AnomalyThreshold};
