//! Data module for windowing, scaling and loading time series
//!
//! This module provides:
//! - Sliding-window dataset over a `[T, F]` series and a batch loader
//! - Min-max scaler fit on training data and reused at inference
//! - CSV loading and chronological splitting

mod dataset;
mod scaler;
mod series;

pub use dataset::{DataLoader, WindowDataset};
pub use scaler::{preprocess, MinMaxScaler};
pub use series::{load_csv, train_test_split};
