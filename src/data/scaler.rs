//! Per-feature min-max scaling
//!
//! The scaler is fit once on training data and then reused unchanged for
//! every later transform, so inference data sees the same normalization.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AnomalyError, Result};

/// Fitted min/max bounds for each feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl MinMaxScaler {
    /// Fit bounds over all rows of `data` (rows = timesteps, columns = features)
    pub fn fit(data: &Array2<f32>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(AnomalyError::InsufficientData(
                "cannot fit a scaler on an empty series".to_string(),
            ));
        }

        let min = data.fold_axis(Axis(0), f32::INFINITY, |&a, &b| a.min(b));
        let max = data.fold_axis(Axis(0), f32::NEG_INFINITY, |&a, &b| a.max(b));

        Ok(Self {
            min: min.to_vec(),
            max: max.to_vec(),
        })
    }

    /// Number of features the scaler was fit on
    pub fn num_features(&self) -> usize {
        self.min.len()
    }

    /// Scale data into `[0, 1]` using the fitted bounds
    ///
    /// Constant features (max == min) map to 0.
    pub fn transform(&self, data: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_features(data)?;

        let (min, range) = self.bounds();
        Ok((data - &min) / &range)
    }

    /// Map scaled data back to the original units
    pub fn inverse_transform(&self, data: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_features(data)?;

        let (min, range) = self.bounds();
        Ok(data * &range + &min)
    }

    /// Save bounds to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load bounds from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let scaler: MinMaxScaler = serde_json::from_str(&json)?;
        if scaler.min.len() != scaler.max.len() {
            return Err(AnomalyError::shape(
                "scaler bounds",
                scaler.min.len(),
                scaler.max.len(),
            ));
        }
        Ok(scaler)
    }

    fn bounds(&self) -> (Array1<f32>, Array1<f32>) {
        let min = Array1::from(self.min.clone());
        let range: Array1<f32> = self
            .min
            .iter()
            .zip(self.max.iter())
            .map(|(lo, hi)| {
                let range = hi - lo;
                if range.abs() < f32::EPSILON {
                    1.0
                } else {
                    range
                }
            })
            .collect();
        (min, range)
    }

    fn check_features(&self, data: &Array2<f32>) -> Result<()> {
        if data.ncols() != self.num_features() {
            return Err(AnomalyError::shape(
                "scaler features",
                self.num_features(),
                data.ncols(),
            ));
        }
        Ok(())
    }
}

/// Optionally fit a min-max scaler and transform the raw series
///
/// Returns the (possibly scaled) data and the fitted scaler, which callers
/// must keep and reuse for any later inference data.
pub fn preprocess(raw: &Array2<f32>, normalize: bool) -> Result<(Array2<f32>, Option<MinMaxScaler>)> {
    if !normalize {
        return Ok((raw.clone(), None));
    }

    let scaler = MinMaxScaler::fit(raw)?;
    let scaled = scaler.transform(raw)?;
    Ok((scaled, Some(scaler)))
}
