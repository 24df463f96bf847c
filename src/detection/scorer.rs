//! Reconstruction-error anomaly scores
//!
//! Each window is scored by the mean squared error between its final
//! timestep and the model's reconstruction of it.

use tch::Tensor;

use crate::context::{ExecutionContext, GradMode};
use crate::data::{DataLoader, WindowDataset};
use crate::error::{AnomalyError, Result};
use crate::model::HybridModel;
use crate::training::per_window_error;

/// Score every window of `data`, in index order
pub fn score_windows(
    model: &HybridModel,
    data: &WindowDataset,
    ctx: &ExecutionContext,
    batch_size: usize,
) -> Result<Vec<f32>> {
    let ctx = ctx.eval();
    let _grad = GradMode::Disabled.enter();

    let mut scores = Vec::with_capacity(data.len());
    for indices in DataLoader::new(data.len(), batch_size, false) {
        let x = data.batch(&indices, ctx.device())?;
        let out = model.forward(&x, &ctx)?;
        let errors = per_window_error(&x, &out.reconstruction);
        scores.extend(tensor_to_vec(&errors)?);
    }
    Ok(scores)
}

fn tensor_to_vec(t: &Tensor) -> Result<Vec<f32>> {
    Ok(Vec::<f32>::try_from(&t.to_device(tch::Device::Cpu))?)
}

/// Score cut-off fit on windows assumed to be normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyThreshold {
    pub value: f32,
}

impl AnomalyThreshold {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    /// Threshold at the `percentile` (0–100) of `scores`
    ///
    /// Nearest-rank: the smallest score with at least `percentile`% of the
    /// scores at or below it.
    pub fn from_percentile(scores: &[f32], percentile: f64) -> Result<Self> {
        if scores.is_empty() {
            return Err(AnomalyError::InsufficientData(
                "no scores to fit a threshold on".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&percentile) {
            return Err(AnomalyError::InvalidConfig(format!(
                "percentile must lie in [0, 100], got {}",
                percentile
            )));
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let rank = ((percentile / 100.0) * n as f64).ceil() as usize;
        Ok(Self::new(sorted[rank.clamp(1, n) - 1]))
    }

    /// Threshold fit on the leading `share` (0, 1] of `scores`
    ///
    /// The start of a series is taken as the normal reference.
    pub fn from_leading(scores: &[f32], share: f64, percentile: f64) -> Result<Self> {
        if !(share > 0.0 && share <= 1.0) {
            return Err(AnomalyError::InvalidConfig(format!(
                "reference share must lie in (0, 1], got {}",
                share
            )));
        }
        let reference = ((scores.len() as f64 * share) as usize).max(1).min(scores.len());
        Self::from_percentile(&scores[..reference], percentile)
    }

    /// Flag every score strictly above the threshold
    pub fn detect(&self, scores: &[f32]) -> AnomalyReport {
        let is_anomaly = scores.iter().map(|&s| s > self.value).collect();
        AnomalyReport {
            scores: scores.to_vec(),
            is_anomaly,
            threshold: self.value,
        }
    }
}

/// Result of anomaly detection over a sequence of windows
#[derive(Debug, Clone)]
pub struct AnomalyReport {
    /// Reconstruction error per window
    pub scores: Vec<f32>,
    /// Flags per window
    pub is_anomaly: Vec<bool>,
    pub threshold: f32,
}

impl AnomalyReport {
    /// Get indices of anomalous windows
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.is_anomaly
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| if flag { Some(i) } else { None })
            .collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&flag| flag).count()
    }

    pub fn anomaly_rate(&self) -> f64 {
        if self.is_anomaly.is_empty() {
            0.0
        } else {
            self.anomaly_count() as f64 / self.is_anomaly.len() as f64
        }
    }

    /// Highest score and its window index
    pub fn max_score(&self) -> Option<(usize, f32)> {
        self.scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_threshold() {
        let scores: Vec<f32> = (0..=100).map(|i| i as f32).collect();
        let t = AnomalyThreshold::from_percentile(&scores, 95.0).unwrap();
        assert_eq!(t.value, 95.0);

        let report = t.detect(&scores);
        assert_eq!(report.anomaly_count(), 5);
        assert_eq!(report.anomaly_indices(), vec![96, 97, 98, 99, 100]);
        assert_eq!(report.max_score(), Some((100, 100.0)));
    }

    #[test]
    fn test_nearest_rank() {
        let scores = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(AnomalyThreshold::from_percentile(&scores, 50.0).unwrap().value, 2.0);
        assert_eq!(AnomalyThreshold::from_percentile(&scores, 51.0).unwrap().value, 3.0);
        assert_eq!(AnomalyThreshold::from_percentile(&scores, 0.0).unwrap().value, 1.0);
        assert_eq!(AnomalyThreshold::from_percentile(&scores, 100.0).unwrap().value, 4.0);
    }

    #[test]
    fn test_threshold_from_leading_share() {
        let scores = [1.0, 2.0, 3.0, 4.0, 100.0, 200.0];
        let t = AnomalyThreshold::from_leading(&scores, 0.5, 100.0).unwrap();
        assert_eq!(t.value, 3.0);

        let all = AnomalyThreshold::from_leading(&scores, 1.0, 100.0).unwrap();
        assert_eq!(all.value, 200.0);

        // Tiny share still keeps one window
        let first = AnomalyThreshold::from_leading(&scores, 0.01, 100.0).unwrap();
        assert_eq!(first.value, 1.0);
    }

    #[test]
    fn test_leading_share_out_of_range() {
        let scores = [1.0, 2.0, 3.0];
        for share in [0.0, -0.5, 1.5, f64::NAN] {
            let err = AnomalyThreshold::from_leading(&scores, share, 99.0).unwrap_err();
            assert!(matches!(err, AnomalyError::InvalidConfig(_)));
        }
        assert!(AnomalyThreshold::from_leading(&[], 0.5, 99.0).is_err());
    }

    #[test]
    fn test_invalid_threshold_inputs() {
        assert!(AnomalyThreshold::from_percentile(&[], 99.0).is_err());
        assert!(AnomalyThreshold::from_percentile(&[1.0], 120.0).is_err());
    }

    #[test]
    fn test_anomaly_rate() {
        let report = AnomalyThreshold::new(0.5).detect(&[0.1, 0.9, 0.2, 0.7]);
        assert!((report.anomaly_rate() - 0.5).abs() < 1e-12);
    }
}
