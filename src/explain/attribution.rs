//! Attribution results

use ndarray::{Array1, Array3, ArrayView2, Axis};

/// Attribution of one explained window
///
/// `values[[o, t, f]]` is the contribution of input feature `f` at timestep
/// `t` to reconstructed output `o`.
#[derive(Debug, Clone)]
pub struct FeatureAttribution {
    pub values: Array3<f32>,
    /// Mean model output over the background windows
    pub expected_value: Vec<f32>,
}

impl FeatureAttribution {
    pub fn new(values: Array3<f32>, expected_value: Vec<f32>) -> Self {
        Self {
            values,
            expected_value,
        }
    }

    /// (outputs, window, features)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    pub fn num_features(&self) -> usize {
        self.values.dim().2
    }

    /// Attribution map `[W, F]` for one reconstructed output
    pub fn for_output(&self, output: usize) -> Option<ArrayView2<'_, f32>> {
        if output < self.values.dim().0 {
            Some(self.values.index_axis(Axis(0), output))
        } else {
            None
        }
    }

    /// Mean absolute attribution per input feature
    pub fn feature_importance(&self) -> Array1<f32> {
        self.values
            .mapv(f32::abs)
            .mean_axis(Axis(0))
            .and_then(|a| a.mean_axis(Axis(0)))
            .unwrap_or_else(|| Array1::zeros(self.num_features()))
    }

    /// Mean absolute attribution per timestep
    pub fn timestep_importance(&self) -> Array1<f32> {
        let window = self.values.dim().1;
        self.values
            .mapv(f32::abs)
            .mean_axis(Axis(0))
            .and_then(|a| a.mean_axis(Axis(1)))
            .unwrap_or_else(|| Array1::zeros(window))
    }

    /// Features sorted by importance, most important first
    pub fn ranked_features(&self) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .feature_importance()
            .iter()
            .copied()
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Signed total attribution per output, summed over time and features
    pub fn total_per_output(&self) -> Array1<f32> {
        self.values.sum_axis(Axis(2)).sum_axis(Axis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureAttribution {
        // 2 outputs, 3 timesteps, 2 features; feature 1 dominates
        let values = Array3::from_shape_fn((2, 3, 2), |(o, t, f)| {
            if f == 1 {
                -((o + t + 1) as f32)
            } else {
                0.1
            }
        });
        FeatureAttribution::new(values, vec![0.0, 0.0])
    }

    #[test]
    fn test_ranking() {
        let attr = sample();
        let ranked = attr.ranked_features();
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 0);
        assert!((ranked[1].1 - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_views_and_totals() {
        let attr = sample();
        assert_eq!(attr.shape(), (2, 3, 2));
        assert_eq!(attr.for_output(1).unwrap().dim(), (3, 2));
        assert!(attr.for_output(2).is_none());
        assert_eq!(attr.timestep_importance().len(), 3);

        let totals = attr.total_per_output();
        // output 0: 0.3 - (1 + 2 + 3)
        assert!((totals[0] - (0.3 - 6.0)).abs() < 1e-5);
    }
}
