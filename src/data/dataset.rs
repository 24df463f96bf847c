//! Sliding-window dataset and batch loading
//!
//! Windows are views into the raw series with stride 1; nothing is copied
//! until a batch is assembled for the model.

use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::{Device, Tensor};

use crate::error::{AnomalyError, Result};

/// Fixed-length overlapping windows over a `[T, F]` series
#[derive(Debug, Clone)]
pub struct WindowDataset {
    series: Array2<f32>,
    window_size: usize,
}

impl WindowDataset {
    /// Create a dataset of windows of length `window_size`
    pub fn new(series: Array2<f32>, window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(AnomalyError::InvalidConfig(
                "window size must be at least 1".to_string(),
            ));
        }
        if series.nrows() <= window_size {
            return Err(AnomalyError::InsufficientData(format!(
                "series of {} timesteps cannot produce windows of length {}",
                series.nrows(),
                window_size
            )));
        }

        Ok(Self {
            series,
            window_size,
        })
    }

    /// Number of windows, `T - W`
    pub fn len(&self) -> usize {
        self.series.nrows() - self.window_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn num_features(&self) -> usize {
        self.series.ncols()
    }

    /// The underlying series
    pub fn series(&self) -> &Array2<f32> {
        &self.series
    }

    /// Window `[index, index + W)` of shape `[W, F]`
    pub fn get(&self, index: usize) -> Result<ArrayView2<'_, f32>> {
        if index >= self.len() {
            return Err(AnomalyError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(self.series.slice(s![index..index + self.window_size, ..]))
    }

    /// Stack the windows at `indices` into a `[B, W, F]` float tensor on `device`
    pub fn batch(&self, indices: &[usize], device: Device) -> Result<Tensor> {
        let w = self.window_size;
        let f = self.num_features();
        let mut values = Vec::with_capacity(indices.len() * w * f);

        for &index in indices {
            let window = self.get(index)?;
            values.extend(window.iter().copied());
        }

        Ok(Tensor::from_slice(&values)
            .reshape([indices.len() as i64, w as i64, f as i64])
            .to_device(device))
    }

    /// All windows in order, as a single `[N, W, F]` tensor
    pub fn to_tensor(&self, device: Device) -> Result<Tensor> {
        let indices: Vec<usize> = (0..self.len()).collect();
        self.batch(&indices, device)
    }
}

/// Data loader for batched iteration over window indices
pub struct DataLoader {
    indices: Vec<usize>,
    batch_size: usize,
    current_pos: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DataLoader {
    /// Create a new data loader
    pub fn new(dataset_size: usize, batch_size: usize, shuffle: bool) -> Self {
        Self::with_rng(dataset_size, batch_size, shuffle, StdRng::from_entropy())
    }

    /// Create a loader whose shuffling is reproducible
    pub fn seeded(dataset_size: usize, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        Self::with_rng(dataset_size, batch_size, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dataset_size: usize, batch_size: usize, shuffle: bool, mut rng: StdRng) -> Self {
        let mut indices: Vec<usize> = (0..dataset_size).collect();
        if shuffle {
            indices.shuffle(&mut rng);
        }

        Self {
            indices,
            batch_size: batch_size.max(1),
            current_pos: 0,
            shuffle,
            rng,
        }
    }

    /// Get number of batches
    pub fn num_batches(&self) -> usize {
        (self.indices.len() + self.batch_size - 1) / self.batch_size
    }

    /// Reset the loader for a new epoch
    pub fn reset(&mut self) {
        self.current_pos = 0;
        if self.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    /// Get next batch of indices
    pub fn next_batch(&mut self) -> Option<Vec<usize>> {
        if self.current_pos >= self.indices.len() {
            return None;
        }

        let end = (self.current_pos + self.batch_size).min(self.indices.len());
        let batch = self.indices[self.current_pos..end].to_vec();
        self.current_pos = end;

        Some(batch)
    }
}

impl Iterator for DataLoader {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
