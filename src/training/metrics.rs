//! Per-epoch training metrics

use std::fmt;
use std::time::Duration;

/// Metrics for one training epoch
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    /// Epoch number, starting at 1
    pub epoch: usize,
    /// Mean combined loss over the epoch's batches
    pub train_loss: f64,
    /// Mean reconstruction term
    pub reconstruction_loss: f64,
    /// Mean attention entropy term (before weighting)
    pub entropy_loss: f64,
    /// Mean reconstruction loss on the validation set, if one was given
    pub val_loss: Option<f64>,
    /// Optimizer steps taken
    pub steps: usize,
    /// Wall-clock duration
    pub duration: Duration,
}

impl EpochMetrics {
    pub fn new(epoch: usize) -> Self {
        Self {
            epoch,
            ..Default::default()
        }
    }

    /// Loss used to pick the best epoch: validation when available
    pub fn monitored_loss(&self) -> f64 {
        self.val_loss.unwrap_or(self.train_loss)
    }

    /// Whether this epoch beats `best`
    pub fn improved_over(&self, best: Option<&EpochMetrics>) -> bool {
        match best {
            Some(best) => self.monitored_loss() < best.monitored_loss(),
            None => true,
        }
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {:>4} | loss {:.6} (recon {:.6}, entropy {:.4}) | {} steps in {:.2?}",
            self.epoch,
            self.train_loss,
            self.reconstruction_loss,
            self.entropy_loss,
            self.steps,
            self.duration
        )?;
        if let Some(val) = self.val_loss {
            write!(f, " | val {:.6}", val)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_prefers_validation() {
        let mut a = EpochMetrics::new(1);
        a.train_loss = 0.5;
        a.val_loss = Some(0.3);

        let mut b = EpochMetrics::new(2);
        b.train_loss = 0.1;
        b.val_loss = Some(0.4);

        assert!(a.improved_over(None));
        assert!(!b.improved_over(Some(&a)));
        assert!(a.improved_over(Some(&b)));
    }

    #[test]
    fn test_display() {
        let mut m = EpochMetrics::new(3);
        m.steps = 7;
        let text = m.to_string();
        assert!(text.contains("Epoch    3"));
        assert!(text.contains("7 steps"));
        assert!(!text.contains("val"));
    }
}
