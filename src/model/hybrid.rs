//! Hybrid encoder + attention autoencoder
//!
//! The hybrid model owns every parameter through a single `VarStore`.
//! Persisted parameters carry no architecture metadata: a model must be
//! rebuilt from the same [`ModelConfig`] before loading.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tch::{nn, Device, Tensor};
use tracing::{debug, info};

use super::autoencoder::AttentionAutoencoder;
use super::encoder::{CnnLstmEncoder, SequenceEncoder};
use crate::context::{ExecutionContext, GradMode};
use crate::error::{AnomalyError, Result};

/// Architecture hyperparameters; must match between training and loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of input features
    pub input_size: i64,
    /// Output channels of the temporal convolution
    pub cnn_out_channels: i64,
    /// Convolution kernel size (odd)
    pub kernel_size: i64,
    /// LSTM hidden size
    pub lstm_hidden_size: i64,
    /// Number of stacked LSTM layers
    pub lstm_layers: i64,
    /// Hidden size of the attention autoencoder
    pub ae_hidden_size: i64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 5,
            cnn_out_channels: 32,
            kernel_size: 3,
            lstm_hidden_size: 64,
            lstm_layers: 2,
            ae_hidden_size: 32,
        }
    }
}

impl ModelConfig {
    /// Check that every size is positive and the kernel keeps the window length
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("input_size", self.input_size),
            ("cnn_out_channels", self.cnn_out_channels),
            ("kernel_size", self.kernel_size),
            ("lstm_hidden_size", self.lstm_hidden_size),
            ("lstm_layers", self.lstm_layers),
            ("ae_hidden_size", self.ae_hidden_size),
        ];
        for (name, value) in sizes {
            if value < 1 {
                return Err(AnomalyError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.kernel_size % 2 == 0 {
            return Err(AnomalyError::InvalidConfig(format!(
                "kernel_size must be odd to preserve the window length, got {}",
                self.kernel_size
            )));
        }
        Ok(())
    }
}

/// Output of a hybrid forward pass
#[derive(Debug)]
pub struct ModelOutput {
    /// Predicted final timestep, (batch, features)
    pub reconstruction: Tensor,
    /// Attention weights, (batch, window, ae_hidden_size)
    pub attention: Tensor,
    /// Encoder output, (batch, window, encoder_size)
    pub latent: Tensor,
}

/// Encoder and attention autoencoder composed into one anomaly detector
#[derive(Debug)]
pub struct HybridModel {
    vs: nn::VarStore,
    encoder: Box<dyn SequenceEncoder>,
    autoencoder: AttentionAutoencoder,
    config: ModelConfig,
}

impl HybridModel {
    /// Create a model with the default CNN-LSTM encoder
    pub fn new(config: ModelConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let encoder_config = config.clone();
        Self::with_encoder(config, device, move |path| {
            Box::new(CnnLstmEncoder::new(
                path,
                encoder_config.input_size,
                encoder_config.cnn_out_channels,
                encoder_config.kernel_size,
                encoder_config.lstm_hidden_size,
                encoder_config.lstm_layers,
            ))
        })
    }

    /// Create a model around a custom encoder
    ///
    /// `build` receives the variable path under which the encoder must
    /// register its parameters.
    pub fn with_encoder<F>(config: ModelConfig, device: Device, build: F) -> Result<Self>
    where
        F: FnOnce(&nn::Path) -> Box<dyn SequenceEncoder>,
    {
        if config.input_size < 1 || config.ae_hidden_size < 1 {
            return Err(AnomalyError::InvalidConfig(
                "input_size and ae_hidden_size must be positive".to_string(),
            ));
        }

        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let encoder = build(&(&root / "encoder"));
        let autoencoder = AttentionAutoencoder::new(
            &(&root / "autoencoder"),
            encoder.output_size(),
            config.ae_hidden_size,
            config.input_size,
        );

        let model = Self {
            vs,
            encoder,
            autoencoder,
            config,
        };
        debug!(
            "Built hybrid model with {} parameters on {:?}",
            model.num_parameters(),
            device
        );
        Ok(model)
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape (batch, window, features)
    /// * `ctx` - Execution context (dropout follows its mode)
    pub fn forward(&self, x: &Tensor, ctx: &ExecutionContext) -> Result<ModelOutput> {
        self.check_input(x)?;
        let x = x.to_device(self.device());

        let latent = self.encoder.forward(&x, ctx);
        let (reconstruction, attention) = self.autoencoder.forward(&latent);

        Ok(ModelOutput {
            reconstruction,
            attention,
            latent,
        })
    }

    /// Reconstruction only, with gradients disabled and dropout off
    pub fn reconstruct(&self, x: &Tensor) -> Result<Tensor> {
        let ctx = ExecutionContext::new(self.device());
        GradMode::Disabled.run(|| self.forward(x, &ctx).map(|out| out.reconstruction))
    }

    fn check_input(&self, x: &Tensor) -> Result<()> {
        let size = x.size();
        if size.len() != 3 || size[2] != self.config.input_size || size[1] < 1 {
            return Err(AnomalyError::shape(
                "hybrid model input (batch, window, features)",
                format!("[_, _, {}]", self.config.input_size),
                size,
            ));
        }
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel())
            .sum()
    }

    /// Save parameters (`.safetensors` by extension, libtorch format otherwise)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path.as_ref())?;
        info!("Saved model parameters to {}", path.as_ref().display());
        Ok(())
    }

    /// Load parameters saved from a model with the same configuration
    ///
    /// Every stored tensor must match a parameter of this model by name and
    /// shape; otherwise nothing is copied and a shape mismatch is returned.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let device = self.device();

        let stored = match path.extension().and_then(|ext| ext.to_str()) {
            Some("safetensors") => Tensor::read_safetensors(path)?,
            _ => Tensor::load_multi_with_device(path, device)?,
        };
        let stored: HashMap<String, Tensor> = stored.into_iter().collect();

        let mut variables = self.vs.variables();
        if stored.len() != variables.len() {
            return Err(AnomalyError::shape(
                "parameter count",
                variables.len(),
                stored.len(),
            ));
        }
        for (name, var) in variables.iter() {
            let src = stored.get(name).ok_or_else(|| {
                AnomalyError::shape("stored parameters", name, "missing")
            })?;
            if src.size() != var.size() {
                return Err(AnomalyError::shape(
                    format!("parameter {}", name),
                    var.size(),
                    src.size(),
                ));
            }
        }

        GradMode::Disabled.run(|| -> Result<()> {
            for (name, var) in variables.iter_mut() {
                var.f_copy_(&stored[name].to_device(device))?;
            }
            Ok(())
        })?;

        info!("Loaded model parameters from {}", path.display());
        Ok(())
    }
}
