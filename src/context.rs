//! Execution context threaded through every model call
//!
//! Carries the device and the train/eval mode explicitly instead of relying
//! on process-wide defaults. Gradient tracking is toggled through [`GradMode`],
//! whose scope restores the previous libtorch setting when it is dropped.

use tch::{Device, Tensor};

/// Whether layers behave as during training (dropout active) or inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Device and mode for a single training, evaluation or explanation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    device: Device,
    mode: Mode,
}

impl ExecutionContext {
    /// Create a context on the given device, in eval mode
    pub fn new(device: Device) -> Self {
        Self {
            device,
            mode: Mode::Eval,
        }
    }

    /// Use CUDA when present, otherwise fall back to the CPU
    pub fn auto() -> Self {
        Self::new(Device::cuda_if_available())
    }

    pub fn cpu() -> Self {
        Self::new(Device::Cpu)
    }

    /// Same device, training mode
    pub fn train(self) -> Self {
        Self {
            mode: Mode::Train,
            ..self
        }
    }

    /// Same device, evaluation mode
    pub fn eval(self) -> Self {
        Self {
            mode: Mode::Eval,
            ..self
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_train(&self) -> bool {
        self.mode == Mode::Train
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::auto()
    }
}

/// Gradient tracking requested for a block of computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradMode {
    Enabled,
    Disabled,
}

impl GradMode {
    /// Enter the mode; the previous mode is restored when the guard drops
    pub fn enter(self) -> GradScope {
        GradScope {
            previous: Tensor::grad_set_enabled(self == GradMode::Enabled),
        }
    }

    /// Run `f` under this mode
    pub fn run<T, F>(self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _scope = self.enter();
        f()
    }
}

/// RAII guard returned by [`GradMode::enter`]
#[derive(Debug)]
pub struct GradScope {
    previous: bool,
}

impl Drop for GradScope {
    fn drop(&mut self) {
        Tensor::grad_set_enabled(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    #[test]
    fn test_mode_switching_keeps_device() {
        let ctx = ExecutionContext::cpu();
        assert_eq!(ctx.mode(), Mode::Eval);

        let train = ctx.train();
        assert!(train.is_train());
        assert_eq!(train.device(), Device::Cpu);
        assert!(!train.eval().is_train());
    }

    #[test]
    fn test_grad_scope_restores_previous_mode() {
        let x = Tensor::ones([3], (Kind::Float, Device::Cpu)).set_requires_grad(true);

        let y = GradMode::Disabled.run(|| &x * 2.0);
        assert!(!y.requires_grad());

        // Outside the scope tracking is back on
        let z = &x * 2.0;
        assert!(z.requires_grad());
    }

    #[test]
    fn test_grad_scope_restores_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _: () = GradMode::Disabled.run(|| panic!("boom"));
        });
        assert!(result.is_err());

        let x = Tensor::ones([2], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        assert!((&x + 1.0).requires_grad());
    }
}
