//! Activation functions and their derivatives.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pre-activations are clamped to this magnitude before exponentiation.
pub const SIGMOID_INPUT_LIMIT: f64 = 500.0;

/// Logistic sigmoid `1 / (1 + e^-x)`.
///
/// Total over all reals: the input is clamped to
/// `[-SIGMOID_INPUT_LIMIT, SIGMOID_INPUT_LIMIT]` first, so `exp` never
/// overflows and infinities saturate to the boundary values.
pub fn sigmoid(x: f64) -> f64 {
    let x = if x.is_nan() {
        0.0
    } else {
        x.clamp(-SIGMOID_INPUT_LIMIT, SIGMOID_INPUT_LIMIT)
    };
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative written in terms of the sigmoid's own output `a`.
pub fn sigmoid_derivative_from_output(a: f64) -> f64 {
    a * (1.0 - a)
}

/// Trait for activation functions.
///
/// `derivative` receives both the pre-activation `z` and the activation
/// `a = apply(z)` from the forward pass, so implementations can use
/// whichever is cheaper.
pub trait Activation: fmt::Debug + Send + Sync {
    fn apply(&self, z: f64) -> f64;
    fn derivative(&self, z: f64, a: f64) -> f64;
    fn apply_vec(&self, z: &[f64]) -> Vec<f64> {
        z.iter().map(|&zi| self.apply(zi)).collect()
    }
}

/// Sigmoid: 1 / (1 + exp(-z))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply(&self, z: f64) -> f64 {
        sigmoid(z)
    }
    fn derivative(&self, _z: f64, a: f64) -> f64 {
        sigmoid_derivative_from_output(a)
    }
}

/// ReLU: max(0, z)
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Activation for Relu {
    fn apply(&self, z: f64) -> f64 {
        z.max(0.0)
    }
    fn derivative(&self, z: f64, _a: f64) -> f64 {
        if z > 0.0 { 1.0 } else { 0.0 }
    }
}

/// LeakyReLU: z if z > 0 else alpha * z (alpha=0.01 default)
#[derive(Debug, Clone, Copy)]
pub struct LeakyRelu {
    pub alpha: f64,
}

impl Default for LeakyRelu {
    fn default() -> Self {
        Self { alpha: 0.01 }
    }
}

impl Activation for LeakyRelu {
    fn apply(&self, z: f64) -> f64 {
        if z > 0.0 { z } else { self.alpha * z }
    }
    fn derivative(&self, z: f64, _a: f64) -> f64 {
        if z > 0.0 { 1.0 } else { self.alpha }
    }
}

/// Swish (SiLU): z * sigmoid(z)
#[derive(Debug, Clone, Copy, Default)]
pub struct Swish;

impl Activation for Swish {
    fn apply(&self, z: f64) -> f64 {
        z * sigmoid(z)
    }
    fn derivative(&self, z: f64, _a: f64) -> f64 {
        let s = sigmoid(z);
        s + z * s * (1.0 - s)
    }
}

/// Linear: identity
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Activation for Linear {
    fn apply(&self, z: f64) -> f64 {
        z
    }
    fn derivative(&self, _z: f64, _a: f64) -> f64 {
        1.0
    }
}

/// Serializable activation selector stored on every layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    #[default]
    Sigmoid,
    Relu,
    LeakyRelu,
    Swish,
    Linear,
}

impl ActivationKind {
    fn as_activation(&self) -> &'static dyn Activation {
        const LEAKY: LeakyRelu = LeakyRelu { alpha: 0.01 };
        match self {
            ActivationKind::Sigmoid => &Sigmoid,
            ActivationKind::Relu => &Relu,
            ActivationKind::LeakyRelu => &LEAKY,
            ActivationKind::Swish => &Swish,
            ActivationKind::Linear => &Linear,
        }
    }
}

impl Activation for ActivationKind {
    fn apply(&self, z: f64) -> f64 {
        self.as_activation().apply(z)
    }
    fn derivative(&self, z: f64, a: f64) -> f64 {
        self.as_activation().derivative(z, a)
    }
}
