//! Loss functions for training sigmoid-output networks.
use crate::activations::sigmoid_derivative_from_output;
use crate::error::{ensure_len, Result};
use serde::{Deserialize, Serialize};

/// Outputs are clamped into `[BCE_EPSILON, 1 - BCE_EPSILON]` before taking logs.
pub const BCE_EPSILON: f64 = 1e-7;

/// Squared error `(o - t)²` for one output unit.
pub fn squared_error(output: f64, target: f64) -> f64 {
    (output - target).powi(2)
}

/// Binary cross-entropy `-(t·ln o + (1-t)·ln(1-o))` for one output unit.
pub fn binary_cross_entropy(output: f64, target: f64) -> f64 {
    let o = output.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
    let loss = -(target * o.ln() + (1.0 - target) * (1.0 - o).ln());
    // t·ln(o) rounds slightly above zero at the clamp edges
    loss.max(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    SquaredError,
    #[default]
    BinaryCrossEntropy,
}

impl LossKind {
    pub fn per_unit(self, output: f64, target: f64) -> f64 {
        match self {
            LossKind::SquaredError => squared_error(output, target),
            LossKind::BinaryCrossEntropy => binary_cross_entropy(output, target),
        }
    }

    /// Loss of one sample, summed over output units.
    pub fn sample_loss(self, outputs: &[f64], targets: &[f64]) -> Result<f64> {
        ensure_len("loss targets", outputs.len(), targets.len())?;
        Ok(outputs
            .iter()
            .zip(targets)
            .map(|(&o, &t)| self.per_unit(o, t))
            .sum())
    }

    /// `∂loss/∂z` at a sigmoid output unit.
    ///
    /// BCE cancels the sigmoid derivative and reduces to `o - t`.
    pub fn output_delta(self, output: f64, target: f64) -> f64 {
        match self {
            LossKind::SquaredError => {
                2.0 * (output - target) * sigmoid_derivative_from_output(output)
            }
            LossKind::BinaryCrossEntropy => output - target,
        }
    }
}
