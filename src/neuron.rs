//! Single sigmoid neuron evaluation.
use crate::activations::sigmoid;
use crate::error::{ensure_len, Result};

/// Pre-activation `z = Σ wᵢxᵢ + b`.
pub fn weighted_sum(inputs: &[f64], weights: &[f64], bias: f64) -> Result<f64> {
    ensure_len("neuron weights", inputs.len(), weights.len())?;
    Ok(inputs.iter().zip(weights).map(|(&x, &w)| x * w).sum::<f64>() + bias)
}

/// `sigmoid(Σ wᵢxᵢ + b)`.
pub fn neuron_output(inputs: &[f64], weights: &[f64], bias: f64) -> Result<f64> {
    weighted_sum(inputs, weights, bias).map(sigmoid)
}
