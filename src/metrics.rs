//! What the hosting widget renders: accuracy, confident rows, decision
//! heatmaps and one-parameter loss curves.
use crate::datasets::Sample;
use crate::error::{NnError, Result};
use crate::loss::LossKind;
use crate::network::Network;
use serde::{Deserialize, Serialize};

/// An output counts as confidently right when it is above this for target 1
/// (or below `1 - CONFIDENT_MARGIN` for target 0).
pub const CONFIDENT_MARGIN: f64 = 0.8;

pub fn classifies_confidently(output: f64, target: f64) -> bool {
    if target >= 0.5 {
        output > CONFIDENT_MARGIN
    } else {
        output < 1.0 - CONFIDENT_MARGIN
    }
}

/// Fraction of samples whose first output lands on the right side of 0.5.
pub fn binary_accuracy(network: &Network, samples: &[Sample]) -> Result<f64> {
    if samples.is_empty() {
        return Err(NnError::EmptyDataset);
    }
    let mut correct = 0;
    for sample in samples {
        let out = first_output(network, &sample.input)?;
        let target = sample.target.first().copied().unwrap_or(0.0);
        if (out >= 0.5) == (target >= 0.5) {
            correct += 1;
        }
    }
    Ok(correct as f64 / samples.len() as f64)
}

/// Per-sample pass/fail under [`classifies_confidently`], in dataset order.
pub fn confident_rows(network: &Network, samples: &[Sample]) -> Result<Vec<bool>> {
    samples
        .iter()
        .map(|sample| {
            let out = first_output(network, &sample.input)?;
            let target = sample.target.first().copied().unwrap_or(0.0);
            Ok(classifies_confidently(out, target))
        })
        .collect()
}

/// Network output over a `resolution x resolution` grid on the unit square,
/// row-major with `y` increasing by row. Requires a 2-input network.
pub fn decision_grid(network: &Network, resolution: usize) -> Result<Vec<Vec<f64>>> {
    if resolution < 2 {
        return Err(NnError::InvalidConfig(
            "decision grid needs a resolution of at least 2".into(),
        ));
    }
    let step = 1.0 / (resolution - 1) as f64;
    (0..resolution)
        .map(|row| {
            let y = row as f64 * step;
            (0..resolution)
                .map(|col| first_output(network, &[col as f64 * step, y]))
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

/// Addresses one scalar parameter of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRef {
    Weight { layer: usize, neuron: usize, input: usize },
    Bias { layer: usize, neuron: usize },
}

/// Total loss as one parameter sweeps `[from, to]` in `samples` evenly
/// spaced points, every other parameter held fixed. Returns `(value, loss)`.
pub fn loss_curve(
    network: &Network,
    dataset: &[Sample],
    loss: LossKind,
    param: ParamRef,
    from: f64,
    to: f64,
    samples: usize,
) -> Result<Vec<(f64, f64)>> {
    if samples < 2 || !(from.is_finite() && to.is_finite()) {
        return Err(NnError::InvalidConfig(
            "loss curve needs finite bounds and at least 2 samples".into(),
        ));
    }
    let mut probe = network.clone();
    // validates the address before sweeping
    set_param(&mut probe, param, from)?;
    (0..samples)
        .map(|i| {
            let value = from + (to - from) * i as f64 / (samples - 1) as f64;
            set_param(&mut probe, param, value)?;
            Ok((value, probe.total_loss(dataset, loss)?))
        })
        .collect()
}

fn set_param(network: &mut Network, param: ParamRef, value: f64) -> Result<()> {
    let out_of_range = || NnError::InvalidConfig(format!("{param:?} does not exist in this network"));
    let (layer, neuron) = match param {
        ParamRef::Weight { layer, neuron, .. } | ParamRef::Bias { layer, neuron } => (layer, neuron),
    };
    let (weights, bias) = network
        .layers_mut()
        .get_mut(layer)
        .ok_or_else(out_of_range)?
        .parameters_mut();
    let slot = match param {
        ParamRef::Weight { input, .. } => weights
            .get_mut(neuron)
            .and_then(|row| row.get_mut(input)),
        ParamRef::Bias { .. } => bias.get_mut(neuron),
    };
    *slot.ok_or_else(out_of_range)? = value;
    Ok(())
}

fn first_output(network: &Network, input: &[f64]) -> Result<f64> {
    network
        .predict(input)?
        .first()
        .copied()
        .ok_or(NnError::DimensionMismatch {
            context: "network output",
            expected: 1,
            actual: 0,
        })
}
