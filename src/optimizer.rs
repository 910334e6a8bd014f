//! Gradient-descent parameter updates and the bounded loss history.
use crate::datasets::Sample;
use crate::error::{ensure_len, NnError, Result};
use crate::gradients::{batch_gradients, BatchGradients, Gradients};
use crate::loss::LossKind;
use crate::network::Network;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How per-sample gradients of a batch combine before the update.
///
/// `Mean` divides the summed gradient by the batch size, so the learning
/// rate means the same thing for any batch size. `Sum` keeps the raw sum,
/// which scales the effective step with the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    #[default]
    Mean,
    Sum,
}

/// Learning-rate schedule indexed by the optimizer step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRate {
    Constant(f64),
    /// `initial / (1 + decay * step)`
    InverseDecay { initial: f64, decay: f64 },
}

impl Default for LearningRate {
    fn default() -> Self {
        LearningRate::Constant(2.0)
    }
}

impl LearningRate {
    pub fn at(&self, step: u64) -> f64 {
        match *self {
            LearningRate::Constant(lr) => lr,
            LearningRate::InverseDecay { initial, decay } => initial / (1.0 + decay * step as f64),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (lr, decay) = match *self {
            LearningRate::Constant(lr) => (lr, 0.0),
            LearningRate::InverseDecay { initial, decay } => (initial, decay),
        };
        if !(lr.is_finite() && lr > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {lr}"
            )));
        }
        if !(decay.is_finite() && decay >= 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning-rate decay must be finite and >= 0, got {decay}"
            )));
        }
        Ok(())
    }
}

/// Inclusive bounds every parameter is clamped into after an update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamClamp {
    pub min: f64,
    pub max: f64,
}

impl ParamClamp {
    pub fn symmetric(limit: f64) -> Self {
        Self {
            min: -limit,
            max: limit,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(NnError::InvalidConfig(format!(
                "parameter clamp [{}, {}] is not a finite, non-empty range",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Plain stochastic / mini-batch gradient descent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: LearningRate,
    pub policy: BatchPolicy,
    pub clamp: Option<ParamClamp>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate: LearningRate::Constant(learning_rate),
            policy: BatchPolicy::Mean,
            clamp: None,
        }
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clamp(mut self, clamp: ParamClamp) -> Self {
        self.clamp = Some(clamp);
        self
    }

    pub fn with_schedule(mut self, learning_rate: LearningRate) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// `param <- param - lr * grad`, then clamp. `step` selects the
    /// scheduled learning rate.
    pub fn apply(&self, network: &mut Network, grads: &Gradients, step: u64) -> Result<()> {
        let lr = self.learning_rate.at(step);
        let layers = network.layers_mut();
        if grads.d_w.len() != layers.len() || grads.db.len() != layers.len() {
            return Err(NnError::DimensionMismatch {
                context: "gradient layers",
                expected: layers.len(),
                actual: grads.d_w.len().min(grads.db.len()),
            });
        }
        let clamp = |v: f64| self.clamp.map_or(v, |c| c.apply(v));
        for (layer, (d_w, db)) in layers.iter_mut().zip(grads.d_w.iter().zip(&grads.db)) {
            let (weights, bias) = layer.parameters_mut();
            if d_w.len() != weights.len() || db.len() != bias.len() {
                return Err(NnError::DimensionMismatch {
                    context: "gradient neurons",
                    expected: bias.len(),
                    actual: db.len(),
                });
            }
            for (b, &g) in bias.iter_mut().zip(db) {
                *b = clamp(*b - lr * g);
            }
            for (row, g_row) in weights.iter_mut().zip(d_w) {
                ensure_len("gradient row", row.len(), g_row.len())?;
                for (w, &g) in row.iter_mut().zip(g_row) {
                    *w = clamp(*w - lr * g);
                }
            }
        }
        Ok(())
    }

    /// One update from a single sample.
    pub fn step_single(
        &self,
        network: &mut Network,
        sample: &Sample,
        loss: LossKind,
        step: u64,
    ) -> Result<BatchGradients> {
        let trace = network.forward(&sample.input)?;
        let total_loss = loss.sample_loss(trace.output(), &sample.target)?;
        let gradients = network.compute_gradients(&trace, &sample.target, loss)?;
        self.apply(network, &gradients, step)?;
        Ok(BatchGradients {
            gradients,
            total_loss,
            samples: 1,
        })
    }

    /// One update from the combined gradient of `batch`.
    pub fn step_batch<'a, I>(
        &self,
        network: &mut Network,
        batch: I,
        loss: LossKind,
        step: u64,
    ) -> Result<BatchGradients>
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let result = batch_gradients(network, batch, loss, self.policy)?;
        self.apply(network, &result.gradients, step)?;
        Ok(result)
    }
}

/// Most recent losses, oldest evicted once `capacity` is exceeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl LossHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, loss: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(loss);
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
