//! Gradient buffers and batch accumulation.
use crate::datasets::Sample;
use crate::error::{NnError, Result};
use crate::layers::Matrix;
use crate::loss::LossKind;
use crate::network::Network;
use crate::optimizer::BatchPolicy;

/// Gradients for all layers in order, shaped like the network they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub d_w: Vec<Matrix>,
    pub db: Vec<Vec<f64>>,
}

impl Gradients {
    pub fn zeros_like(network: &Network) -> Self {
        let d_w = network
            .layers()
            .iter()
            .map(|l| vec![vec![0.0; l.input_size()]; l.output_size()])
            .collect();
        let db = network
            .layers()
            .iter()
            .map(|l| vec![0.0; l.output_size()])
            .collect();
        Self { d_w, db }
    }

    /// `self += other`, element by element.
    pub fn accumulate(&mut self, other: &Gradients) {
        for (mine, theirs) in self.d_w.iter_mut().zip(&other.d_w) {
            for (row, other_row) in mine.iter_mut().zip(theirs) {
                for (g, &o) in row.iter_mut().zip(other_row) {
                    *g += o;
                }
            }
        }
        for (mine, theirs) in self.db.iter_mut().zip(&other.db) {
            for (g, &o) in mine.iter_mut().zip(theirs) {
                *g += o;
            }
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.d_w
            .iter_mut()
            .flatten()
            .flatten()
            .chain(self.db.iter_mut().flatten())
            .for_each(|g| *g *= factor);
    }

    /// Mean |∂loss/∂z| per layer. Small values near the input show
    /// vanishing gradients in deep sigmoid stacks.
    pub fn layer_magnitudes(&self) -> Vec<f64> {
        self.db
            .iter()
            .map(|d| {
                if d.is_empty() {
                    0.0
                } else {
                    d.iter().map(|g| g.abs()).sum::<f64>() / d.len() as f64
                }
            })
            .collect()
    }

    /// Largest absolute entry, handy for checking a step did something.
    pub fn max_abs(&self) -> f64 {
        self.d_w
            .iter()
            .flatten()
            .flatten()
            .chain(self.db.iter().flatten())
            .fold(0.0_f64, |m, g| m.max(g.abs()))
    }
}

/// Result of running a batch through forward and backward passes.
#[derive(Debug, Clone)]
pub struct BatchGradients {
    pub gradients: Gradients,
    /// Loss summed over every sample and output unit of the batch,
    /// measured before any update.
    pub total_loss: f64,
    pub samples: usize,
}

impl BatchGradients {
    pub fn mean_loss(&self) -> f64 {
        self.total_loss / self.samples.max(1) as f64
    }
}

/// Forward and backward over every sample in `batch`, combined per `policy`.
pub fn batch_gradients<'a, I>(
    network: &Network,
    batch: I,
    loss: LossKind,
    policy: BatchPolicy,
) -> Result<BatchGradients>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut gradients = Gradients::zeros_like(network);
    let mut total_loss = 0.0;
    let mut samples = 0usize;
    for sample in batch {
        let trace = network.forward(&sample.input)?;
        total_loss += loss.sample_loss(trace.output(), &sample.target)?;
        gradients.accumulate(&network.compute_gradients(&trace, &sample.target, loss)?);
        samples += 1;
    }
    if samples == 0 {
        return Err(NnError::EmptyDataset);
    }
    if policy == BatchPolicy::Mean {
        gradients.scale(1.0 / samples as f64);
    }
    Ok(BatchGradients {
        gradients,
        total_loss,
        samples,
    })
}
