//! Feed-forward sigmoid network: construction, forward pass, backprop and persistence.
use crate::activations::{Activation, ActivationKind};
use crate::datasets::Sample;
use crate::error::{ensure_len, NnError, Result};
use crate::gradients::Gradients;
use crate::layers::{DenseLayer, Matrix};
use crate::loss::LossKind;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Shape of a network as the hosting widget configures it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Architecture {
    pub inputs: usize,
    pub hidden_layers: usize,
    pub neurons_per_layer: usize,
    pub outputs: usize,
    /// Activation of hidden layers; the output layer is always sigmoid.
    pub hidden_activation: ActivationKind,
}

impl Default for Architecture {
    fn default() -> Self {
        Self {
            inputs: 2,
            hidden_layers: 1,
            neurons_per_layer: 2,
            outputs: 1,
            hidden_activation: ActivationKind::Sigmoid,
        }
    }
}

impl Architecture {
    /// Input straight to output: one neuron per output, no hidden layer.
    pub fn single_layer(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            hidden_layers: 0,
            neurons_per_layer: 0,
            outputs,
            hidden_activation: ActivationKind::Sigmoid,
        }
    }

    pub fn hidden(inputs: usize, hidden_layers: usize, neurons_per_layer: usize, outputs: usize) -> Self {
        Self {
            inputs,
            hidden_layers,
            neurons_per_layer,
            outputs,
            hidden_activation: ActivationKind::Sigmoid,
        }
    }

    pub fn with_hidden_activation(mut self, activation: ActivationKind) -> Self {
        self.hidden_activation = activation;
        self
    }

    /// Layer widths `[n0, n1, ..., nk]`, input first.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.hidden_layers + 2);
        widths.push(self.inputs);
        widths.extend(std::iter::repeat(self.neurons_per_layer).take(self.hidden_layers));
        widths.push(self.outputs);
        widths
    }

    pub fn validate(&self) -> Result<()> {
        if self.inputs == 0 || self.outputs == 0 {
            return Err(NnError::InvalidArchitecture(
                "inputs and outputs must be non-zero".into(),
            ));
        }
        if self.hidden_layers > 0 && self.neurons_per_layer == 0 {
            return Err(NnError::InvalidArchitecture(
                "hidden layers need at least one neuron".into(),
            ));
        }
        Ok(())
    }
}

/// Everything one forward pass produced.
///
/// `activations[0]` is the input and `activations[i + 1]` is layer `i`'s
/// output; `pre_activations[i]` holds layer `i`'s weighted sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationTrace {
    pub activations: Vec<Vec<f64>>,
    pub pre_activations: Vec<Vec<f64>>,
}

impl ActivationTrace {
    pub fn input(&self) -> &[f64] {
        self.activations.first().map_or(&[][..], Vec::as_slice)
    }

    pub fn output(&self) -> &[f64] {
        self.activations.last().map_or(&[][..], Vec::as_slice)
    }

    pub fn widths(&self) -> Vec<usize> {
        self.activations.iter().map(Vec::len).collect()
    }
}

/// Ordered layers from input to output.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<DenseLayer>,
    input_size: usize,
}

impl Network {
    /// Random network for `arch`, weights drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(arch: &Architecture, rng: &mut R) -> Result<Self> {
        arch.validate()?;
        let widths = arch.widths();
        let last = widths.len() - 2;
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last {
                    ActivationKind::Sigmoid
                } else {
                    arch.hidden_activation
                };
                DenseLayer::new(pair[0], pair[1], activation, rng)
            })
            .collect();
        Ok(Self {
            layers,
            input_size: arch.inputs,
        })
    }

    /// Network from explicit layers; checks each layer's fan-in against
    /// the previous layer's width. The output layer must be sigmoid.
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        let input_size = layers
            .first()
            .map(DenseLayer::input_size)
            .ok_or_else(|| NnError::InvalidArchitecture("network needs at least one layer".into()))?;
        if let Some(kind) = layers.last().map(DenseLayer::activation) {
            if kind != ActivationKind::Sigmoid {
                return Err(NnError::InvalidArchitecture(format!(
                    "output layer must be sigmoid, got {kind:?}"
                )));
            }
        }
        let mut prev = input_size;
        for layer in &layers {
            ensure_len("layer fan-in", prev, layer.input_size())?;
            prev = layer.output_size();
        }
        Ok(Self { layers, input_size })
    }

    /// One sigmoid neuron reading `weights.len()` inputs.
    pub fn single_neuron(weights: Vec<f64>, bias: f64) -> Result<Self> {
        let layer = DenseLayer::from_parts(vec![weights], vec![bias], ActivationKind::Sigmoid)?;
        Self::from_layers(vec![layer])
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::output_size)
    }

    pub fn widths(&self) -> Vec<usize> {
        std::iter::once(self.input_size)
            .chain(self.layers.iter().map(DenseLayer::output_size))
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.output_size() * (l.input_size() + 1))
            .sum()
    }

    /// Forward pass from input to output, keeping every intermediate.
    pub fn forward(&self, input: &[f64]) -> Result<ActivationTrace> {
        ensure_len("network input", self.input_size, input.len())?;
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        activations.push(input.to_vec());
        for layer in &self.layers {
            let current = activations.last().map_or(&[][..], Vec::as_slice);
            let (z, a) = layer.forward(current)?;
            pre_activations.push(z);
            activations.push(a);
        }
        Ok(ActivationTrace {
            activations,
            pre_activations,
        })
    }

    /// Predict outputs for a single input.
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut trace = self.forward(input)?;
        Ok(trace.activations.pop().unwrap_or_default())
    }

    /// Backpropagate `target` through a trace this network produced.
    ///
    /// Layers are visited last to first; the stored activations are reused,
    /// never recomputed.
    pub fn compute_gradients(
        &self,
        trace: &ActivationTrace,
        target: &[f64],
        loss: LossKind,
    ) -> Result<Gradients> {
        ensure_len("trace depth", self.layers.len() + 1, trace.activations.len())?;
        ensure_len("trace depth", self.layers.len(), trace.pre_activations.len())?;
        let output = trace.output();
        ensure_len("target", self.output_size(), target.len())?;
        ensure_len("trace output", self.output_size(), output.len())?;

        let mut grads = Gradients::zeros_like(self);
        // dL/dz at the output
        let mut delta: Vec<f64> = output
            .iter()
            .zip(target)
            .map(|(&o, &t)| loss.output_delta(o, t))
            .collect();

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let a_prev = &trace.activations[idx];
            ensure_len("trace layer input", layer.input_size(), a_prev.len())?;

            // dW = delta (outer) a_prev, db = delta
            for (row, &d) in grads.d_w[idx].iter_mut().zip(&delta) {
                for (g, &a) in row.iter_mut().zip(a_prev) {
                    *g = d * a;
                }
            }
            grads.db[idx].clone_from(&delta);

            if idx > 0 {
                let below = &self.layers[idx - 1];
                let z_prev = &trace.pre_activations[idx - 1];
                delta = layer
                    .backpropagate(&delta)
                    .into_iter()
                    .zip(z_prev.iter().zip(a_prev))
                    .map(|(err, (&z, &a))| err * below.activation().derivative(z, a))
                    .collect();
            }
        }
        Ok(grads)
    }

    /// Summed loss over every sample and output unit.
    pub fn total_loss(&self, samples: &[Sample], loss: LossKind) -> Result<f64> {
        samples.iter().try_fold(0.0, |acc, sample| -> Result<f64> {
            let output = self.predict(&sample.input)?;
            Ok(acc + loss.sample_loss(&output, &sample.target)?)
        })
    }

    /// [`Network::total_loss`] divided by the sample count.
    pub fn mean_loss(&self, samples: &[Sample], loss: LossKind) -> Result<f64> {
        if samples.is_empty() {
            return Err(NnError::EmptyDataset);
        }
        Ok(self.total_loss(samples, loss)? / samples.len() as f64)
    }

    /// Save network to a gzipped JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec(&NetworkDto::from_network(self))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(&json)?;
        enc.finish()?;
        log::debug!("saved {} to {}", self, path.display());
        Ok(())
    }

    /// Load network from a gzipped JSON snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut dec = GzDecoder::new(file);
        let mut buf = Vec::new();
        dec.read_to_end(&mut buf)?;
        let dto: NetworkDto = serde_json::from_slice(&buf)?;
        dto.into_network()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Network: {:?} ({} params)", self.widths(), self.parameter_count())
    }
}

// ============ Persistence DTOs ============

#[derive(Debug, Serialize, Deserialize)]
struct LayerDto {
    weights: Matrix, // [output_size][input_size]
    bias: Vec<f64>,  // [output_size]
    activation: ActivationKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkDto {
    widths: Vec<usize>,
    layers: Vec<LayerDto>,
}

impl NetworkDto {
    fn from_network(net: &Network) -> Self {
        fn sanitize(x: f64) -> f64 {
            if x.is_finite() { x } else { 0.0 }
        }
        let layers = net
            .layers
            .iter()
            .map(|layer| LayerDto {
                weights: layer
                    .weights()
                    .iter()
                    .map(|row| row.iter().copied().map(sanitize).collect())
                    .collect(),
                bias: layer.bias().iter().copied().map(sanitize).collect(),
                activation: layer.activation(),
            })
            .collect();
        Self {
            widths: net.widths(),
            layers,
        }
    }

    fn into_network(self) -> Result<Network> {
        let layers = self
            .layers
            .into_iter()
            .map(|ld| DenseLayer::from_parts(ld.weights, ld.bias, ld.activation))
            .collect::<Result<Vec<_>>>()?;
        let net = Network::from_layers(layers)?;
        if net.widths() != self.widths {
            return Err(NnError::InvalidArchitecture(format!(
                "snapshot declares widths {:?} but layers give {:?}",
                self.widths,
                net.widths()
            )));
        }
        Ok(net)
    }
}
