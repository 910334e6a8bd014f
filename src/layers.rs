//! Dense layer: weight matrix, bias vector and activation.
use crate::activations::{Activation, ActivationKind};
use crate::error::{ensure_len, NnError, Result};
use crate::neuron::weighted_sum;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Matrix type, indexed `[neuron][input]`.
pub type Matrix = Vec<Vec<f64>>;

/// Biases are drawn from `U(-BIAS_INIT_RANGE, BIAS_INIT_RANGE)`.
pub const BIAS_INIT_RANGE: f64 = 0.5;

/// A fully-connected (dense) layer with weights, bias, and an activation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub(crate) weights: Matrix,
    pub(crate) bias: Vec<f64>,
    pub(crate) activation: ActivationKind,
}

impl DenseLayer {
    /// Create a layer with weights `U(-1, 1) * sqrt(1 / fan_in)` and biases
    /// `U(-0.5, 0.5)` drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: ActivationKind,
        rng: &mut R,
    ) -> Self {
        let scale = (1.0 / input_size.max(1) as f64).sqrt();
        let weights: Matrix = (0..output_size)
            .map(|_| {
                (0..input_size)
                    .map(|_| rng.gen_range(-1.0..1.0) * scale)
                    .collect()
            })
            .collect();
        let bias = (0..output_size)
            .map(|_| rng.gen_range(-BIAS_INIT_RANGE..BIAS_INIT_RANGE))
            .collect();
        Self {
            weights,
            bias,
            activation,
        }
    }

    /// Build a layer from explicit values, e.g. hand-set demo weights.
    pub fn from_parts(weights: Matrix, bias: Vec<f64>, activation: ActivationKind) -> Result<Self> {
        if weights.is_empty() {
            return Err(NnError::InvalidArchitecture(
                "layer must have at least one neuron".into(),
            ));
        }
        ensure_len("layer bias", weights.len(), bias.len())?;
        let fan_in = weights[0].len();
        if fan_in == 0 {
            return Err(NnError::InvalidArchitecture(
                "layer must have at least one input".into(),
            ));
        }
        for row in &weights {
            ensure_len("layer weight row", fan_in, row.len())?;
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn output_size(&self) -> usize {
        self.bias.len()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// Forward pass: computes pre-activations `z = W·x + b` and activations `a = act(z)`.
    pub fn forward(&self, input: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        ensure_len("layer input", self.input_size(), input.len())?;
        let z = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, &b)| weighted_sum(input, row, b))
            .collect::<Result<Vec<f64>>>()?;
        let a = self.activation.apply_vec(&z);
        Ok((z, a))
    }

    /// `Wᵀ · delta`: the error signal seen by this layer's inputs.
    pub fn backpropagate(&self, delta: &[f64]) -> Vec<f64> {
        let mut upstream = vec![0.0; self.input_size()];
        for (row, &d) in self.weights.iter().zip(delta) {
            for (u, &w) in upstream.iter_mut().zip(row) {
                *u += w * d;
            }
        }
        upstream
    }

    pub(crate) fn parameters_mut(&mut self) -> (&mut Matrix, &mut Vec<f64>) {
        (&mut self.weights, &mut self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn random_init_respects_shape_and_scale() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let layer = DenseLayer::new(4, 3, ActivationKind::Sigmoid, &mut rng);
        assert_eq!(layer.input_size(), 4);
        assert_eq!(layer.output_size(), 3);
        assert!(layer.weights.iter().flatten().all(|w| w.abs() <= 0.5));
        assert!(layer.bias.iter().all(|b| b.abs() <= BIAS_INIT_RANGE));
    }

    #[test]
    fn same_seed_same_layer() {
        let a = DenseLayer::new(2, 2, ActivationKind::Sigmoid, &mut ChaCha8Rng::seed_from_u64(1));
        let b = DenseLayer::new(2, 2, ActivationKind::Sigmoid, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn forward_computes_affine_then_activation() {
        let layer = DenseLayer::from_parts(
            vec![vec![1.0, 2.0], vec![-1.0, 0.0]],
            vec![0.5, 1.0],
            ActivationKind::Linear,
        )
        .unwrap();
        let (z, a) = layer.forward(&[1.0, 1.0]).unwrap();
        assert_eq!(z, vec![3.5, 0.0]);
        assert_eq!(a, z);
    }

    #[test]
    fn forward_rejects_wrong_input_width() {
        let layer = DenseLayer::from_parts(vec![vec![1.0, 2.0]], vec![0.0], ActivationKind::Sigmoid)
            .unwrap();
        assert!(layer.forward(&[1.0]).is_err());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = DenseLayer::from_parts(
            vec![vec![1.0, 2.0], vec![1.0]],
            vec![0.0, 0.0],
            ActivationKind::Sigmoid,
        );
        assert!(err.is_err());
    }

    #[test]
    fn backpropagate_is_transpose_product() {
        let layer = DenseLayer::from_parts(
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![0.0, 0.0],
            ActivationKind::Sigmoid,
        )
        .unwrap();
        assert_eq!(layer.backpropagate(&[1.0, -1.0]), vec![-2.0, -2.0]);
    }
}
