//! Training samples: logic-gate truth tables and synthetic 2-D patterns.
use crate::error::{ensure_len, NnError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One (input, target) pair. Never mutated after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

impl Sample {
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> Self {
        Self { input, target }
    }

    /// 2-D point with a single 0/1 label.
    pub fn point(x: f64, y: f64, label: f64) -> Self {
        Self::new(vec![x, y], vec![label])
    }
}

pub type Dataset = Vec<Sample>;

/// Checks every sample against the network's input and output widths.
pub fn check_shape(samples: &[Sample], inputs: usize, outputs: usize) -> Result<()> {
    if samples.is_empty() {
        return Err(NnError::EmptyDataset);
    }
    for sample in samples {
        ensure_len("sample input", inputs, sample.input.len())?;
        ensure_len("sample target", outputs, sample.target.len())?;
    }
    Ok(())
}

/// The four two-bit input rows, in truth-table order.
pub const GATE_INPUTS: [[f64; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    And,
    Or,
    Nand,
    Nor,
    Xor,
    NotA,
}

impl Gate {
    pub const ALL: [Gate; 6] = [Gate::And, Gate::Or, Gate::Nand, Gate::Nor, Gate::Xor, Gate::NotA];

    /// Targets for [`GATE_INPUTS`], row by row.
    pub fn targets(self) -> [f64; 4] {
        match self {
            Gate::And => [0.0, 0.0, 0.0, 1.0],
            Gate::Or => [0.0, 1.0, 1.0, 1.0],
            Gate::Nand => [1.0, 1.0, 1.0, 0.0],
            Gate::Nor => [1.0, 0.0, 0.0, 0.0],
            Gate::Xor => [0.0, 1.0, 1.0, 0.0],
            Gate::NotA => [1.0, 1.0, 0.0, 0.0],
        }
    }

    /// Whether one sigmoid neuron can separate the truth table.
    pub fn is_linearly_separable(self) -> bool {
        self != Gate::Xor
    }

    /// Deliberately wrong `(w_a, w_b, bias)` the single-neuron optimizer
    /// demo starts from. XOR has none: no single neuron can fit it.
    pub fn starting_weights(self) -> Option<(f64, f64, f64)> {
        match self {
            Gate::And => Some((1.0, -2.0, 1.0)),
            Gate::Or => Some((-1.0, -1.0, 2.0)),
            Gate::NotA => Some((2.0, 1.0, -1.0)),
            Gate::Nand => Some((1.0, 1.0, -3.0)),
            Gate::Nor => Some((1.0, 1.0, 1.0)),
            Gate::Xor => None,
        }
    }

    pub fn dataset(self) -> Dataset {
        GATE_INPUTS
            .iter()
            .zip(self.targets())
            .map(|(&[a, b], t)| Sample::point(a, b, t))
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Gate::And => "AND",
            Gate::Or => "OR",
            Gate::Nand => "NAND",
            Gate::Nor => "NOR",
            Gate::Xor => "XOR",
            Gate::NotA => "NOT(A)",
        }
    }
}

/// Synthetic point clouds in the unit square, labelled 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// The bare four-row XOR truth table.
    Xor,
    /// Four noisy clusters at the corners, XOR-labelled.
    XorClusters,
    /// Inner disc of class 0 inside a ring of class 1.
    Circle,
    /// Two interleaved spiral arms.
    Spirals,
    /// 4x4 checkerboard.
    Checkerboard,
}

impl Pattern {
    pub fn generate<R: Rng + ?Sized>(self, rng: &mut R) -> Dataset {
        match self {
            Pattern::Xor => Gate::Xor.dataset(),
            Pattern::XorClusters => xor_clusters(rng),
            Pattern::Circle => circle(rng),
            Pattern::Spirals => spirals(rng),
            Pattern::Checkerboard => checkerboard(rng),
        }
    }
}

fn xor_clusters<R: Rng + ?Sized>(rng: &mut R) -> Dataset {
    const CLUSTERS: [(f64, f64, f64); 4] = [
        (0.25, 0.25, 0.0),
        (0.75, 0.75, 0.0),
        (0.25, 0.75, 1.0),
        (0.75, 0.25, 1.0),
    ];
    let mut pts = Vec::with_capacity(40);
    for (cx, cy, label) in CLUSTERS {
        for _ in 0..10 {
            let x = cx + rng.gen_range(-0.075..0.075);
            let y = cy + rng.gen_range(-0.075..0.075);
            pts.push(Sample::point(x, y, label));
        }
    }
    pts
}

fn circle<R: Rng + ?Sized>(rng: &mut R) -> Dataset {
    let n = 40;
    let mut pts = Vec::with_capacity(2 * n);
    for i in 0..n {
        let angle = i as f64 / n as f64 * 2.0 * PI;
        let inner = rng.gen_range(0.15..0.20);
        pts.push(Sample::point(0.5 + inner * angle.cos(), 0.5 + inner * angle.sin(), 0.0));
        let outer = rng.gen_range(0.30..0.38);
        pts.push(Sample::point(0.5 + outer * angle.cos(), 0.5 + outer * angle.sin(), 1.0));
    }
    pts
}

fn spirals<R: Rng + ?Sized>(rng: &mut R) -> Dataset {
    let n = 50;
    let mut pts = Vec::with_capacity(2 * n);
    for i in 0..n {
        let frac = i as f64 / n as f64;
        let t = frac * 3.0 * PI;
        let r = frac * 0.4;
        let mut noise = || rng.gen_range(-0.015..0.015);
        pts.push(Sample::point(
            0.5 + r * t.cos() + noise(),
            0.5 + r * t.sin() + noise(),
            0.0,
        ));
        pts.push(Sample::point(
            0.5 - r * t.cos() + noise(),
            0.5 - r * t.sin() + noise(),
            1.0,
        ));
    }
    pts
}

fn checkerboard<R: Rng + ?Sized>(rng: &mut R) -> Dataset {
    (0..80)
        .map(|_| {
            let x: f64 = rng.gen_range(0.1..0.9);
            let y: f64 = rng.gen_range(0.1..0.9);
            let cell = (x * 4.0).floor() as u32 + (y * 4.0).floor() as u32;
            Sample::point(x, y, f64::from(cell % 2))
        })
        .collect()
}
