//! A small feed-forward network core for interactive training widgets:
//! neurons, dense layers, backpropagation, SGD, gate and pattern datasets,
//! and a tick-driven trainer that a rendering host can start, stop and
//! reconfigure at any moment.
//!
//! - Sigmoid/ReLU/leaky ReLU/swish/linear activations
//! - Squared-error and binary cross-entropy losses
//! - Batch or per-sample gradient descent with optional parameter clamping
//! - Decision heatmaps, loss curves and gradient magnitudes for display
//! - Gzipped JSON snapshots of trained networks

pub mod activations;
pub mod config;
pub mod datasets;
pub mod driver;
pub mod error;
pub mod gradients;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod neuron;
pub mod optimizer;
pub mod trainer;
pub mod utils;

pub use activations::{sigmoid, Activation, ActivationKind};
pub use config::{BatchMode, LossMetric, TrainingConfig};
pub use datasets::{Dataset, Gate, Pattern, Sample};
pub use driver::{Driver, FrameScheduler, ManualScheduler, TickHandle};
pub use error::{NnError, Result};
pub use gradients::{batch_gradients, BatchGradients, Gradients};
pub use layers::DenseLayer;
pub use loss::LossKind;
pub use metrics::{binary_accuracy, confident_rows, decision_grid, loss_curve, ParamRef};
pub use network::{ActivationTrace, Architecture, Network};
pub use neuron::{neuron_output, weighted_sum};
pub use optimizer::{BatchPolicy, LearningRate, LossHistory, ParamClamp, Sgd};
pub use trainer::{
    CancellationToken, TickOutcome, TickTicket, Trainer, TrainerState, TrainingSnapshot,
};
pub use utils::{format_summary_table, summarize_losses, LossSummary};
