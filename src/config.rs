//! Training-run configuration.
//!
//! Every widget tunes its own learning rate, clamp range, threshold and step
//! cap; none of these are invariants, so they all live here and load from
//! JSON.
use crate::error::{NnError, Result};
use crate::loss::LossKind;
use crate::optimizer::{BatchPolicy, LearningRate, ParamClamp, Sgd};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which samples one update draws from the dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Every sample, every update.
    #[default]
    Full,
    /// One uniformly random sample.
    Single,
    /// `size` distinct random samples (all of them if the dataset is smaller).
    MiniBatch { size: usize },
}

/// Which loss figure is compared with the convergence threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossMetric {
    /// Summed over the batch's samples and output units.
    Total,
    /// Total divided by the batch size.
    #[default]
    Mean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: LearningRate,
    pub batch: BatchMode,
    pub batch_policy: BatchPolicy,
    pub loss: LossKind,
    pub convergence_threshold: f64,
    pub convergence_metric: LossMetric,
    /// Hard cap on updates per run; reaching it ends the run unconverged.
    pub step_cap: u64,
    /// Updates performed per scheduler tick.
    pub updates_per_tick: u32,
    /// Bound on the published loss history.
    pub history_len: usize,
    pub clamp: Option<ParamClamp>,
    /// Fresh-weight restarts allowed when the cap is hit unconverged.
    pub max_restarts: u32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: LearningRate::Constant(2.0),
            batch: BatchMode::Full,
            batch_policy: BatchPolicy::Mean,
            loss: LossKind::BinaryCrossEntropy,
            convergence_threshold: 0.05,
            convergence_metric: LossMetric::Mean,
            step_cap: 2000,
            updates_per_tick: 1,
            history_len: 300,
            clamp: None,
            max_restarts: 0,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Single neuron fitting a logic gate: summed gradients, one update
    /// per frame, parameters kept inside [-10, 10].
    pub fn neuron_optimizer() -> Self {
        Self {
            batch_policy: BatchPolicy::Sum,
            convergence_threshold: 0.2,
            convergence_metric: LossMetric::Total,
            step_cap: 500,
            clamp: Some(ParamClamp::symmetric(10.0)),
            ..Self::default()
        }
    }

    /// Multi-layer trainer on 2-D patterns: squared error, ten updates per
    /// frame, two restarts with fresh weights before giving up.
    pub fn network_trainer() -> Self {
        Self {
            loss: LossKind::SquaredError,
            convergence_threshold: 0.05,
            step_cap: 20_000,
            updates_per_tick: 10,
            max_restarts: 2,
            ..Self::default()
        }
    }

    /// Free-form playground: BCE, eight updates per frame, long cap.
    pub fn playground() -> Self {
        Self {
            convergence_threshold: 0.02,
            step_cap: 5000,
            updates_per_tick: 8,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.learning_rate.validate()?;
        if let Some(clamp) = &self.clamp {
            clamp.validate()?;
        }
        if !(self.convergence_threshold.is_finite() && self.convergence_threshold >= 0.0) {
            return Err(NnError::InvalidConfig(
                "convergence_threshold must be finite and >= 0".into(),
            ));
        }
        if self.step_cap == 0 {
            return Err(NnError::InvalidConfig("step_cap must be > 0".into()));
        }
        if self.updates_per_tick == 0 {
            return Err(NnError::InvalidConfig("updates_per_tick must be > 0".into()));
        }
        if self.history_len == 0 {
            return Err(NnError::InvalidConfig("history_len must be > 0".into()));
        }
        if let BatchMode::MiniBatch { size: 0 } = self.batch {
            return Err(NnError::InvalidConfig("mini-batch size must be > 0".into()));
        }
        Ok(())
    }

    pub fn optimizer(&self) -> Sgd {
        Sgd {
            learning_rate: self.learning_rate,
            policy: self.batch_policy,
            clamp: self.clamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for config in [
            TrainingConfig::default(),
            TrainingConfig::neuron_optimizer(),
            TrainingConfig::network_trainer(),
            TrainingConfig::playground(),
        ] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = TrainingConfig::from_json_str(
            r#"{ "step_cap": 60, "clamp": { "min": -15.0, "max": 15.0 }, "batch": { "mini_batch": { "size": 2 } } }"#,
        )
        .unwrap();
        assert_eq!(config.step_cap, 60);
        assert_eq!(config.clamp, Some(ParamClamp::symmetric(15.0)));
        assert_eq!(config.batch, BatchMode::MiniBatch { size: 2 });
        assert_eq!(config.learning_rate, LearningRate::Constant(2.0));
        assert_eq!(config.loss, LossKind::BinaryCrossEntropy);
    }

    #[test]
    fn json_round_trip() {
        let config = TrainingConfig::neuron_optimizer();
        let back = TrainingConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(TrainingConfig::from_json_str(r#"{ "step_cap": 0 }"#).is_err());
        assert!(TrainingConfig::from_json_str(r#"{ "learning_rate": { "constant": -1.0 } }"#).is_err());
        assert!(TrainingConfig::from_json_str(r#"{ "clamp": { "min": 1.0, "max": -1.0 } }"#).is_err());
        assert!(TrainingConfig::from_json_str(r#"{ "batch": { "mini_batch": { "size": 0 } } }"#).is_err());
        assert!(matches!(
            TrainingConfig::from_json_str("{ not json"),
            Err(NnError::Json(_))
        ));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.json");
        std::fs::write(&path, r#"{ "updates_per_tick": 4 }"#).unwrap();
        assert_eq!(TrainingConfig::from_path(&path).unwrap().updates_per_tick, 4);
        assert!(matches!(
            TrainingConfig::from_path(dir.path().join("missing.json")),
            Err(NnError::Io(_))
        ));
    }
}
