//! Training-run state machine.
//!
//! A [`Trainer`] owns exactly one network and mutates it only inside
//! [`Trainer::tick`] or [`Trainer::single_step`]. Every run hands out a
//! [`TickTicket`]; leaving `Running` (converging, hitting the cap, stop,
//! reset or reconfiguration) bumps the generation so tickets issued earlier
//! are refused without touching any state.
use crate::config::{BatchMode, LossMetric, TrainingConfig};
use crate::datasets::{check_shape, Dataset};
use crate::error::{NnError, Result};
use crate::network::{ActivationTrace, Architecture, Network};
use crate::optimizer::{LossHistory, Sgd};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerState {
    Idle,
    Running,
    Converged,
    StepLimitReached,
    Stopped,
}

impl TrainerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrainerState::Converged | TrainerState::StepLimitReached | TrainerState::Stopped
        )
    }
}

/// Stop signal that can be raised from outside the thread driving ticks.
/// Checked at the start of every tick.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Proof that a tick belongs to the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The ticket was out of date or the trainer was not running; nothing changed.
    Stale,
    /// Still running; schedule another tick.
    Continue,
    /// The run ended in this tick.
    Finished(TrainerState),
}

/// What a rendering layer needs after each tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSnapshot {
    pub state: TrainerState,
    pub step: u64,
    pub restarts: u32,
    pub loss: Option<f64>,
    pub history: Vec<f64>,
    /// Fresh forward pass of the probe sample through the current weights.
    pub trace: ActivationTrace,
}

/// Where weights come from on reset.
#[derive(Debug, Clone)]
enum Init {
    Random(Architecture),
    Fixed(Network),
}

#[derive(Debug)]
pub struct Trainer {
    init: Init,
    network: Network,
    dataset: Dataset,
    config: TrainingConfig,
    optimizer: Sgd,
    rng: ChaCha8Rng,
    state: TrainerState,
    step: u64,
    restarts: u32,
    history: LossHistory,
    last_loss: Option<f64>,
    probe: usize,
    generation: u64,
    cancel: CancellationToken,
}

impl Trainer {
    /// Random weights for `architecture`, seeded from `config.seed`.
    pub fn new(architecture: Architecture, dataset: Dataset, config: TrainingConfig) -> Result<Self> {
        architecture.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let network = Network::new(&architecture, &mut rng)?;
        Self::build(Init::Random(architecture), network, dataset, config, rng)
    }

    /// Start from explicit weights; reset restores them.
    pub fn with_network(network: Network, dataset: Dataset, config: TrainingConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::build(Init::Fixed(network.clone()), network, dataset, config, rng)
    }

    fn build(
        init: Init,
        network: Network,
        dataset: Dataset,
        config: TrainingConfig,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        config.validate()?;
        check_shape(&dataset, network.input_size(), network.output_size())?;
        log::debug!("trainer ready: {} on {} samples", network, dataset.len());
        Ok(Self {
            init,
            network,
            dataset,
            optimizer: config.optimizer(),
            history: LossHistory::new(config.history_len),
            config,
            rng,
            state: TrainerState::Idle,
            step: 0,
            restarts: 0,
            last_loss: None,
            probe: 0,
            generation: 0,
            cancel: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn last_loss(&self) -> Option<f64> {
        self.last_loss
    }

    /// Handle for raising a stop from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ticket for the run in progress, if any.
    pub fn current_ticket(&self) -> Option<TickTicket> {
        (self.state == TrainerState::Running).then_some(TickTicket {
            generation: self.generation,
        })
    }

    /// Begin a run from the current weights. Already running: returns the
    /// live ticket. From a finished run: starts over at step 0.
    pub fn start(&mut self) -> TickTicket {
        if let Some(ticket) = self.current_ticket() {
            return ticket;
        }
        if self.state.is_terminal() {
            self.step = 0;
            self.restarts = 0;
            self.last_loss = None;
            self.history.clear();
        }
        self.cancel.clear();
        self.generation += 1;
        self.state = TrainerState::Running;
        log::info!("training started: {} (lr {:?})", self.network, self.config.learning_rate);
        TickTicket {
            generation: self.generation,
        }
    }

    /// One scheduling tick: up to `updates_per_tick` updates, then the
    /// convergence and step-cap checks.
    pub fn tick(&mut self, ticket: TickTicket) -> Result<TickOutcome> {
        if ticket.generation != self.generation || self.state != TrainerState::Running {
            log::warn!(
                "discarding stale tick (generation {} vs {}, state {:?})",
                ticket.generation,
                self.generation,
                self.state
            );
            return Ok(TickOutcome::Stale);
        }
        if self.cancel.is_cancelled() {
            self.stop();
            return Ok(TickOutcome::Finished(TrainerState::Stopped));
        }
        for _ in 0..self.config.updates_per_tick {
            let loss = match self.update_once() {
                Ok(loss) => loss,
                Err(e) => {
                    self.finish(TrainerState::Stopped);
                    return Err(e);
                }
            };
            if loss < self.config.convergence_threshold {
                self.finish(TrainerState::Converged);
                break;
            }
            if self.step >= self.config.step_cap && !self.try_restart()? {
                self.finish(TrainerState::StepLimitReached);
                break;
            }
        }
        log::trace!("tick: step {} loss {:?}", self.step, self.last_loss);
        Ok(match self.state {
            TrainerState::Running => TickOutcome::Continue,
            other => TickOutcome::Finished(other),
        })
    }

    /// Leave `Running`, keeping the weights as they are. Returns whether a
    /// run was actually interrupted.
    pub fn stop(&mut self) -> bool {
        if self.state != TrainerState::Running {
            return false;
        }
        self.finish(TrainerState::Stopped);
        true
    }

    /// Cancel any run, restore initial (or fresh random) weights, clear
    /// counters. Ends `Idle`.
    pub fn reset(&mut self) -> Result<()> {
        self.invalidate();
        self.network = match &self.init {
            Init::Random(arch) => Network::new(arch, &mut self.rng)?,
            Init::Fixed(network) => network.clone(),
        };
        self.step = 0;
        self.restarts = 0;
        self.history.clear();
        self.last_loss = None;
        self.state = TrainerState::Idle;
        self.cancel.clear();
        log::debug!("trainer reset: {}", self.network);
        Ok(())
    }

    /// One manual update outside the animation loop.
    pub fn single_step(&mut self) -> Result<f64> {
        if self.state == TrainerState::Running {
            return Err(NnError::InvalidConfig(
                "single step requested while a run is active".into(),
            ));
        }
        self.update_once()
    }

    /// Swap in a new architecture: cancels, rebuilds random weights.
    pub fn set_architecture(&mut self, architecture: Architecture) -> Result<()> {
        architecture.validate()?;
        check_shape(&self.dataset, architecture.inputs, architecture.outputs)?;
        self.invalidate();
        self.init = Init::Random(architecture);
        self.reset()
    }

    /// Swap in a new dataset: cancels, then resets the weights.
    pub fn set_dataset(&mut self, dataset: Dataset) -> Result<()> {
        check_shape(&dataset, self.network.input_size(), self.network.output_size())?;
        self.invalidate();
        self.dataset = dataset;
        self.probe = 0;
        self.reset()
    }

    /// Swap in a new configuration: cancels, keeps weights and counters.
    pub fn set_config(&mut self, config: TrainingConfig) -> Result<()> {
        config.validate()?;
        self.invalidate();
        if self.state == TrainerState::Running {
            self.state = TrainerState::Stopped;
        }
        let mut history = LossHistory::new(config.history_len);
        self.history.iter().for_each(|loss| history.push(loss));
        self.history = history;
        self.optimizer = config.optimizer();
        self.config = config;
        Ok(())
    }

    /// Choose which sample the published trace follows.
    pub fn set_probe(&mut self, index: usize) -> Result<()> {
        if index >= self.dataset.len() {
            return Err(NnError::DimensionMismatch {
                context: "probe sample",
                expected: self.dataset.len(),
                actual: index,
            });
        }
        self.probe = index;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<TrainingSnapshot> {
        let probe = self.dataset.get(self.probe).ok_or(NnError::EmptyDataset)?;
        Ok(TrainingSnapshot {
            state: self.state,
            step: self.step,
            restarts: self.restarts,
            loss: self.last_loss,
            history: self.history.to_vec(),
            trace: self.network.forward(&probe.input)?,
        })
    }

    fn update_once(&mut self) -> Result<f64> {
        let indices = self.draw_batch();
        let result = self.optimizer.step_batch(
            &mut self.network,
            indices.iter().map(|&i| &self.dataset[i]),
            self.config.loss,
            self.step,
        )?;
        self.step += 1;
        let loss = match self.config.convergence_metric {
            LossMetric::Total => result.total_loss,
            LossMetric::Mean => result.mean_loss(),
        };
        self.history.push(loss);
        self.last_loss = Some(loss);
        Ok(loss)
    }

    fn draw_batch(&mut self) -> Vec<usize> {
        let n = self.dataset.len();
        match self.config.batch {
            BatchMode::Full => (0..n).collect(),
            BatchMode::Single => vec![self.rng.gen_range(0..n)],
            BatchMode::MiniBatch { size } => {
                index::sample(&mut self.rng, n, size.min(n)).into_vec()
            }
        }
    }

    /// Fresh random weights when the cap is hit unconverged and restarts
    /// remain. Fixed starting weights never restart.
    fn try_restart(&mut self) -> Result<bool> {
        let Init::Random(arch) = &self.init else {
            return Ok(false);
        };
        if self.restarts >= self.config.max_restarts {
            return Ok(false);
        }
        self.network = Network::new(arch, &mut self.rng)?;
        self.restarts += 1;
        self.step = 0;
        self.history.clear();
        log::debug!(
            "no convergence after {} steps, restart {}/{}",
            self.config.step_cap,
            self.restarts,
            self.config.max_restarts
        );
        Ok(true)
    }

    fn finish(&mut self, state: TrainerState) {
        self.invalidate();
        self.state = state;
        log::info!(
            "training {:?} after {} steps (loss {:?}, restarts {})",
            state,
            self.step,
            self.last_loss,
            self.restarts
        );
    }

    fn invalidate(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Gate;

    fn gate_trainer(gate: Gate, config: TrainingConfig) -> Trainer {
        let (wa, wb, bias) = gate.starting_weights().unwrap_or((0.0, 0.0, 0.0));
        let net = Network::single_neuron(vec![wa, wb], bias).unwrap();
        Trainer::with_network(net, gate.dataset(), config).unwrap()
    }

    #[test]
    fn idle_until_started() {
        let trainer = gate_trainer(Gate::And, TrainingConfig::neuron_optimizer());
        assert_eq!(trainer.state(), TrainerState::Idle);
        assert_eq!(trainer.current_ticket(), None);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut trainer = gate_trainer(Gate::And, TrainingConfig::neuron_optimizer());
        let a = trainer.start();
        let b = trainer.start();
        assert_eq!(a, b);
    }

    #[test]
    fn tick_updates_step_and_history() {
        let mut trainer = gate_trainer(Gate::Or, TrainingConfig::neuron_optimizer());
        let ticket = trainer.start();
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Continue);
        assert_eq!(trainer.step(), 1);
        assert_eq!(trainer.history().len(), 1);
        assert!(trainer.last_loss().is_some());
    }

    #[test]
    fn clamped_descent_converges_on_and() {
        let config = TrainingConfig {
            batch_policy: crate::optimizer::BatchPolicy::Mean,
            step_cap: 2000,
            ..TrainingConfig::neuron_optimizer()
        };
        let mut trainer = gate_trainer(Gate::And, config);
        let ticket = trainer.start();
        let outcome = loop {
            match trainer.tick(ticket).unwrap() {
                TickOutcome::Continue => continue,
                other => break other,
            }
        };
        assert_eq!(outcome, TickOutcome::Finished(TrainerState::Converged));
        assert!(trainer.last_loss().unwrap() < 0.2);
        assert!(trainer.step() < 2000);
        let weights = trainer.network().layers()[0].weights()[0].clone();
        assert!(weights.iter().all(|w| w.abs() <= 10.0));
    }

    #[test]
    fn xor_on_single_neuron_hits_step_cap() {
        let config = TrainingConfig {
            step_cap: 60,
            ..TrainingConfig::neuron_optimizer()
        };
        let mut trainer = gate_trainer(Gate::Xor, config);
        let ticket = trainer.start();
        let mut ticks = 0;
        while trainer.tick(ticket).unwrap() == TickOutcome::Continue {
            ticks += 1;
        }
        assert_eq!(trainer.state(), TrainerState::StepLimitReached);
        assert_eq!(trainer.step(), 60);
        assert_eq!(ticks, 59);
        // the old ticket is dead once the run ends
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Stale);
    }

    #[test]
    fn stop_keeps_weights_and_refuses_old_ticket() {
        let mut trainer = gate_trainer(Gate::Nand, TrainingConfig::neuron_optimizer());
        let ticket = trainer.start();
        trainer.tick(ticket).unwrap();
        assert!(trainer.stop());
        assert!(!trainer.stop());
        let frozen = trainer.network().clone();
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Stale);
        assert_eq!(trainer.network(), &frozen);
        assert_eq!(trainer.state(), TrainerState::Stopped);
    }

    #[test]
    fn external_cancellation_stops_at_next_tick() {
        let mut trainer = gate_trainer(Gate::Or, TrainingConfig::neuron_optimizer());
        let token = trainer.cancellation_token();
        let ticket = trainer.start();
        trainer.tick(ticket).unwrap();
        let before = trainer.network().clone();
        token.cancel();
        assert_eq!(
            trainer.tick(ticket).unwrap(),
            TickOutcome::Finished(TrainerState::Stopped)
        );
        assert_eq!(trainer.network(), &before);
        // a new run clears the flag
        let ticket = trainer.start();
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Continue);
    }

    #[test]
    fn reset_restores_fixed_start() {
        let mut trainer = gate_trainer(Gate::Nor, TrainingConfig::neuron_optimizer());
        let start = trainer.network().clone();
        let ticket = trainer.start();
        trainer.tick(ticket).unwrap();
        assert_ne!(trainer.network(), &start);
        trainer.reset().unwrap();
        assert_eq!(trainer.network(), &start);
        assert_eq!(trainer.state(), TrainerState::Idle);
        assert_eq!(trainer.step(), 0);
        assert!(trainer.history().is_empty());
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Stale);
    }

    #[test]
    fn single_step_only_outside_a_run() {
        let mut trainer = gate_trainer(Gate::And, TrainingConfig::neuron_optimizer());
        trainer.single_step().unwrap();
        assert_eq!(trainer.step(), 1);
        assert_eq!(trainer.state(), TrainerState::Idle);
        trainer.start();
        assert!(trainer.single_step().is_err());
    }

    #[test]
    fn restart_gives_fresh_weights_before_giving_up() {
        let config = TrainingConfig {
            step_cap: 5,
            convergence_threshold: 0.0,
            max_restarts: 2,
            ..TrainingConfig::default()
        };
        let mut trainer =
            Trainer::new(Architecture::hidden(2, 1, 2, 1), Gate::Xor.dataset(), config).unwrap();
        let ticket = trainer.start();
        let mut ticks = 0;
        while trainer.tick(ticket).unwrap() == TickOutcome::Continue {
            ticks += 1;
        }
        assert_eq!(trainer.restarts(), 2);
        assert_eq!(trainer.state(), TrainerState::StepLimitReached);
        assert_eq!(ticks, 14);

        // a second run gets the full restart budget again
        let ticket = trainer.start();
        assert_eq!(trainer.restarts(), 0);
        assert_eq!(trainer.last_loss(), None);
        assert_eq!(trainer.snapshot().unwrap().restarts, 0);
        let mut ticks = 0;
        while trainer.tick(ticket).unwrap() == TickOutcome::Continue {
            ticks += 1;
        }
        assert_eq!(trainer.restarts(), 2);
        assert_eq!(ticks, 14);
    }

    #[test]
    fn reconfiguring_cancels_the_run() {
        let mut trainer =
            Trainer::new(Architecture::default(), Gate::Xor.dataset(), TrainingConfig::default())
                .unwrap();
        let ticket = trainer.start();
        trainer.set_architecture(Architecture::hidden(2, 2, 3, 1)).unwrap();
        assert_eq!(trainer.state(), TrainerState::Idle);
        assert_eq!(trainer.network().widths(), vec![2, 3, 3, 1]);
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Stale);

        let ticket = trainer.start();
        trainer
            .set_config(TrainingConfig {
                history_len: 2,
                ..TrainingConfig::default()
            })
            .unwrap();
        assert_eq!(trainer.state(), TrainerState::Stopped);
        assert_eq!(trainer.tick(ticket).unwrap(), TickOutcome::Stale);

        assert!(trainer.set_architecture(Architecture::hidden(3, 1, 2, 1)).is_err());
        assert!(trainer
            .set_dataset(vec![crate::datasets::Sample::new(vec![1.0], vec![1.0])])
            .is_err());
    }

    #[test]
    fn same_seed_same_trajectory() {
        let run = || {
            let config = TrainingConfig {
                batch: BatchMode::MiniBatch { size: 2 },
                seed: 9,
                ..TrainingConfig::default()
            };
            let mut trainer =
                Trainer::new(Architecture::hidden(2, 1, 3, 1), Gate::Xor.dataset(), config).unwrap();
            let ticket = trainer.start();
            for _ in 0..25 {
                trainer.tick(ticket).unwrap();
            }
            trainer.history().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn snapshot_traces_probe_sample() {
        let mut trainer = gate_trainer(Gate::And, TrainingConfig::neuron_optimizer());
        trainer.set_probe(3).unwrap();
        let snap = trainer.snapshot().unwrap();
        assert_eq!(snap.trace.input(), &[1.0, 1.0]);
        assert_eq!(snap.trace.widths(), vec![2, 1]);
        assert_eq!(snap.state, TrainerState::Idle);
        assert!(trainer.set_probe(4).is_err());
    }
}
