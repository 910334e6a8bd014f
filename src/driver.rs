//! Pairs a [`Trainer`] with whatever schedules frames on the host.
//!
//! The driver holds at most one pending tick. Every action that leaves
//! `Running` or changes configuration cancels that tick with the scheduler
//! before the trainer is touched.
use crate::config::TrainingConfig;
use crate::datasets::Dataset;
use crate::error::Result;
use crate::network::Architecture;
use crate::trainer::{TickOutcome, TickTicket, Trainer, TrainerState, TrainingSnapshot};
use std::collections::VecDeque;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// The host's "call me next frame" primitive.
pub trait FrameScheduler {
    fn request_tick(&mut self) -> TickHandle;
    fn cancel_tick(&mut self, handle: TickHandle);
}

/// Queue-backed scheduler for hosts that pump their own event loop, and
/// for tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: VecDeque<TickHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest requested tick that has not been cancelled.
    pub fn next_due(&mut self) -> Option<TickHandle> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_tick(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending.push_back(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        self.pending.retain(|h| *h != handle);
    }
}

#[derive(Debug)]
pub struct Driver<S: FrameScheduler> {
    trainer: Trainer,
    scheduler: S,
    pending: Option<(TickHandle, TickTicket)>,
}

impl<S: FrameScheduler> Driver<S> {
    pub fn new(trainer: Trainer, scheduler: S) -> Self {
        Self {
            trainer,
            scheduler,
            pending: None,
        }
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn state(&self) -> TrainerState {
        self.trainer.state()
    }

    pub fn snapshot(&self) -> Result<TrainingSnapshot> {
        self.trainer.snapshot()
    }

    /// Start (or keep) running and make sure exactly one tick is pending.
    pub fn start(&mut self) {
        let ticket = self.trainer.start();
        match self.pending {
            Some((_, pending)) if pending == ticket => {}
            _ => {
                self.cancel_pending();
                self.schedule(ticket);
            }
        }
    }

    /// Frame callback. Handles that are not the one pending tick are
    /// ignored.
    pub fn on_tick(&mut self, handle: TickHandle) -> Result<TickOutcome> {
        let ticket = match self.pending {
            Some((pending, ticket)) if pending == handle => ticket,
            _ => {
                log::warn!("ignoring unexpected tick {:?}", handle);
                return Ok(TickOutcome::Stale);
            }
        };
        self.pending = None;
        let outcome = self.trainer.tick(ticket)?;
        if outcome == TickOutcome::Continue {
            self.schedule(ticket);
        }
        Ok(outcome)
    }

    pub fn stop(&mut self) -> bool {
        self.cancel_pending();
        self.trainer.stop()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.cancel_pending();
        self.trainer.reset()
    }

    pub fn single_step(&mut self) -> Result<f64> {
        self.cancel_pending();
        self.trainer.stop();
        self.trainer.single_step()
    }

    pub fn set_architecture(&mut self, architecture: Architecture) -> Result<()> {
        self.cancel_pending();
        self.trainer.set_architecture(architecture)
    }

    pub fn set_dataset(&mut self, dataset: Dataset) -> Result<()> {
        self.cancel_pending();
        self.trainer.set_dataset(dataset)
    }

    pub fn set_config(&mut self, config: TrainingConfig) -> Result<()> {
        self.cancel_pending();
        self.trainer.set_config(config)
    }

    pub fn into_trainer(mut self) -> Trainer {
        self.cancel_pending();
        self.trainer
    }

    fn schedule(&mut self, ticket: TickTicket) {
        let handle = self.scheduler.request_tick();
        self.pending = Some((handle, ticket));
    }

    fn cancel_pending(&mut self) {
        if let Some((handle, _)) = self.pending.take() {
            self.scheduler.cancel_tick(handle);
        }
    }
}

impl Driver<ManualScheduler> {
    /// Pump due ticks until the run leaves `Running` or `max_ticks` ran.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> Result<TrainerState> {
        for _ in 0..max_ticks {
            let Some(handle) = self.scheduler.next_due() else {
                break;
            };
            self.on_tick(handle)?;
        }
        Ok(self.trainer.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Gate;
    use crate::network::Network;

    fn driver(gate: Gate) -> Driver<ManualScheduler> {
        let (wa, wb, bias) = gate.starting_weights().unwrap_or((0.0, 0.0, 0.0));
        let net = Network::single_neuron(vec![wa, wb], bias).unwrap();
        let trainer =
            Trainer::with_network(net, gate.dataset(), TrainingConfig::neuron_optimizer()).unwrap();
        Driver::new(trainer, ManualScheduler::new())
    }

    #[test]
    fn start_schedules_one_tick() {
        let mut d = driver(Gate::Or);
        d.start();
        d.start();
        assert_eq!(d.scheduler().pending(), 1);
        assert_eq!(d.state(), TrainerState::Running);
    }

    #[test]
    fn each_tick_requests_the_next() {
        let mut d = driver(Gate::Or);
        d.start();
        let h = d.scheduler_mut().next_due().unwrap();
        assert_eq!(d.on_tick(h).unwrap(), TickOutcome::Continue);
        assert_eq!(d.scheduler().pending(), 1);
        assert_eq!(d.trainer().step(), 1);
    }

    #[test]
    fn stop_withdraws_the_pending_tick() {
        let mut d = driver(Gate::Or);
        d.start();
        let h = d.scheduler_mut().next_due().unwrap();
        d.on_tick(h).unwrap();
        assert!(d.stop());
        assert_eq!(d.scheduler().pending(), 0);
        assert_eq!(d.state(), TrainerState::Stopped);
    }

    #[test]
    fn late_callback_after_reset_is_ignored() {
        let mut d = driver(Gate::Nand);
        d.start();
        let stale = d.scheduler_mut().next_due().unwrap();
        d.reset().unwrap();
        let before = d.trainer().network().clone();
        assert_eq!(d.on_tick(stale).unwrap(), TickOutcome::Stale);
        assert_eq!(d.trainer().network(), &before);
        assert_eq!(d.trainer().step(), 0);
    }

    #[test]
    fn runs_to_step_limit_then_goes_quiet() {
        let mut d = driver(Gate::Xor);
        d.set_config(TrainingConfig {
            step_cap: 60,
            ..TrainingConfig::neuron_optimizer()
        })
        .unwrap();
        d.start();
        assert_eq!(d.run_until_settled(1000).unwrap(), TrainerState::StepLimitReached);
        assert_eq!(d.trainer().step(), 60);
        assert_eq!(d.scheduler().pending(), 0);
    }

    #[test]
    fn single_step_interrupts_a_run() {
        let mut d = driver(Gate::And);
        d.start();
        d.single_step().unwrap();
        assert_eq!(d.state(), TrainerState::Stopped);
        assert_eq!(d.scheduler().pending(), 0);
        assert_eq!(d.trainer().step(), 1);
    }
}
