// ml_demos/src/main.rs
use anyhow::{bail, Context, Result};
use messabout_nn::{
    binary_accuracy, confident_rows, format_summary_table, summarize_losses, Architecture, Driver,
    Gate, LossMetric, ManualScheduler, Network, Trainer, TrainerState, TrainingConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let base = match config_path()? {
        Some(path) => TrainingConfig::from_path(&path)
            .with_context(|| format!("loading training config from {path}"))?,
        None => TrainingConfig::default(),
    };

    log::info!("=== Single neurons ===");
    for gate in [Gate::And, Gate::Or, Gate::Nand, Gate::Xor] {
        train_gate(gate, &base)?;
    }

    log::info!("=== XOR with a hidden layer ===");
    train_xor_network(&base)?;
    Ok(())
}

/// `--config <path>` is the only accepted argument.
fn config_path() -> Result<Option<String>> {
    let mut args = std::env::args().skip(1);
    match (args.next().as_deref(), args.next()) {
        (None, _) => Ok(None),
        (Some("--config"), Some(path)) => Ok(Some(path)),
        (Some(other), _) => bail!("unexpected argument {other:?}; usage: ml_demos [--config <json>]"),
    }
}

fn train_gate(gate: Gate, base: &TrainingConfig) -> Result<()> {
    let (wa, wb, bias) = gate.starting_weights().unwrap_or((0.0, 0.0, 0.0));
    let network = Network::single_neuron(vec![wa, wb], bias)?;
    let config = TrainingConfig {
        seed: base.seed,
        ..TrainingConfig::neuron_optimizer()
    };
    let mut driver = Driver::new(
        Trainer::with_network(network, gate.dataset(), config)?,
        ManualScheduler::new(),
    );
    driver.start();
    let state = driver.run_until_settled(usize::MAX)?;
    report(gate.name(), driver.trainer(), state)
}

fn train_xor_network(base: &TrainingConfig) -> Result<()> {
    let config = TrainingConfig {
        convergence_threshold: 0.2,
        convergence_metric: LossMetric::Total,
        max_restarts: base.max_restarts.max(2),
        updates_per_tick: 10,
        ..base.clone()
    };
    let trainer = Trainer::new(Architecture::hidden(2, 1, 4, 1), Gate::Xor.dataset(), config)?;
    let mut driver = Driver::new(trainer, ManualScheduler::new());
    driver.start();
    let state = driver.run_until_settled(usize::MAX)?;
    report("XOR 2-4-1", driver.trainer(), state)?;

    let path = std::env::temp_dir().join("messabout_xor.json.gz");
    driver.trainer().network().save(&path)?;
    let reloaded = Network::load(&path)?;
    log::info!(
        "reloaded from {}: accuracy {:.0}%",
        path.display(),
        binary_accuracy(&reloaded, driver.trainer().dataset())? * 100.0
    );
    Ok(())
}

fn report(label: &str, trainer: &Trainer, state: TrainerState) -> Result<()> {
    let network = trainer.network();
    let dataset = trainer.dataset();
    log::info!(
        "{label}: {:?} after {} steps ({} restarts), {}",
        state,
        trainer.step(),
        trainer.restarts(),
        network
    );
    let confident = confident_rows(network, dataset)?;
    for (sample, ok) in dataset.iter().zip(confident) {
        let out = network.predict(&sample.input)?;
        log::info!(
            "  {:?} -> {:.3} (target {}){}",
            sample.input,
            out[0],
            sample.target[0],
            if ok { "" } else { "  <- not confident" }
        );
    }
    if let Some(summary) = summarize_losses(trainer.history().iter()) {
        log::info!(
            "  loss min {:.4} mean {:.4} last {:.4}",
            summary.min,
            summary.mean,
            summary.last
        );
    }
    log::info!("\n{}", format_summary_table(&trainer.history().to_vec(), label));
    Ok(())
}
