use messabout_nn::{
    confident_rows, Architecture, Gate, LossKind, LossMetric, Network, Trainer, TrainerState,
    TrainingConfig,
};

fn run_to_end(trainer: &mut Trainer) -> TrainerState {
    let ticket = trainer.start();
    while trainer.tick(ticket).unwrap() == messabout_nn::TickOutcome::Continue {}
    trainer.state()
}

#[test]
fn hidden_layer_learns_xor() {
    for seed in [1, 2, 3] {
        let config = TrainingConfig {
            convergence_threshold: 0.2,
            convergence_metric: LossMetric::Total,
            step_cap: 2000,
            max_restarts: 0,
            updates_per_tick: 10,
            seed,
            ..TrainingConfig::default()
        };
        let mut trainer =
            Trainer::new(Architecture::hidden(2, 1, 4, 1), Gate::Xor.dataset(), config).unwrap();
        assert_eq!(run_to_end(&mut trainer), TrainerState::Converged, "seed {seed}");
        assert_eq!(trainer.restarts(), 0, "seed {seed}");
        assert!(trainer.step() < 2000, "seed {seed}");

        let data = Gate::Xor.dataset();
        let loss = trainer
            .network()
            .total_loss(&data, LossKind::BinaryCrossEntropy)
            .unwrap();
        assert!(loss < 0.2, "seed {seed}: total loss {loss}");
        assert_eq!(confident_rows(trainer.network(), &data).unwrap(), vec![true; 4]);
    }
}

#[test]
fn single_neuron_learns_separable_gates() {
    for gate in [Gate::And, Gate::Or, Gate::Nand] {
        let (wa, wb, bias) = gate.starting_weights().unwrap();
        let config = TrainingConfig {
            convergence_threshold: 0.5,
            convergence_metric: LossMetric::Total,
            step_cap: 2000,
            ..TrainingConfig::default()
        };
        let net = Network::single_neuron(vec![wa, wb], bias).unwrap();
        let mut trainer = Trainer::with_network(net, gate.dataset(), config).unwrap();
        assert_eq!(run_to_end(&mut trainer), TrainerState::Converged, "{}", gate.name());
        let loss = trainer
            .network()
            .total_loss(&gate.dataset(), LossKind::BinaryCrossEntropy)
            .unwrap();
        assert!(loss < 0.5, "{}: {loss}", gate.name());
    }
}

#[test]
fn no_single_neuron_fits_xor() {
    let data = Gate::Xor.dataset();
    let grid: Vec<f64> = (0..=40).map(|i| -10.0 + 0.5 * i as f64).collect();
    let mut best = f64::INFINITY;
    for &wa in &grid {
        for &wb in &grid {
            for &bias in &grid {
                let net = Network::single_neuron(vec![wa, wb], bias).unwrap();
                best = best.min(net.total_loss(&data, LossKind::BinaryCrossEntropy).unwrap());
            }
        }
    }
    assert!(best > 0.5, "best XOR loss {best}");
    // the optimum is the flat 0.5 guess on every row
    assert!((best - 4.0 * std::f64::consts::LN_2).abs() < 1e-9);
}

#[test]
fn single_neuron_trainer_gives_up_on_xor() {
    let config = TrainingConfig {
        step_cap: 300,
        ..TrainingConfig::neuron_optimizer()
    };
    let net = Network::single_neuron(vec![0.3, -0.2], 0.1).unwrap();
    let mut trainer = Trainer::with_network(net, Gate::Xor.dataset(), config).unwrap();
    assert_eq!(run_to_end(&mut trainer), TrainerState::StepLimitReached);
    assert_eq!(trainer.step(), 300);
    assert!(trainer.last_loss().unwrap() > 0.5);
}
