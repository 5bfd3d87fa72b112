use epicell::{
    Compartment, Engine, Model, NeighborStrategy, Params, Status,
    compartmental::{self, OdeParams},
    config::Config,
};

const WIDTH: usize = 20;
const HEIGHT: usize = 20;
const N_INFECTED: usize = 10;
const N_RUNS: u64 = 40;

fn mean(vals: &[f64]) -> f64 {
    vals.iter().sum::<f64>() / vals.len() as f64
}

#[test]
fn well_mixed_grid_reproduces_compartmental_model() {
    let n_cells = WIDTH * HEIGHT;
    let ode = OdeParams::new(Model::Sir, n_cells as f64, 2.2, 2.9)
        .with_initial_infected(N_INFECTED as f64);
    let traj = compartmental::integrate(&ode, 300).expect("failed to integrate model");
    let ode_peak = compartmental::peak_infected_fraction(&traj);
    let ode_attack = compartmental::attack_rate(&traj);

    let contacts = NeighborStrategy::All.neighbor_count(WIDTH, HEIGHT);
    let beta = Params::beta_from_rate(ode.beta(), contacts);
    let contents = format!(
        "[model]\n\
         variant = \"SIR\"\n\
         beta = {beta}\n\
         infectious_period = 2.9\n\
         \n\
         [grid]\n\
         width = {WIDTH}\n\
         height = {HEIGHT}\n\
         neighbors = {{ kind = \"all\" }}\n\
         \n\
         [init]\n\
         random_infected = {N_INFECTED}\n"
    );
    let cfg = Config::from_toml(&contents).expect("failed to parse config");

    let mut peaks = Vec::new();
    let mut attacks = Vec::new();
    for seed in 0..N_RUNS {
        let mut engine = Engine::from_seed(seed).with_max_steps(5_000);
        let mut grid = cfg
            .build_grid(engine.rng_mut())
            .expect("failed to build grid");
        let history = engine.run(&mut grid).expect("failed to run simulation");
        assert_eq!(history.status(), Status::Extinct);

        let (peak, _) = history.peak(Compartment::Infected);
        peaks.push(peak as f64 / n_cells as f64);
        attacks.push(history.attack_rate());
    }

    let ca_peak = mean(&peaks);
    let ca_attack = mean(&attacks);
    assert!(
        (ca_peak - ode_peak).abs() < 0.05,
        "peak infected fraction: cellular {ca_peak:.4}, compartmental {ode_peak:.4}"
    );
    assert!(
        (ca_attack - ode_attack).abs() < 0.05,
        "attack rate: cellular {ca_attack:.4}, compartmental {ode_attack:.4}"
    );
}

#[test]
fn spatial_contacts_slow_the_outbreak_down() {
    // Same per-infected contact budget, local instead of well mixed.
    let params = Params::new(Model::Sir, 0.15, 4.0);
    let run = |strategy: NeighborStrategy, seed: u64| {
        let mut grid = epicell::Grid::new(25, 25, params.clone(), strategy)
            .expect("failed to construct grid");
        grid.infect(12, 12).expect("failed to seed grid");
        let history = Engine::from_seed(seed)
            .with_max_steps(5_000)
            .run(&mut grid)
            .expect("failed to run simulation");
        history.peak(Compartment::Infected).0
    };

    let local: usize = (0..10).map(|seed| run(NeighborStrategy::Radius { radius: 1 }, seed)).sum();
    let mixed: usize = (0..10).map(|seed| run(NeighborStrategy::Random { count: 8 }, seed)).sum();
    assert!(local < mixed, "radius peak sum {local}, random peak sum {mixed}");
}
