use csans::{
    CancelToken, Catalog, Engine, Halt, Params, RateRefresh, Rates, Sampler, SimError, SimRng,
    State,
    event::EventKind,
    sampler::uniform_timepoints,
};
use rand::SeedableRng;

fn params() -> Params {
    Params::new()
        .with("b_T", 0.03)
        .with("d_E", 0.03)
        .with("lambda_E", 0.001)
        .with("lambda_T", 0.001)
        .with("mu_E", 0.01)
        .with("mu_T", 0.01)
        .with("lambda_ET", 0.01)
        .with("p_E|T", 0.01)
        .with("p_E|DT", 0.8)
        .with("p_ED|T", 0.8)
        .with("M", 2.0)
        .with("d_EDT", 1.0)
        .with("d_ET", 1.0)
}

fn zero_params() -> Params {
    params().names().map(|name| (name.to_string(), 0.0)).collect()
}

fn initial_state(e_receptors: usize, t_receptors: usize) -> State {
    let mut state = State::empty(e_receptors, t_receptors);
    state.set_free_binder(100.0);
    state.set_effector(0, 20.0).unwrap();
    state.set_target(0, 20.0).unwrap();
    state
}

fn is_whole_and_non_negative(state: &State) -> bool {
    let (e, t) = state.shape();
    let mut counts = vec![state.free_binder()];
    counts.extend_from_slice(state.effectors_by_occupancy());
    counts.extend_from_slice(state.targets_by_occupancy());
    for i in 0..e {
        for j in 0..t {
            counts.push(state.trimer(i, j).unwrap());
            counts.push(state.dimer(i, j).unwrap());
        }
    }
    counts
        .iter()
        .all(|&count| count >= 0.0 && count.fract() == 0.0)
}

#[test]
fn counts_stay_whole_and_non_negative() {
    let catalog = Catalog::new(3, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let engine = Engine::new(&catalog, &rates);

    for seed in 0..8 {
        let mut rng = SimRng::seed_from_u64(seed);
        let mut state = initial_state(3, 2);
        let mut time = 0.0;
        for _ in 0..20 {
            engine.advance(&mut state, time, time + 5.0, &mut rng).unwrap();
            time += 5.0;
            assert!(is_whole_and_non_negative(&state), "{state:?}");
            assert!(state.is_coherent());
        }
    }
}

#[test]
fn binder_is_conserved_without_internalization() {
    let params = params().with("mu_E", 0.0).with("mu_T", 0.0);
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut rng = SimRng::seed_from_u64(3);
    let mut state = initial_state(2, 2);
    let total = state.total_d();
    let summary = engine.run(&mut state, 100.0, &mut rng).unwrap();
    assert!(summary.accepted > 0);
    assert_eq!(state.total_d(), total);
}

#[test]
fn internalization_only_consumes_binder() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut rng = SimRng::seed_from_u64(11);
    let mut state = initial_state(2, 2);
    let mut total = state.total_d();
    let mut time = 0.0;
    for _ in 0..50 {
        engine.advance(&mut state, time, time + 2.0, &mut rng).unwrap();
        time += 2.0;
        assert!(state.total_d() <= total);
        total = state.total_d();
    }
}

#[test]
fn each_internalization_consumes_one_binder() {
    let params = zero_params().with("mu_E", 0.5).with("mu_T", 0.5);
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut state = State::empty(2, 2);
    state.set_free_binder(7.0);
    state.set_effector(2, 3.0).unwrap();
    state.set_effector(1, 2.0).unwrap();
    state.set_target(1, 4.0).unwrap();
    let total = state.total_d();

    let mut rng = SimRng::seed_from_u64(8);
    let summary = engine.run(&mut state, 1.0e4, &mut rng).unwrap();
    assert_eq!(summary.halt, Halt::Absorbed);
    assert_eq!(summary.accepted, 12);
    assert_eq!(state.total_d(), total - summary.accepted as f64);
    assert_eq!(state.total_d(), 7.0);
    assert_eq!(state.effector(0).unwrap(), 5.0);
    assert_eq!(state.target(0).unwrap(), 4.0);
}

#[test]
fn zero_duration_leaves_state_unchanged() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut rng = SimRng::seed_from_u64(0);
    let mut state = initial_state(2, 2);
    let summary = engine.run(&mut state, 0.0, &mut rng).unwrap();
    assert_eq!(summary.halt, Halt::Horizon);
    assert_eq!(summary.steps, 1);
    assert_eq!(summary.accepted, 0);
    assert_eq!(state, initial_state(2, 2));
}

#[test]
fn zero_rates_absorb_immediately() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&zero_params()).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut rng = SimRng::seed_from_u64(0);
    let mut state = initial_state(2, 2);
    let summary = engine.run(&mut state, 10.0, &mut rng).unwrap();
    assert_eq!(summary.halt, Halt::Absorbed);
    assert_eq!(summary.steps, 1);
    assert_eq!(state, initial_state(2, 2));
}

#[test]
fn effectors_die_out_while_binder_stays_free() {
    let params = zero_params().with("d_E", 1.0);
    let catalog = Catalog::new(1, 1);
    let rates = Rates::from_params(&params).unwrap();
    let engine = Engine::new(&catalog, &rates);

    let mut state = State::empty(1, 1);
    state.set_free_binder(10.0);
    state.set_effector(0, 5.0).unwrap();
    state.set_target(0, 5.0).unwrap();

    for event in catalog.events() {
        let rate = event.max_rate(&state, &rates).unwrap();
        if event.kind() == EventKind::EffectorDeath {
            continue;
        }
        assert_eq!(rate, 0.0, "{event:?}");
    }

    let mut rng = SimRng::seed_from_u64(5);
    let summary = engine.run(&mut state, 1000.0, &mut rng).unwrap();
    assert_eq!(summary.halt, Halt::Absorbed);
    assert_eq!(summary.accepted, 5);
    assert_eq!(state.effectors(), 0.0);
    assert_eq!(state.targets(), 5.0);
    assert_eq!(state.free_binder(), 10.0);
}

#[test]
fn refresh_modes_agree() {
    let catalog = Catalog::new(2, 3);
    let rates = Rates::from_params(&params()).unwrap();

    let run = |refresh| {
        let engine = Engine::new(&catalog, &rates).with_refresh(refresh);
        let mut rng = SimRng::seed_from_u64(23);
        let mut state = initial_state(2, 3);
        let summary = engine.run(&mut state, 50.0, &mut rng).unwrap();
        (summary, state)
    };

    assert_eq!(run(RateRefresh::Incremental), run(RateRefresh::Full));
}

#[test]
fn step_budget_is_enforced() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let engine = Engine::new(&catalog, &rates).with_max_steps(Some(10));

    let mut rng = SimRng::seed_from_u64(1);
    let mut state = initial_state(2, 2);
    let result = engine.run(&mut state, 1.0e6, &mut rng);
    assert_eq!(result, Err(SimError::StepBudgetExceeded(10)));
}

#[test]
fn cancelled_runs_stop() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let cancel = CancelToken::new();
    let engine = Engine::new(&catalog, &rates).with_cancel_token(cancel.clone());
    cancel.cancel();

    let mut rng = SimRng::seed_from_u64(1);
    let mut state = initial_state(2, 2);
    assert_eq!(
        engine.run(&mut state, 10.0, &mut rng),
        Err(SimError::Cancelled)
    );
}

#[test]
fn sampled_trajectories_start_at_initial_state() {
    let catalog = Catalog::new(2, 2);
    let rates = Rates::from_params(&params()).unwrap();
    let sampler =
        Sampler::new(Engine::new(&catalog, &rates), uniform_timepoints(10.0, 5), 99).unwrap();

    let initial = initial_state(2, 2);
    let trajectories = sampler.sample(&initial, 8).unwrap();
    assert_eq!(trajectories.len(), 8);
    for trajectory in &trajectories {
        assert_eq!(trajectory.snapshots.len(), 6);
        assert_eq!(trajectory.at(0.0), Some(&initial));
        let final_state = &trajectory.last().unwrap().state;
        assert!(is_whole_and_non_negative(final_state));
        assert!(final_state.total_d() <= initial.total_d());
    }

    assert_eq!(sampler.sample(&initial, 8).unwrap(), trajectories);
    assert_eq!(sampler.sample_replicate(&initial, 5).unwrap(), trajectories[5]);
}
