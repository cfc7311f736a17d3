use ndarray::array;
use pruning_rs::backend::SerialBackend;
use pruning_rs::kernel::partial_likelihood;
use pruning_rs::reference;
use pruning_rs::rescale::CellFault;
use pruning_rs::{
    CharacterDistribution, LikelihoodEngine, LikelihoodError, NodeInputs, RescalePolicy,
    SubstitutionModel, ZeroCellPolicy,
};

fn approx_rel(a: f64, b: f64, rel: f64) {
    let scale = a.abs().max(b.abs());
    assert!(
        (a - b).abs() <= rel * scale,
        "expected {a:e} ~= {b:e} within rel={rel}, got diff={:e}",
        (a - b).abs()
    );
}

fn two_state_inputs(p: f64) -> NodeInputs<f64> {
    let model = SubstitutionModel::from_vec(2, vec![1.0; 4]).expect("model init failed");
    let dist = CharacterDistribution::from_vec(1, 2, vec![p, p]).expect("distribution init failed");
    NodeInputs::repeated(model, dist).expect("inputs init failed")
}

fn policy() -> RescalePolicy<f64> {
    RescalePolicy::new(1e-12, 100.0).expect("policy init failed")
}

#[test]
fn partial_likelihood_is_row_dot_product() {
    let dist = array![0.25, 0.5, 0.25];
    let model_row = array![0.1, 0.2, 0.7];
    let sum = partial_likelihood(dist.view(), model_row.view());
    approx_rel(sum, 0.025 + 0.1 + 0.175, 1e-15);
}

#[test]
fn unit_sums_never_rescale_and_stay_exactly_one() {
    let inputs = two_state_inputs(0.5);
    let mut engine =
        LikelihoodEngine::new(SerialBackend, 1, 2, policy()).expect("engine init failed");
    let stats = engine.run(&inputs, 20, false).expect("run failed");
    assert_eq!(stats.rescales, 0);
    assert_eq!(engine.nodes_folded(), 20);

    let state = engine.into_state();
    assert!(state.scale_counts().iter().all(|&c| c == 0));
    let out = state.unscale(100.0);
    assert_eq!(out, array![[1.0, 1.0]]);
}

#[test]
fn small_sums_rescale_once_per_node_after_crossing_threshold() {
    let inputs = two_state_inputs(0.01);
    let mut engine =
        LikelihoodEngine::new(SerialBackend, 1, 2, policy()).expect("engine init failed");

    engine.run(&inputs, 8, false).expect("run failed");
    assert!(engine.state().scale_counts().iter().all(|&c| c == 0));

    engine.run(&inputs, 1, false).expect("run failed");
    assert!(engine.state().scale_counts().iter().all(|&c| c == 1));

    engine.run(&inputs, 2, false).expect("run failed");
    assert!(engine.state().scale_counts().iter().all(|&c| c == 3));

    let state = engine.into_state();
    let expected = 0.02f64.powi(11);
    approx_rel(state.true_value(0, 0, 100.0), expected, 1e-12);
    let out = state.unscale(100.0);
    let golden = reference::propagate(&inputs, 11);
    for (a, b) in out.iter().zip(golden.iter()) {
        approx_rel(*a, *b, 1e-12);
    }
}

#[test]
fn scale_count_steps_match_log_prediction() {
    let inputs = two_state_inputs(0.01);
    let mut engine =
        LikelihoodEngine::new(SerialBackend, 1, 2, policy()).expect("engine init failed");
    let threshold = 1e-12f64;
    for _ in 0..60 {
        let before = engine.state().values()[(0, 0)];
        let count_before = engine.state().scale_counts()[(0, 0)];
        let predicted = if before < threshold {
            ((threshold / before).ln() / 100f64.ln()).ceil() as u32
        } else {
            0
        };
        engine.run(&inputs, 1, false).expect("run failed");
        let count_after = engine.state().scale_counts()[(0, 0)];
        assert_eq!(count_after - count_before, predicted);
    }
}

#[test]
fn zero_sum_aborts_with_underflow_divergence() {
    let inputs = two_state_inputs(0.0);
    let mut engine =
        LikelihoodEngine::new(SerialBackend, 1, 2, policy()).expect("engine init failed");
    let err = engine
        .run(&inputs, 5, false)
        .expect_err("expected zero cell to abort");
    assert_eq!(
        err,
        LikelihoodError::UnderflowDivergence {
            node: 1,
            site: 0,
            character: 0,
            rescales: 0,
        }
    );
}

#[test]
fn zero_sum_freezes_cell_when_requested() {
    let inputs = two_state_inputs(0.0);
    let policy = policy().with_zero_cells(ZeroCellPolicy::Freeze);
    let mut engine = LikelihoodEngine::new(SerialBackend, 1, 2, policy).expect("engine init failed");
    let stats = engine.run(&inputs, 5, false).expect("run failed");
    assert_eq!(stats.frozen_cells, 8);
    assert_eq!(stats.rescales, 0);

    let state = engine.into_state();
    assert!(state.scale_counts().iter().all(|&c| c == 0));
    assert!(state.values().iter().all(|&v| v == 0.0));
}

#[test]
fn rescale_cap_bounds_the_loop() {
    let inputs = two_state_inputs(5e-7);
    let policy = RescalePolicy::new(1e-3, 100.0)
        .expect("policy init failed")
        .with_max_rescales(1);
    let mut engine = LikelihoodEngine::new(SerialBackend, 1, 2, policy).expect("engine init failed");
    let err = engine
        .run(&inputs, 2, false)
        .expect_err("expected the cap to be reached");
    match err {
        LikelihoodError::UnderflowDivergence { node, rescales, .. } => {
            assert_eq!(node, 1);
            assert_eq!(rescales, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn default_cap_lifts_smallest_subnormal() {
    let policy = RescalePolicy::<f64>::new(1e-56, 100.0).expect("policy init failed");
    assert_eq!(policy.max_rescales_per_step, 135);

    let mut value = f64::from_bits(1);
    let mut count = 0u32;
    policy
        .rescale_cell(&mut value, &mut count)
        .expect("subnormal should be liftable within the cap");
    assert!(value >= 1e-56);
    assert!(count <= policy.max_rescales_per_step);
}

#[test]
fn default_cap_saturates_for_factor_barely_above_one() {
    let policy = RescalePolicy::<f64>::new(1e-56, 1.0 + 1e-12).expect("policy init failed");
    assert_eq!(policy.max_rescales_per_step, u32::MAX);

    // a few multiplications by 1 + 1e-12 lift this above the threshold
    let mut value = 1e-56 * (1.0 - 5e-12);
    let mut count = 0u32;
    policy
        .rescale_cell(&mut value, &mut count)
        .expect("a liftable cell must not hit the cap");
    assert!(value >= 1e-56);
    assert!((1..=10).contains(&count), "took {count} rescales");
}

#[test]
fn f32_factor_rounding_to_one_is_rejected() {
    let err = RescalePolicy::<f32>::new(1e-30, 1.0 + 1e-9).expect_err("factor is 1.0 in f32");
    assert!(matches!(err, LikelihoodError::InvalidInput { .. }));
    assert!(RescalePolicy::<f64>::new(1e-30, 1.0 + 1e-9).is_ok());
}

#[test]
fn f32_threshold_overflowing_to_infinity_is_rejected() {
    let err = RescalePolicy::<f32>::new(1e300, 100.0).expect_err("threshold is inf in f32");
    assert!(matches!(err, LikelihoodError::InvalidInput { .. }));
}

#[test]
fn scale_count_overflow_is_reported_not_wrapped() {
    let policy = RescalePolicy::new(1e-3, 100.0).expect("policy init failed");
    let mut value = 1e-5f64;
    let mut count = u32::MAX;
    let fault = policy
        .rescale_cell(&mut value, &mut count)
        .expect_err("count is already saturated");
    assert_eq!(fault, CellFault::CountOverflow(0));
    assert_eq!(count, u32::MAX);
    assert_eq!(value, 1e-5);
}
