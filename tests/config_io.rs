use pruning_rs::config::{BackendKind, Fill, FloatWidth, RunConfig};
use pruning_rs::io::config::{load_config, save_config};
use pruning_rs::verify::Comparison;
use pruning_rs::{LikelihoodError, ZeroCellPolicy};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before unix epoch")
        .as_nanos();
    path.push(format!("{prefix}_{}_{}.{}", std::process::id(), nanos, ext));
    path
}

#[test]
fn config_json_roundtrip() {
    let path = unique_temp_path("pruning_config", "json");
    let config = RunConfig {
        sites: 33,
        characters: 5,
        nodes: 12,
        precision: FloatWidth::F32,
        threshold: Some(1e-20),
        factor: 64.0,
        max_rescales: Some(9),
        zero_cells: ZeroCellPolicy::Freeze,
        backend: BackendKind::Serial,
        threads: Some(2),
        fill: Fill::Random,
        seed: 7,
        distinct_nodes: 3,
        exact: true,
        progress: false,
        ..RunConfig::default()
    };

    save_config(&path, &config).expect("failed to save config");
    let loaded = load_config(&path).expect("failed to load config");
    assert_eq!(loaded, config);

    let _ = fs::remove_file(path);
}

#[test]
fn partial_config_takes_defaults() {
    let path = unique_temp_path("pruning_config_partial", "json");
    fs::write(&path, r#"{ "sites": 10, "precision": "f32", "zero_cells": "freeze" }"#)
        .expect("failed to write partial config");

    let loaded = load_config(&path).expect("failed to load config");
    assert_eq!(loaded.sites, 10);
    assert_eq!(loaded.precision, FloatWidth::F32);
    assert_eq!(loaded.zero_cells, ZeroCellPolicy::Freeze);
    assert_eq!(loaded.characters, RunConfig::default().characters);
    assert_eq!(loaded.nodes, 150);
    assert_eq!(loaded.factor, 100.0);

    let _ = fs::remove_file(path);
}

#[test]
fn validate_rejects_bad_values() {
    let bad = [
        RunConfig { sites: 0, ..RunConfig::default() },
        RunConfig { characters: 0, ..RunConfig::default() },
        RunConfig { distinct_nodes: 0, ..RunConfig::default() },
        RunConfig { threads: Some(0), ..RunConfig::default() },
        RunConfig { threshold: Some(-1.0), ..RunConfig::default() },
        RunConfig { factor: 1.0, ..RunConfig::default() },
        RunConfig { factor: f64::NAN, ..RunConfig::default() },
        RunConfig { rel_tol: Some(-0.1), ..RunConfig::default() },
        RunConfig { abs_tol: f64::INFINITY, ..RunConfig::default() },
    ];
    for config in bad {
        let err = config.validate().expect_err("config should be rejected");
        assert!(matches!(err, LikelihoodError::InvalidInput { .. }), "{err}");
    }
    RunConfig::default().validate().expect("default config is valid");
}

#[test]
fn per_precision_defaults_apply() {
    let config = RunConfig::default();
    assert_eq!(config.threshold_for::<f64>(), 1e-56);
    assert_eq!(config.threshold_for::<f32>(), 1e-30);

    let f32_policy = config.rescale_policy::<f32>().expect("f32 policy");
    assert!(f32_policy.enabled);
    assert_eq!(f32_policy.threshold, 1e-30f64 as f32);

    match config.comparison::<f32>() {
        Comparison::Tolerance { rel, abs } => {
            assert_eq!(rel, 1e-4);
            assert_eq!(abs, 0.0);
        }
        other => panic!("unexpected comparison {other:?}"),
    }
    let exact = RunConfig { exact: true, ..RunConfig::default() };
    assert_eq!(exact.comparison::<f64>(), Comparison::Exact);
}

#[test]
fn threshold_that_vanishes_in_f32_is_rejected() {
    let config = RunConfig {
        threshold: Some(1e-56),
        ..RunConfig::default()
    };
    assert!(config.rescale_policy::<f64>().is_ok());
    let err = config
        .rescale_policy::<f32>()
        .expect_err("1e-56 rounds to zero in f32");
    assert!(matches!(err, LikelihoodError::InvalidInput { .. }));
}

#[test]
fn disabled_rescaling_ignores_threshold() {
    let config = RunConfig {
        rescale: false,
        threshold: Some(1e-56),
        ..RunConfig::default()
    };
    let policy = config.rescale_policy::<f32>().expect("disabled policy");
    assert!(!policy.enabled);
}
