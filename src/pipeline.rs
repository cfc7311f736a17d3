use serde::Serialize;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{ComputeBackend, RayonBackend, SerialBackend};
use crate::config::{BackendKind, FloatWidth, RunConfig};
use crate::engine::LikelihoodEngine;
use crate::error::LikelihoodError;
use crate::precision::Precision;
use crate::report::{RunReport, ScaleSummary, sample_cells};
use crate::{prepare, progress, reference, verify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Configure,
    Prepare,
    Acquire,
    Propagate,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Prepare => "prepare",
            Stage::Acquire => "acquire",
            Stage::Propagate => "propagate",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

impl PipelineError {
    /// The engine error behind this failure, if it came from the core. Also
    /// found underneath I/O context added while preparing inputs.
    pub fn likelihood_error(&self) -> Option<&LikelihoodError> {
        self.source.downcast_ref::<LikelihoodError>()
    }
}

fn at<E>(stage: Stage) -> impl FnOnce(E) -> PipelineError
where
    E: Into<anyhow::Error>,
{
    move |e| PipelineError {
        stage,
        source: e.into(),
    }
}

pub fn run(config: &RunConfig) -> Result<RunReport, PipelineError> {
    config.validate().map_err(at(Stage::Configure))?;
    match config.precision {
        FloatWidth::F32 => run_typed::<f32>(config),
        FloatWidth::F64 => run_typed::<f64>(config),
    }
}

fn run_typed<T: Precision>(config: &RunConfig) -> Result<RunReport, PipelineError> {
    match config.backend {
        BackendKind::Serial => run_with::<T, _>(config, SerialBackend),
        BackendKind::Rayon => {
            let backend = RayonBackend::new(config.threads).map_err(at(Stage::Acquire))?;
            info!(threads = backend.threads(), "rayon pool ready");
            run_with::<T, _>(config, backend)
        }
    }
}

/// Runs every stage on an already acquired backend.
pub fn run_with<T, B>(config: &RunConfig, backend: B) -> Result<RunReport, PipelineError>
where
    T: Precision,
    B: ComputeBackend<T>,
{
    let policy = config
        .rescale_policy::<T>()
        .map_err(at(Stage::Configure))?;
    let inputs = prepare::prepare::<T>(config).map_err(at(Stage::Prepare))?;
    let (sites, characters) = inputs.shape();

    let mut engine =
        LikelihoodEngine::new(backend, sites, characters, policy).map_err(at(Stage::Acquire))?;
    let backend_name = engine.backend().name().to_string();
    info!(
        backend = %backend_name,
        precision = T::NAME,
        nodes = config.nodes,
        rescaling = policy.enabled,
        threshold = %policy.threshold,
        factor = %policy.factor,
        "folding nodes"
    );

    let started = Instant::now();
    let stats = engine
        .run(&inputs, config.nodes, config.progress)
        .map_err(at(Stage::Propagate))?;
    let engine_seconds = started.elapsed().as_secs_f64();
    info!(engine_seconds, rescales = stats.rescales, "engine finished");

    let state = engine.into_state();
    let scaling = ScaleSummary::new(&state, stats);
    let scale_counts = state.scale_counts().clone();
    let unscaled = state.unscale(policy.factor);

    let started = Instant::now();
    let pb = config
        .progress
        .then(progress::reference_spinner);
    let golden = reference::propagate(&inputs, config.nodes);
    if let Some(pb) = pb {
        pb.finish_with_message("reference done");
    }
    let reference_seconds = started.elapsed().as_secs_f64();
    info!(reference_seconds, "reference finished");

    let verdict = verify::compare(unscaled.view(), golden.view(), config.comparison::<T>())
        .map_err(at(Stage::Verify))?;
    if verdict.reference_zero_cells > 0 {
        warn!(
            cells = verdict.reference_zero_cells,
            "reference underflowed to zero; lower the node count to compare meaningfully"
        );
    }

    let samples = sample_cells(unscaled.view(), golden.view(), scale_counts.view(), sites);
    for s in &samples {
        debug!(
            site = s.site,
            character = s.character,
            scale_count = s.scale_count,
            "engine {:e}, reference {:e}",
            s.engine,
            s.reference
        );
    }
    info!(
        verdict = verdict.label(),
        mismatches = verdict.mismatches,
        max_rel_error = verdict.max_rel_error,
        "comparison done"
    );

    Ok(RunReport {
        config: config.clone(),
        precision: T::NAME.to_string(),
        backend: backend_name,
        sites,
        characters,
        nodes: config.nodes,
        rescaling: policy.enabled,
        threshold: policy.threshold.to_f64(),
        factor: policy.factor.to_f64(),
        max_rescales_per_step: policy.max_rescales_per_step,
        engine_seconds,
        reference_seconds,
        scaling,
        verdict,
        samples,
    })
}
