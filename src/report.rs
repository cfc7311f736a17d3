use anyhow::{Context, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::accumulator::ScaledAccumulator;
use crate::config::RunConfig;
use crate::kernel::FoldStats;
use crate::precision::Precision;
use crate::verify::Verdict;

/// One sampled cell, engine output next to the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSample {
    pub site: usize,
    pub character: usize,
    pub engine: f64,
    pub reference: f64,
    /// Scale count before unscaling.
    pub scale_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleSummary {
    pub total_rescales: u64,
    pub rescaled_cells: usize,
    pub max_scale_count: u32,
    pub frozen_cell_steps: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: RunConfig,
    pub precision: String,
    pub backend: String,
    pub sites: usize,
    pub characters: usize,
    pub nodes: usize,
    pub rescaling: bool,
    pub threshold: f64,
    pub factor: f64,
    pub max_rescales_per_step: u32,
    pub engine_seconds: f64,
    pub reference_seconds: f64,
    pub scaling: ScaleSummary,
    pub verdict: Verdict,
    pub samples: Vec<CellSample>,
}

impl ScaleSummary {
    pub fn new<T: Precision>(state: &ScaledAccumulator<T>, stats: FoldStats) -> Self {
        Self {
            total_rescales: state.total_rescales(),
            rescaled_cells: state.rescaled_cells(),
            max_scale_count: state.max_scale_count(),
            frozen_cell_steps: stats.frozen_cells,
        }
    }
}

/// Samples every `stride`-th cell in row-major order.
pub fn sample_cells<T: Precision>(
    engine: ArrayView2<T>,
    reference: ArrayView2<T>,
    scale_counts: ArrayView2<u32>,
    stride: usize,
) -> Vec<CellSample> {
    let characters = engine.ncols();
    let stride = stride.max(1);
    (0..engine.len())
        .step_by(stride)
        .map(|i| {
            let (site, character) = (i / characters, i % characters);
            CellSample {
                site,
                character,
                engine: engine[(site, character)].to_f64(),
                reference: reference[(site, character)].to_f64(),
                scale_count: scale_counts[(site, character)],
            }
        })
        .collect()
}

pub fn write_json_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report dir {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {path:?}"))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)
        .with_context(|| format!("failed to write {path:?}"))?;
    Ok(())
}
