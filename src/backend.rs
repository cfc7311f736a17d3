use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;

use crate::accumulator::ScaledAccumulator;
use crate::error::{LikelihoodError, Result};
use crate::kernel::{FoldStats, check_node_shapes, fold_site};
use crate::precision::Precision;
use crate::rescale::RescalePolicy;

pub trait ComputeBackend<T: Precision> {
    fn name(&self) -> &'static str;

    /// Accumulator at 1.0 with zero scale counts.
    fn allocate(&self, sites: usize, characters: usize) -> Result<ScaledAccumulator<T>> {
        ScaledAccumulator::try_ones(sites, characters)
    }

    /// Folds one node into `state`, touching every cell exactly once.
    fn fold_node(
        &self,
        node: usize,
        distribution: ArrayView2<T>,
        model: ArrayView2<T>,
        state: &mut ScaledAccumulator<T>,
        policy: &RescalePolicy<T>,
    ) -> Result<FoldStats>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl<T: Precision> ComputeBackend<T> for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn fold_node(
        &self,
        node: usize,
        distribution: ArrayView2<T>,
        model: ArrayView2<T>,
        state: &mut ScaledAccumulator<T>,
        policy: &RescalePolicy<T>,
    ) -> Result<FoldStats> {
        check_node_shapes(node, distribution, model, state.shape())?;
        let (mut values, mut counts) = state.parts_mut();
        values
            .axis_iter_mut(Axis(0))
            .zip(counts.axis_iter_mut(Axis(0)))
            .zip(distribution.axis_iter(Axis(0)))
            .enumerate()
            .try_fold(FoldStats::default(), |acc, (site, ((acc_row, count_row), site_row))| {
                let stats = fold_site(node, site, site_row, model, acc_row, count_row, policy)?;
                Ok(acc.merge(stats))
            })
    }
}

fn min_sites_per_task() -> usize {
    // PRUNING_MIN_SITES_PER_TASK=1 lets rayon split down to single sites.
    const DEFAULT_SITES: usize = 16;
    std::env::var("PRUNING_MIN_SITES_PER_TASK")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_SITES)
}

/// Sites are split across a private rayon pool; each task owns whole
/// accumulator rows.
pub struct RayonBackend {
    pool: rayon::ThreadPool,
    min_sites_per_task: usize,
}

impl RayonBackend {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("pruning-{i}"));
        if let Some(n) = threads {
            if n == 0 {
                return Err(LikelihoodError::invalid("thread count must be >= 1"));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| LikelihoodError::resource("rayon thread pool", e.to_string()))?;
        Ok(Self {
            pool,
            min_sites_per_task: min_sites_per_task(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl<T: Precision> ComputeBackend<T> for RayonBackend {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn fold_node(
        &self,
        node: usize,
        distribution: ArrayView2<T>,
        model: ArrayView2<T>,
        state: &mut ScaledAccumulator<T>,
        policy: &RescalePolicy<T>,
    ) -> Result<FoldStats> {
        check_node_shapes(node, distribution, model, state.shape())?;
        let (mut values, mut counts) = state.parts_mut();
        let min_len = self.min_sites_per_task;
        self.pool.install(|| {
            values
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(counts.axis_iter_mut(Axis(0)))
                .zip(distribution.axis_iter(Axis(0)))
                .enumerate()
                .with_min_len(min_len)
                .map(|(site, ((acc_row, count_row), site_row))| {
                    fold_site(node, site, site_row, model, acc_row, count_row, policy)
                })
                .try_reduce(FoldStats::default, |a, b| Ok(a.merge(b)))
        })
    }
}
