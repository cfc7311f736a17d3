use tracing::debug;

use crate::accumulator::ScaledAccumulator;
use crate::backend::ComputeBackend;
use crate::error::{LikelihoodError, Result};
use crate::kernel::FoldStats;
use crate::model::{CharacterDistribution, NodeInputs, SubstitutionModel};
use crate::precision::Precision;
use crate::progress::FoldProgress;
use crate::rescale::RescalePolicy;

/// Folds nodes, in order, into an accumulator it owns exclusively.
///
/// Inputs are only borrowed for the duration of each fold. The accumulator is
/// handed back with [`LikelihoodEngine::into_state`] once all nodes are in.
pub struct LikelihoodEngine<T: Precision, B: ComputeBackend<T>> {
    backend: B,
    policy: RescalePolicy<T>,
    state: ScaledAccumulator<T>,
    nodes_folded: usize,
    stats: FoldStats,
}

impl<T: Precision, B: ComputeBackend<T>> LikelihoodEngine<T, B> {
    pub fn new(
        backend: B,
        sites: usize,
        characters: usize,
        policy: RescalePolicy<T>,
    ) -> Result<Self> {
        if sites == 0 || characters == 0 {
            return Err(LikelihoodError::invalid(format!(
                "engine needs sites > 0 and characters > 0, got {sites}x{characters}"
            )));
        }
        let state = backend.allocate(sites, characters)?;
        Ok(Self {
            backend,
            policy,
            state,
            nodes_folded: 0,
            stats: FoldStats::default(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RescalePolicy<T> {
        &self.policy
    }

    pub fn state(&self) -> &ScaledAccumulator<T> {
        &self.state
    }

    pub fn nodes_folded(&self) -> usize {
        self.nodes_folded
    }

    pub fn stats(&self) -> FoldStats {
        self.stats
    }

    /// Folds one node. On error the engine must be discarded.
    pub fn fold_node(
        &mut self,
        distribution: &CharacterDistribution<T>,
        model: &SubstitutionModel<T>,
    ) -> Result<FoldStats> {
        let node = self.nodes_folded;
        let stats = self.backend.fold_node(
            node,
            distribution.view(),
            model.view(),
            &mut self.state,
            &self.policy,
        )?;
        self.nodes_folded += 1;
        self.stats = self.stats.merge(stats);
        Ok(stats)
    }

    /// Folds `nodes` nodes; node `k` (counted over the engine's lifetime)
    /// reads `inputs.distribution_for(k)`.
    pub fn run(
        &mut self,
        inputs: &NodeInputs<T>,
        nodes: usize,
        progress_enabled: bool,
    ) -> Result<FoldStats> {
        let mut progress = FoldProgress::new(nodes, self.backend.name(), progress_enabled);
        for _ in 0..nodes {
            let node = self.nodes_folded;
            let stats = self.fold_node(inputs.distribution_for(node), inputs.model())?;
            if stats.rescales > 0 {
                debug!(node, rescales = stats.rescales, "rescaled cells");
            }
            progress.advance(stats);
        }
        let total = progress.totals();
        progress.finish();
        Ok(total)
    }

    pub fn into_state(self) -> ScaledAccumulator<T> {
        self.state
    }
}
