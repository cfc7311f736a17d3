use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1};

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;
use crate::rescale::{CellFault, CellRescale, RescalePolicy};

/// Counters for one or more node folds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub cells: u64,
    pub rescales: u64,
    pub frozen_cells: u64,
}

impl FoldStats {
    pub fn merge(self, other: Self) -> Self {
        Self {
            cells: self.cells + other.cells,
            rescales: self.rescales + other.rescales,
            frozen_cells: self.frozen_cells + other.frozen_cells,
        }
    }
}

/// `sum(s, p) = Σ_c distribution[s][c] * model[p][c]`, summed left to right.
#[inline]
pub fn partial_likelihood<T: Precision>(site_row: ArrayView1<T>, model_row: ArrayView1<T>) -> T {
    let mut sum = T::zero();
    for (&d, &m) in site_row.iter().zip(model_row.iter()) {
        sum += d * m;
    }
    sum
}

/// Folds one site of one node into its accumulator row.
///
/// Only `acc_row` and `count_row` are written, so distinct sites can be
/// folded concurrently.
pub fn fold_site<T: Precision>(
    node: usize,
    site: usize,
    site_row: ArrayView1<T>,
    model: ArrayView2<T>,
    mut acc_row: ArrayViewMut1<T>,
    mut count_row: ArrayViewMut1<u32>,
    policy: &RescalePolicy<T>,
) -> Result<FoldStats> {
    let mut stats = FoldStats::default();
    for (parent, (acc, count)) in acc_row.iter_mut().zip(count_row.iter_mut()).enumerate() {
        let sum = partial_likelihood(site_row, model.row(parent));
        match policy.rescale_cell(acc, count) {
            Ok(CellRescale::Rescaled(n)) => stats.rescales += n as u64,
            Ok(CellRescale::Frozen) => stats.frozen_cells += 1,
            Err(fault) => {
                let rescales = match fault {
                    CellFault::Dead => 0,
                    CellFault::CapReached(n) | CellFault::CountOverflow(n) => n,
                };
                return Err(LikelihoodError::UnderflowDivergence {
                    node,
                    site,
                    character: parent,
                    rescales,
                });
            }
        }
        *acc *= sum;
        stats.cells += 1;
    }
    Ok(stats)
}

/// Argument checks shared by every backend before a node is launched.
pub fn check_node_shapes<T>(
    node: usize,
    distribution: ArrayView2<T>,
    model: ArrayView2<T>,
    acc_shape: (usize, usize),
) -> Result<()> {
    let characters = model.nrows();
    if model.ncols() != characters {
        return Err(LikelihoodError::kernel(
            node,
            format!("model is {}x{}, expected square", model.nrows(), model.ncols()),
        ));
    }
    if distribution.dim() != acc_shape {
        return Err(LikelihoodError::kernel(
            node,
            format!(
                "distribution is {:?}, accumulator is {:?}",
                distribution.dim(),
                acc_shape
            ),
        ));
    }
    if acc_shape.1 != characters {
        return Err(LikelihoodError::kernel(
            node,
            format!(
                "accumulator has {} characters, model has {characters}",
                acc_shape.1
            ),
        ));
    }
    Ok(())
}
