use ndarray::{Array2, ArrayViewMut2};

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;

/// Running product of per-node partial likelihoods and its scale ledger.
///
/// `values[(s, p)]` is the scaled product; `scale_counts[(s, p)]` records how
/// many times it was multiplied by the rescale factor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledAccumulator<T> {
    values: Array2<T>,
    scale_counts: Array2<u32>,
}

fn try_filled<E: Clone>(what: &str, sites: usize, characters: usize, fill: E) -> Result<Vec<E>> {
    let n = sites.checked_mul(characters).ok_or_else(|| {
        LikelihoodError::resource(what, format!("{sites}x{characters} cells overflow usize"))
    })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(n)
        .map_err(|e| LikelihoodError::resource(what, e.to_string()))?;
    buf.resize(n, fill);
    Ok(buf)
}

impl<T: Precision> ScaledAccumulator<T> {
    /// All values 1.0, all counts 0. Allocation failure is reported instead
    /// of aborting the process.
    pub fn try_ones(sites: usize, characters: usize) -> Result<Self> {
        let values = try_filled("accumulator", sites, characters, T::one())?;
        let counts = try_filled("scale counts", sites, characters, 0u32)?;
        let shape_err = |what| LikelihoodError::ShapeMismatch {
            what,
            expected: (sites, characters),
            found: (sites, characters),
        };
        Ok(Self {
            values: Array2::from_shape_vec((sites, characters), values)
                .map_err(|_| shape_err("accumulator"))?,
            scale_counts: Array2::from_shape_vec((sites, characters), counts)
                .map_err(|_| shape_err("scale counts"))?,
        })
    }

    pub fn from_parts(values: Array2<T>, scale_counts: Array2<u32>) -> Result<Self> {
        if values.dim() != scale_counts.dim() {
            return Err(LikelihoodError::ShapeMismatch {
                what: "scale counts",
                expected: values.dim(),
                found: scale_counts.dim(),
            });
        }
        Ok(Self {
            values,
            scale_counts,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> &Array2<T> {
        &self.values
    }

    pub fn scale_counts(&self) -> &Array2<u32> {
        &self.scale_counts
    }

    pub(crate) fn parts_mut(&mut self) -> (ArrayViewMut2<'_, T>, ArrayViewMut2<'_, u32>) {
        (self.values.view_mut(), self.scale_counts.view_mut())
    }

    pub fn into_parts(self) -> (Array2<T>, Array2<u32>) {
        (self.values, self.scale_counts)
    }

    pub fn total_rescales(&self) -> u64 {
        self.scale_counts.iter().map(|&c| c as u64).sum()
    }

    pub fn max_scale_count(&self) -> u32 {
        self.scale_counts.iter().copied().max().unwrap_or(0)
    }

    pub fn rescaled_cells(&self) -> usize {
        self.scale_counts.iter().filter(|&&c| c > 0).count()
    }

    /// True magnitude of one cell, using the same repeated division as
    /// [`Self::unscale_in_place`].
    pub fn true_value(&self, site: usize, character: usize, factor: T) -> T {
        let mut v = self.values[(site, character)];
        for _ in 0..self.scale_counts[(site, character)] {
            v /= factor;
        }
        v
    }

    /// Divides every cell back down by `factor` until its count reaches zero.
    pub fn unscale_in_place(&mut self, factor: T) {
        ndarray::Zip::from(&mut self.values)
            .and(&mut self.scale_counts)
            .for_each(|v, count| {
                while *count > 0 {
                    *v /= factor;
                    *count -= 1;
                }
            });
    }

    pub fn unscale(mut self, factor: T) -> Array2<T> {
        self.unscale_in_place(factor);
        self.values
    }
}
