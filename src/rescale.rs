use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;

/// What to do with a cell that has collapsed to exactly zero.
///
/// A zero can never be lifted above the threshold, so the rescale loop is not
/// allowed to run on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroCellPolicy {
    /// Fail the run with `UnderflowDivergence`.
    #[default]
    Abort,
    /// Leave the cell at zero with its scale count untouched.
    Freeze,
}

/// Before a node is multiplied into a cell, the cell is multiplied by
/// `factor` until it is no longer below `threshold`, bumping its scale count
/// each time. The true value is `stored / factor^count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescalePolicy<T> {
    pub threshold: T,
    pub factor: T,
    pub max_rescales_per_step: u32,
    pub zero_cells: ZeroCellPolicy,
    pub enabled: bool,
}

/// Why a cell could not be brought above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFault {
    Dead,
    CapReached(u32),
    /// The cell's scale count would exceed `u32::MAX`.
    CountOverflow(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRescale {
    Rescaled(u32),
    Frozen,
}

impl<T: Precision> RescalePolicy<T> {
    pub fn new(threshold: f64, factor: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(LikelihoodError::invalid(format!(
                "underflow threshold must be positive and finite, got {threshold}"
            )));
        }
        if !(factor.is_finite() && factor > 1.0) {
            return Err(LikelihoodError::invalid(format!(
                "rescale factor must be finite and > 1, got {factor}"
            )));
        }
        let t = T::from_f64(threshold);
        if t <= T::zero() {
            return Err(LikelihoodError::invalid(format!(
                "underflow threshold {threshold:e} rounds to zero in {}",
                T::NAME
            )));
        }
        if !t.is_finite() {
            return Err(LikelihoodError::invalid(format!(
                "underflow threshold {threshold:e} overflows {}",
                T::NAME
            )));
        }
        let f = T::from_f64(factor);
        if !f.is_finite() {
            return Err(LikelihoodError::invalid(format!(
                "rescale factor {factor:e} overflows {}",
                T::NAME
            )));
        }
        if f <= T::one() {
            return Err(LikelihoodError::invalid(format!(
                "rescale factor {factor} rounds to 1 in {}",
                T::NAME
            )));
        }
        Ok(Self {
            threshold: t,
            factor: f,
            max_rescales_per_step: Self::default_max_rescales(t, f),
            zero_cells: ZeroCellPolicy::default(),
            enabled: true,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(T::DEFAULT_THRESHOLD, 100.0)
    }

    /// Plain recurrence, no rescaling at all.
    pub fn disabled() -> Self {
        Self {
            threshold: T::zero(),
            factor: T::one(),
            max_rescales_per_step: 0,
            zero_cells: ZeroCellPolicy::Freeze,
            enabled: false,
        }
    }

    pub fn with_max_rescales(mut self, cap: u32) -> Self {
        self.max_rescales_per_step = cap;
        self
    }

    pub fn with_zero_cells(mut self, policy: ZeroCellPolicy) -> Self {
        self.zero_cells = policy;
        self
    }

    /// Rescales needed to lift the smallest positive subnormal above
    /// `threshold`, plus one. Saturates at `u32::MAX` for factors barely
    /// above 1.
    pub fn default_max_rescales(threshold: T, factor: T) -> u32 {
        let span = threshold.to_f64().ln() - T::SMALLEST_POSITIVE.to_f64().ln();
        let steps = (span.max(0.0) / factor.to_f64().ln()).ceil();
        // float-to-int `as` saturates, NaN maps to 0
        (steps as u32).saturating_add(1)
    }

    /// Runs the pre-multiply rescale loop on one cell.
    #[inline]
    pub fn rescale_cell(
        &self,
        value: &mut T,
        count: &mut u32,
    ) -> std::result::Result<CellRescale, CellFault> {
        if !self.enabled {
            return Ok(CellRescale::Rescaled(0));
        }
        if *value == T::zero() {
            return match self.zero_cells {
                ZeroCellPolicy::Abort => Err(CellFault::Dead),
                ZeroCellPolicy::Freeze => Ok(CellRescale::Frozen),
            };
        }
        let mut rescales = 0u32;
        while *value < self.threshold {
            if rescales == self.max_rescales_per_step {
                return Err(CellFault::CapReached(rescales));
            }
            let next = count
                .checked_add(1)
                .ok_or(CellFault::CountOverflow(rescales))?;
            *value *= self.factor;
            *count = next;
            rescales += 1;
        }
        Ok(CellRescale::Rescaled(rescales))
    }
}
