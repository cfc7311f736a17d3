use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;
use crate::rescale::{RescalePolicy, ZeroCellPolicy};
use crate::verify::Comparison;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FloatWidth {
    F32,
    #[default]
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Serial,
    #[default]
    Rayon,
}

/// How generated inputs are filled when no file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    /// Every entry `1 / characters`.
    #[default]
    Uniform,
    /// Seeded random rows, each normalized to sum to one.
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sites: usize,
    pub characters: usize,
    pub nodes: usize,
    pub precision: FloatWidth,
    /// Falls back to the precision's default when unset.
    pub threshold: Option<f64>,
    pub factor: f64,
    pub max_rescales: Option<u32>,
    pub zero_cells: ZeroCellPolicy,
    pub rescale: bool,
    pub backend: BackendKind,
    pub threads: Option<usize>,
    pub fill: Fill,
    pub seed: u64,
    pub distinct_nodes: usize,
    pub model_path: Option<PathBuf>,
    pub distribution_path: Option<PathBuf>,
    pub exact: bool,
    pub rel_tol: Option<f64>,
    pub abs_tol: f64,
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sites: 1024,
            characters: 64,
            nodes: 150,
            precision: FloatWidth::F64,
            threshold: None,
            factor: 100.0,
            max_rescales: None,
            zero_cells: ZeroCellPolicy::Abort,
            rescale: true,
            backend: BackendKind::Rayon,
            threads: None,
            fill: Fill::Uniform,
            seed: 42,
            distinct_nodes: 1,
            model_path: None,
            distribution_path: None,
            exact: false,
            rel_tol: None,
            abs_tol: 0.0,
            progress: true,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sites == 0 {
            return Err(LikelihoodError::invalid("sites must be > 0"));
        }
        if self.characters == 0 {
            return Err(LikelihoodError::invalid("characters must be > 0"));
        }
        if self.distinct_nodes == 0 {
            return Err(LikelihoodError::invalid("distinct_nodes must be > 0"));
        }
        if let Some(0) = self.threads {
            return Err(LikelihoodError::invalid("threads must be >= 1"));
        }
        if let Some(t) = self.threshold
            && !(t.is_finite() && t > 0.0)
        {
            return Err(LikelihoodError::invalid(format!(
                "threshold must be positive and finite, got {t}"
            )));
        }
        if !(self.factor.is_finite() && self.factor > 1.0) {
            return Err(LikelihoodError::invalid(format!(
                "factor must be finite and > 1, got {}",
                self.factor
            )));
        }
        if let Some(rel) = self.rel_tol
            && !(rel.is_finite() && rel >= 0.0)
        {
            return Err(LikelihoodError::invalid(format!(
                "rel_tol must be finite and >= 0, got {rel}"
            )));
        }
        if !(self.abs_tol.is_finite() && self.abs_tol >= 0.0) {
            return Err(LikelihoodError::invalid(format!(
                "abs_tol must be finite and >= 0, got {}",
                self.abs_tol
            )));
        }
        Ok(())
    }

    pub fn threshold_for<T: Precision>(&self) -> f64 {
        self.threshold.unwrap_or(T::DEFAULT_THRESHOLD)
    }

    pub fn rescale_policy<T: Precision>(&self) -> Result<RescalePolicy<T>> {
        if !self.rescale {
            return Ok(RescalePolicy::disabled());
        }
        let mut policy = RescalePolicy::new(self.threshold_for::<T>(), self.factor)?
            .with_zero_cells(self.zero_cells);
        if let Some(cap) = self.max_rescales {
            policy = policy.with_max_rescales(cap);
        }
        Ok(policy)
    }

    pub fn comparison<T: Precision>(&self) -> Comparison {
        if self.exact {
            Comparison::Exact
        } else {
            Comparison::Tolerance {
                rel: self.rel_tol.unwrap_or(T::DEFAULT_REL_TOL),
                abs: self.abs_tol,
            }
        }
    }
}
