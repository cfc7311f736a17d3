use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;

/// How unscaled engine output is matched against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Comparison {
    /// Bit equality per cell. Brittle under any reordering of the arithmetic.
    Exact,
    /// A cell matches when `|a - b| <= abs` or `|a - b| <= rel * max(|a|, |b|)`.
    Tolerance { rel: f64, abs: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub comparison: Comparison,
    pub cells: usize,
    pub mismatches: usize,
    pub first_mismatch: Option<(usize, usize)>,
    pub max_abs_error: f64,
    pub max_rel_error: f64,
    /// Reference cells that underflowed to exactly zero.
    pub reference_zero_cells: usize,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        if self.passed { "PASSED" } else { "FAILED" }
    }
}

pub fn compare<T: Precision>(
    engine: ArrayView2<T>,
    reference: ArrayView2<T>,
    comparison: Comparison,
) -> Result<Verdict> {
    if engine.dim() != reference.dim() {
        return Err(LikelihoodError::ShapeMismatch {
            what: "reference output",
            expected: engine.dim(),
            found: reference.dim(),
        });
    }

    let mut mismatches = 0usize;
    let mut first_mismatch = None;
    let mut max_abs_error = 0.0f64;
    let mut max_rel_error = 0.0f64;
    let mut reference_zero_cells = 0usize;

    for ((idx, &e), &r) in engine.indexed_iter().zip(reference.iter()) {
        if r == T::zero() {
            reference_zero_cells += 1;
        }
        let (a, b) = (e.to_f64(), r.to_f64());
        let diff = (a - b).abs();
        let scale = a.abs().max(b.abs());
        let rel = if scale > 0.0 { diff / scale } else { 0.0 };
        max_abs_error = max_abs_error.max(diff);
        max_rel_error = max_rel_error.max(rel);

        let ok = e == r
            || match comparison {
                Comparison::Exact => false,
                Comparison::Tolerance { rel: rel_tol, abs } => diff <= abs || diff <= rel_tol * scale,
            };
        if !ok {
            mismatches += 1;
            if first_mismatch.is_none() {
                first_mismatch = Some(idx);
            }
        }
    }

    Ok(Verdict {
        passed: mismatches == 0,
        comparison,
        cells: engine.len(),
        mismatches,
        first_mismatch,
        max_abs_error,
        max_rel_error,
        reference_zero_cells,
    })
}
