use ndarray::{Array2, ArrayView2};

use crate::error::{LikelihoodError, Result};
use crate::precision::Precision;

/// Per-site probability mass of a child node over character states.
///
/// Row `s` holds the `characters` entries for site `s`.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterDistribution<T> {
    data: Array2<T>,
}

/// Transition weights, row = parent character, column = child character.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionModel<T> {
    data: Array2<T>,
}

fn validate_entries<T: Precision>(what: &str, data: ArrayView2<T>) -> Result<()> {
    if data.nrows() == 0 || data.ncols() == 0 {
        return Err(LikelihoodError::invalid(format!(
            "{what} must have at least one row and column, got {}x{}",
            data.nrows(),
            data.ncols()
        )));
    }
    for ((r, c), v) in data.indexed_iter() {
        if !v.is_finite() || *v < T::zero() {
            return Err(LikelihoodError::invalid(format!(
                "{what} entry ({r}, {c}) must be finite and non-negative, got {v}"
            )));
        }
    }
    Ok(())
}

impl<T: Precision> CharacterDistribution<T> {
    pub fn new(data: Array2<T>) -> Result<Self> {
        validate_entries("distribution", data.view())?;
        Ok(Self { data })
    }

    pub fn from_vec(sites: usize, characters: usize, values: Vec<T>) -> Result<Self> {
        let found = values.len();
        let data = Array2::from_shape_vec((sites, characters), values).map_err(|_| {
            LikelihoodError::ShapeMismatch {
                what: "distribution",
                expected: (sites, characters),
                found: (found, 1),
            }
        })?;
        Self::new(data)
    }

    /// Every state at every site gets `1 / characters`.
    pub fn uniform(sites: usize, characters: usize) -> Result<Self> {
        if characters == 0 {
            return Err(LikelihoodError::invalid("characters must be > 0"));
        }
        let fill = T::one() / T::from_f64(characters as f64);
        Self::new(Array2::from_elem((sites, characters), fill))
    }

    pub fn sites(&self) -> usize {
        self.data.nrows()
    }

    pub fn characters(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }
}

impl<T: Precision> SubstitutionModel<T> {
    pub fn new(data: Array2<T>) -> Result<Self> {
        if data.nrows() != data.ncols() {
            return Err(LikelihoodError::ShapeMismatch {
                what: "substitution model",
                expected: (data.nrows(), data.nrows()),
                found: data.dim(),
            });
        }
        validate_entries("substitution model", data.view())?;
        Ok(Self { data })
    }

    pub fn from_vec(characters: usize, values: Vec<T>) -> Result<Self> {
        let found = values.len();
        let data = Array2::from_shape_vec((characters, characters), values).map_err(|_| {
            LikelihoodError::ShapeMismatch {
                what: "substitution model",
                expected: (characters, characters),
                found: (found, 1),
            }
        })?;
        Self::new(data)
    }

    pub fn uniform(characters: usize) -> Result<Self> {
        if characters == 0 {
            return Err(LikelihoodError::invalid("characters must be > 0"));
        }
        let fill = T::one() / T::from_f64(characters as f64);
        Self::new(Array2::from_elem((characters, characters), fill))
    }

    pub fn characters(&self) -> usize {
        self.data.nrows()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }
}

/// Model plus the distributions fed to successive nodes.
///
/// Node `k` reads distribution `k % distributions.len()`, so a single
/// distribution reproduces the flat repeated-node loop.
#[derive(Debug, Clone)]
pub struct NodeInputs<T> {
    model: SubstitutionModel<T>,
    distributions: Vec<CharacterDistribution<T>>,
}

impl<T: Precision> NodeInputs<T> {
    pub fn new(
        model: SubstitutionModel<T>,
        distributions: Vec<CharacterDistribution<T>>,
    ) -> Result<Self> {
        let Some(first) = distributions.first() else {
            return Err(LikelihoodError::invalid(
                "at least one node distribution is required",
            ));
        };
        let shape = first.shape();
        if shape.1 != model.characters() {
            return Err(LikelihoodError::ShapeMismatch {
                what: "distribution",
                expected: (shape.0, model.characters()),
                found: shape,
            });
        }
        for d in &distributions[1..] {
            if d.shape() != shape {
                return Err(LikelihoodError::ShapeMismatch {
                    what: "distribution",
                    expected: shape,
                    found: d.shape(),
                });
            }
        }
        Ok(Self {
            model,
            distributions,
        })
    }

    pub fn repeated(
        model: SubstitutionModel<T>,
        distribution: CharacterDistribution<T>,
    ) -> Result<Self> {
        Self::new(model, vec![distribution])
    }

    pub fn model(&self) -> &SubstitutionModel<T> {
        &self.model
    }

    pub fn distributions(&self) -> &[CharacterDistribution<T>] {
        &self.distributions
    }

    pub fn distribution_for(&self, node: usize) -> &CharacterDistribution<T> {
        &self.distributions[node % self.distributions.len()]
    }

    pub fn sites(&self) -> usize {
        self.distributions[0].sites()
    }

    pub fn characters(&self) -> usize {
        self.model.characters()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.sites(), self.characters())
    }
}
