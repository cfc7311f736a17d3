use anyhow::{Context, Result, bail};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::{Fill, RunConfig};
use crate::io::matrix::read_matrix;
use crate::model::{CharacterDistribution, NodeInputs, SubstitutionModel};
use crate::precision::Precision;

pub fn new_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Random matrix whose rows each sum to one. Entries stay away from zero so
/// no generated state is impossible.
fn random_stochastic_rows<T: Precision>(rows: usize, cols: usize, rng: &mut SmallRng) -> Array2<T> {
    let mut out = Array2::zeros((rows, cols));
    for mut row in out.rows_mut() {
        let mut total = 0.0f64;
        let raw: Vec<f64> = (0..cols)
            .map(|_| {
                let v = rng.gen_range(0.05..1.0);
                total += v;
                v
            })
            .collect();
        for (slot, v) in row.iter_mut().zip(raw) {
            *slot = T::from_f64(v / total);
        }
    }
    out
}

pub fn random_distribution<T: Precision>(
    sites: usize,
    characters: usize,
    rng: &mut SmallRng,
) -> Result<CharacterDistribution<T>> {
    Ok(CharacterDistribution::new(random_stochastic_rows(
        sites, characters, rng,
    ))?)
}

pub fn random_model<T: Precision>(
    characters: usize,
    rng: &mut SmallRng,
) -> Result<SubstitutionModel<T>> {
    Ok(SubstitutionModel::new(random_stochastic_rows(
        characters, characters, rng,
    ))?)
}

fn cast_matrix<T: Precision>(m: Array2<f64>) -> Array2<T> {
    m.mapv(T::from_f64)
}

/// Builds the model and node distributions described by `config`.
///
/// Files take precedence over generated fills; their shapes must agree with
/// `config.sites` and `config.characters`.
pub fn prepare<T: Precision>(config: &RunConfig) -> Result<NodeInputs<T>> {
    let mut rng = new_rng(config.seed);
    let (sites, characters) = (config.sites, config.characters);

    let model = match &config.model_path {
        Some(path) => {
            let m = read_matrix(path)?;
            if m.dim() != (characters, characters) {
                bail!(
                    "model file {path:?} is {}x{}, expected {characters}x{characters}",
                    m.nrows(),
                    m.ncols()
                );
            }
            SubstitutionModel::new(cast_matrix(m))
                .with_context(|| format!("invalid model in {path:?}"))?
        }
        None => match config.fill {
            Fill::Uniform => SubstitutionModel::uniform(characters)?,
            Fill::Random => random_model(characters, &mut rng)?,
        },
    };

    let distributions = match &config.distribution_path {
        Some(path) => {
            let d = read_matrix(path)?;
            if d.dim() != (sites, characters) {
                bail!(
                    "distribution file {path:?} is {}x{}, expected {sites}x{characters}",
                    d.nrows(),
                    d.ncols()
                );
            }
            vec![
                CharacterDistribution::new(cast_matrix(d))
                    .with_context(|| format!("invalid distribution in {path:?}"))?,
            ]
        }
        None => match config.fill {
            Fill::Uniform => vec![CharacterDistribution::uniform(sites, characters)?],
            Fill::Random => (0..config.distinct_nodes)
                .map(|_| random_distribution(sites, characters, &mut rng))
                .collect::<Result<Vec<_>>>()?,
        },
    };

    info!(
        sites,
        characters,
        distinct = distributions.len(),
        precision = T::NAME,
        "inputs prepared"
    );
    Ok(NodeInputs::new(model, distributions)?)
}
