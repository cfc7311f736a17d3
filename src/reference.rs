use ndarray::Array2;

use crate::model::NodeInputs;
use crate::precision::Precision;

/// Plain host recurrence with no rescaling, for cross-checking the engine.
///
/// Written with direct index loops and kept independent of the kernel module.
/// Underflows once the running product leaves the precision's range.
pub fn propagate<T: Precision>(inputs: &NodeInputs<T>, nodes: usize) -> Array2<T> {
    let (sites, characters) = inputs.shape();
    let model = inputs.model().view();
    let mut out = Array2::from_elem((sites, characters), T::one());
    for node in 0..nodes {
        let dist = inputs.distribution_for(node).view();
        for site in 0..sites {
            for parent in 0..characters {
                let mut sum = T::zero();
                for child in 0..characters {
                    sum += dist[(site, child)] * model[(parent, child)];
                }
                out[(site, parent)] *= sum;
            }
        }
    }
    out
}
