pub mod accumulator;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod kernel;
pub mod model;
pub mod pipeline;
pub mod precision;
pub mod prepare;
pub mod progress;
pub mod reference;
pub mod report;
pub mod rescale;
pub mod verify;

pub use accumulator::ScaledAccumulator;
pub use engine::LikelihoodEngine;
pub use error::LikelihoodError;
pub use model::{CharacterDistribution, NodeInputs, SubstitutionModel};
pub use precision::Precision;
pub use rescale::{RescalePolicy, ZeroCellPolicy};
