use thiserror::Error;

/// Every variant is fatal to a run; a partially folded state is discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LikelihoodError {
    /// Backend or memory could not be acquired.
    #[error("resource unavailable ({what}): {reason}")]
    ResourceUnavailable { what: String, reason: String },

    /// A node step could not be executed (bad arguments, backend fault).
    #[error("kernel execution failed at node {node}: {reason}")]
    KernelExecution { node: usize, reason: String },

    /// A cell's rescale loop could not lift it above the threshold.
    #[error(
        "underflow divergence at node {node}, site {site}, character {character} after {rescales} rescales"
    )]
    UnderflowDivergence {
        node: usize,
        site: usize,
        character: usize,
        rescales: u32,
    },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

pub type Result<T> = std::result::Result<T, LikelihoodError>;

impl LikelihoodError {
    pub fn resource(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn kernel(node: usize, reason: impl Into<String>) -> Self {
        Self::KernelExecution {
            node,
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
