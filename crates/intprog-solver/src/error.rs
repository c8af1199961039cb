use thiserror::Error;

/// Rejection of a malformed model at the construction boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model has no variables")]
    EmptyModel,
    #[error("{context}: expected {expected} coefficients, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("{context}: variable index {index} does not exist")]
    UnknownVariable { context: String, index: usize },
    #[error("{context}: value is not finite")]
    NonFinite { context: String },
}

/// Engine fault. Infeasible and unbounded problems are solution statuses, not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelError),
    #[error("Simplex made no progress after {iterations} pivots")]
    NumericInstability { iterations: usize },
    #[error("Branch-and-bound node limit reached after {nodes} nodes")]
    NodeLimit { nodes: usize },
}

impl SolveError {
    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            SolveError::InvalidModel(_) => "MODEL_INVALID",
            SolveError::NumericInstability { .. } => "SOLVER_NUMERIC",
            SolveError::NodeLimit { .. } => "SOLVER_NODE_LIMIT",
        }
    }
}
