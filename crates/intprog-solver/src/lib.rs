mod branch_bound;
mod config;
mod error;
mod model;
mod simplex;
mod solution;

pub use branch_bound::Solver;
pub use config::{CancelToken, PivotRule, SolverConfig};
pub use error::{ModelError, SolveError};
pub use model::{Bounds, Constraint, ConstraintOp, Model, Objective, Sense, Variable, Violation};
pub use solution::{Solution, SolutionStatus, SolveStats};
