use crate::model::Sense;

/// The result of solving a model
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Value of each variable, by index. Empty when no assignment is known.
    pub values: Vec<f64>,
    /// Objective value in the model's own sense
    pub objective_value: f64,
    /// Search statistics
    pub stats: SolveStats,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// No assignment satisfies every constraint
    Infeasible,
    /// The objective improves without limit
    Unbounded,
    /// Stopped by a cancel token or time limit; values hold the best
    /// integer-feasible assignment found, if any
    Cancelled,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveStats {
    /// Branch-and-bound nodes whose relaxation was solved
    pub nodes: usize,
    /// Simplex pivots over all relaxations
    pub iterations: usize,
    /// Deepest branch-and-bound node reached (root is 0)
    pub max_depth: usize,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            stats: SolveStats::default(),
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::NAN,
            stats: SolveStats::default(),
        }
    }

    /// Objective is infinite in the improving direction of `sense`.
    pub fn unbounded(sense: Sense) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: -sense.sign() * f64::INFINITY,
            stats: SolveStats::default(),
        }
    }

    pub fn cancelled(best: Option<(Vec<f64>, f64)>) -> Self {
        let (values, objective_value) = best.unwrap_or((Vec::new(), f64::NAN));
        Self {
            status: SolutionStatus::Cancelled,
            values,
            objective_value,
            stats: SolveStats::default(),
        }
    }

    pub(crate) fn with_stats(mut self, stats: SolveStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Value of variable `index`, if the solution carries one.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }
}
