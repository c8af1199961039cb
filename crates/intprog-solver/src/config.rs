//! Solver configuration types.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Rule for choosing the entering column of a simplex pivot.
///
/// The leaving row is always chosen by the minimum-ratio test with ties going
/// to the lowest basic variable index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotRule {
    /// Most negative reduced cost, ties to the lowest column index.
    /// Falls back to [`PivotRule::Bland`] when the iteration limit is hit.
    #[default]
    Dantzig,
    /// Lowest-index column with a negative reduced cost. Cannot cycle.
    Bland,
}

/// Shared flag for stopping a running solve from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration options for solver behavior.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Tolerance for every comparison against zero inside the simplex.
    pub tolerance: f64,
    /// Distance from the nearest integer still treated as integral.
    pub integer_tolerance: f64,
    /// Pivot limit per simplex phase.
    pub max_iterations: usize,
    /// Maximum number of branch-and-bound nodes.
    pub node_limit: usize,
    /// Time limit in seconds. `None` means no limit.
    pub time_limit: Option<f64>,
    pub pivot_rule: PivotRule,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel_token: Option<CancelToken>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            integer_tolerance: 1e-6,
            max_iterations: 10_000,
            node_limit: 100_000,
            time_limit: None,
            pivot_rule: PivotRule::default(),
            cancel_token: None,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_integer_tolerance(mut self, tol: f64) -> Self {
        self.integer_tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_node_limit(mut self, nodes: usize) -> Self {
        self.node_limit = nodes;
        self
    }

    /// Set the time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    pub fn with_pivot_rule(mut self, rule: PivotRule) -> Self {
        self.pivot_rule = rule;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub(crate) fn time_limit(&self) -> Option<Duration> {
        self.time_limit
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }
}
