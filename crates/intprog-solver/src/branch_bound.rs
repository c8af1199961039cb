use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::SolverConfig;
use crate::error::SolveError;
use crate::model::Model;
use crate::simplex;
use crate::solution::{Solution, SolutionStatus, SolveStats};

/// Linear and mixed-integer program solver.
///
/// Continuous relaxations go through a two-phase simplex; integrality is
/// enforced by depth-first branch-and-bound on bound-tightened copies of
/// the model.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solve the continuous relaxation, ignoring integer restrictions.
    pub fn solve_relaxation(&self, model: &Model) -> Result<Solution, SolveError> {
        model.validate()?;
        let mut solution = simplex::solve_relaxation(model, &self.config)?;
        solution.stats.nodes = 1;
        Ok(solution)
    }

    /// Solve the model honoring every variable's integer restriction.
    pub fn solve(&self, model: &Model) -> Result<Solution, SolveError> {
        model.validate()?;

        debug!(
            component = "solver",
            operation = "solve",
            variables = model.num_variables() as u64,
            constraints = model.num_constraints() as u64,
            integers = model.variables().iter().filter(|v| v.is_integer).count() as u64,
            "Solving model"
        );

        let solution = Search::new(self, model).run()?;

        debug!(
            component = "solver",
            operation = "solve",
            status = ?solution.status,
            objective = solution.objective_value,
            nodes = solution.stats.nodes as u64,
            iterations = solution.stats.iterations as u64,
            "Solve finished"
        );
        Ok(solution)
    }

    /// Round integer variables, snap residue to zero, recompute the objective.
    fn finalize(&self, model: &Model, values: Vec<f64>, stats: SolveStats) -> Solution {
        let mut values = round_integers(model, &values);
        for value in &mut values {
            if value.abs() < self.config.tolerance {
                *value = 0.0;
            }
        }
        let objective_value = model.evaluate(&values);
        Solution::optimal(values, objective_value).with_stats(stats)
    }
}

fn round_integers(model: &Model, values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(model.variables())
        .map(|(&value, variable)| if variable.is_integer { value.round() } else { value })
        .collect()
}

/// Open node of the search tree
struct Node {
    model: Model,
    depth: usize,
}

/// Best integer-feasible assignment found so far
struct Incumbent {
    values: Vec<f64>,
    /// Objective of the minimization form
    bound: f64,
}

/// State of one branch-and-bound run
struct Search<'a> {
    solver: &'a Solver,
    root: &'a Model,
    stack: Vec<Node>,
    incumbent: Option<Incumbent>,
    stats: SolveStats,
    started: Instant,
}

impl<'a> Search<'a> {
    fn new(solver: &'a Solver, root: &'a Model) -> Self {
        Self {
            solver,
            root,
            stack: Vec::new(),
            incumbent: None,
            stats: SolveStats::default(),
            started: Instant::now(),
        }
    }

    fn config(&self) -> &SolverConfig {
        &self.solver.config
    }

    fn run(mut self) -> Result<Solution, SolveError> {
        // An infeasible or unbounded relaxation decides the whole problem
        let root = self.relax(self.root)?;
        self.stats.nodes = 1;
        match root.status {
            SolutionStatus::Optimal => {}
            _ => return Ok(root.with_stats(self.stats)),
        }

        self.process(self.root.clone(), 0, root)?;

        while let Some(node) = self.stack.pop() {
            if self.should_stop() {
                warn!(
                    component = "solver",
                    operation = "branch",
                    nodes = self.stats.nodes as u64,
                    "Search cancelled"
                );
                let best = self.incumbent.take().map(|inc| {
                    let best = self.solver.finalize(self.root, inc.values, self.stats);
                    (best.values, best.objective_value)
                });
                return Ok(Solution::cancelled(best).with_stats(self.stats));
            }

            if self.stats.nodes >= self.config().node_limit {
                return Err(SolveError::NodeLimit {
                    nodes: self.stats.nodes,
                });
            }
            self.stats.nodes += 1;
            self.stats.max_depth = self.stats.max_depth.max(node.depth);

            let relaxation = self.relax(&node.model)?;
            match relaxation.status {
                SolutionStatus::Optimal => self.process(node.model, node.depth, relaxation)?,
                SolutionStatus::Infeasible => {
                    trace!(component = "solver", operation = "prune", depth = node.depth as u64, "Infeasible node");
                }
                // A tightened copy of a bounded relaxation cannot be unbounded
                SolutionStatus::Unbounded | SolutionStatus::Cancelled => {
                    return Err(SolveError::NumericInstability {
                        iterations: self.stats.iterations,
                    });
                }
            }
        }

        Ok(match self.incumbent.take() {
            Some(incumbent) => self.solver.finalize(self.root, incumbent.values, self.stats),
            None => Solution::infeasible().with_stats(self.stats),
        })
    }

    fn relax(&mut self, model: &Model) -> Result<Solution, SolveError> {
        let solution = simplex::solve_relaxation(model, self.config())?;
        self.stats.iterations += solution.stats.iterations;
        Ok(solution)
    }

    /// Prune, accept as incumbent, or branch on an optimal relaxation.
    fn process(&mut self, model: Model, depth: usize, relaxation: Solution) -> Result<(), SolveError> {
        let bound = self.root.objective().sense.sign() * relaxation.objective_value;

        if let Some(incumbent) = &self.incumbent {
            if bound >= incumbent.bound - self.config().tolerance {
                trace!(
                    component = "solver",
                    operation = "prune",
                    depth = depth as u64,
                    bound,
                    incumbent = incumbent.bound,
                    "Bound cannot improve incumbent"
                );
                return Ok(());
            }
        }

        let branch = match self.branching_variable(&model, &relaxation.values) {
            Some(branch) => Some(branch),
            None => self.accept(depth, relaxation.values),
        };
        let Some((index, value)) = branch else {
            return Ok(());
        };

        trace!(
            component = "solver",
            operation = "branch",
            depth = depth as u64,
            variable = index as u64,
            value,
            "Branching"
        );

        // Down branch is popped first
        self.stack.push(Node {
            model: model.with_lower_bound(index, value.ceil()),
            depth: depth + 1,
        });
        self.stack.push(Node {
            model: model.with_upper_bound(index, value.floor()),
            depth: depth + 1,
        });
        Ok(())
    }

    /// Round an integral relaxation and store it as the incumbent. If
    /// rounding breaks a constraint, returns the first integer variable that
    /// is not exactly integral so the caller branches on it instead.
    fn accept(&mut self, depth: usize, values: Vec<f64>) -> Option<(usize, f64)> {
        let rounded = round_integers(self.root, &values);
        if !self.root.is_feasible(&rounded, self.config().tolerance) {
            let unrounded = self
                .root
                .variables()
                .iter()
                .zip(&values)
                .position(|(variable, value)| variable.is_integer && *value != value.round());
            if let Some(index) = unrounded {
                trace!(
                    component = "solver",
                    operation = "branch",
                    depth = depth as u64,
                    variable = index as u64,
                    "Rounded candidate is infeasible"
                );
                return Some((index, values[index]));
            }
        }

        let objective = self.root.evaluate(&rounded);
        let bound = self.root.objective().sense.sign() * objective;
        if self
            .incumbent
            .as_ref()
            .is_some_and(|incumbent| bound >= incumbent.bound - self.config().tolerance)
        {
            return None;
        }
        debug!(
            component = "solver",
            operation = "incumbent",
            depth = depth as u64,
            objective,
            "New incumbent"
        );
        self.incumbent = Some(Incumbent {
            values: rounded,
            bound,
        });
        None
    }

    /// First integer variable, by index, whose value is fractional.
    fn branching_variable(&self, model: &Model, values: &[f64]) -> Option<(usize, f64)> {
        let tol = self.config().integer_tolerance;
        model
            .variables()
            .iter()
            .zip(values)
            .enumerate()
            .find(|(_, (variable, value))| variable.is_integer && (*value - value.round()).abs() > tol)
            .map(|(index, (_, &value))| (index, value))
    }

    fn should_stop(&self) -> bool {
        let cancelled = self
            .config()
            .cancel_token
            .as_ref()
            .is_some_and(|token| token.is_cancelled());
        let timed_out = self
            .config()
            .time_limit()
            .is_some_and(|limit| self.started.elapsed() >= limit);
        cancelled || timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CancelToken;
    use crate::model::{ConstraintOp, Sense};

    fn knapsack() -> Model {
        // Maximize 8a + 11b + 6c + 4d
        //   5a + 7b + 4c + 3d <= 14
        //   each item taken at most once
        // Relaxation gives 22 with c = 0.5; integer optimum 21 at (0, 1, 1, 1)
        let mut model = Model::new(["a", "b", "c", "d"].map(String::from).to_vec());
        model.set_objective(vec![8.0, 11.0, 6.0, 4.0], Sense::Maximize).unwrap();
        model.add_constraint("weight", vec![5.0, 7.0, 4.0, 3.0], ConstraintOp::Le, 14.0).unwrap();
        for i in 0..4 {
            let mut once = vec![0.0; 4];
            once[i] = 1.0;
            model.add_constraint("", once, ConstraintOp::Le, 1.0).unwrap();
            model.set_integer(i, true).unwrap();
        }
        model
    }

    #[test]
    fn test_integer_rounding_down() {
        // Maximize x subject to x <= 5.5, x integer
        let mut model = Model::with_variables(1);
        model.set_objective(vec![1.0], Sense::Maximize).unwrap();
        model.add_constraint("", vec![1.0], ConstraintOp::Le, 5.5).unwrap();
        model.set_integer(0, true).unwrap();

        let solution = Solver::new().solve(&model).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![5.0]);
        assert_eq!(solution.objective_value, 5.0);
        assert_eq!(solution.stats.nodes, 3);
        assert_eq!(solution.stats.max_depth, 1);
    }

    #[test]
    fn test_near_integral_relaxation_is_not_rounded_into_infeasibility() {
        // Minimize x subject to 10x >= 20.000001, x integer.
        // The relaxation sits within integer tolerance of 2, which breaks the row.
        let mut model = Model::with_variables(1);
        model.set_objective(vec![1.0], Sense::Minimize).unwrap();
        model.add_constraint("", vec![10.0], ConstraintOp::Ge, 20.000001).unwrap();
        model.set_integer(0, true).unwrap();

        let solution = Solver::new().solve(&model).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![3.0]);
        assert_eq!(solution.objective_value, 3.0);
        assert!(model.is_feasible(&solution.values, 1e-9));
    }

    #[test]
    fn test_integer_tolerance_controls_branching() {
        // Relaxation optimum x = 2.75 rounds to 3 under a loose tolerance,
        // which breaks the row, so the search still branches down to 2.
        let mut model = Model::with_variables(1);
        model.set_objective(vec![1.0], Sense::Maximize).unwrap();
        model.add_constraint("", vec![4.0], ConstraintOp::Le, 11.0).unwrap();
        model.set_integer(0, true).unwrap();

        let strict = Solver::new().solve(&model).unwrap();
        let loose = Solver::with_config(SolverConfig::default().with_integer_tolerance(0.5))
            .solve(&model)
            .unwrap();
        assert_eq!(strict.values, vec![2.0]);
        assert_eq!(loose.values, vec![2.0]);
        assert_eq!(loose.stats.nodes, 3);
    }

    #[test]
    fn test_knapsack() {
        let model = knapsack();
        let solution = Solver::new().solve(&model).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 21.0).abs() < 1e-9, "obj = {}", solution.objective_value);
        assert_eq!(solution.values, vec![0.0, 1.0, 1.0, 1.0]);
        assert!(model.is_feasible(&solution.values, 1e-9));
        assert!(solution.stats.nodes > 1);
    }

    #[test]
    fn test_mixed_integer() {
        // Maximize 3x + y with x integer, y continuous
        //   2x + y <= 5
        // Relaxation optimum is 7.5 at (2.5, 0); with integer x it is 7 at (2, 1)
        let mut model = Model::with_variables(2);
        model.set_objective(vec![3.0, 1.0], Sense::Maximize).unwrap();
        model.add_constraint("", vec![2.0, 1.0], ConstraintOp::Le, 5.0).unwrap();
        model.set_integer(0, true).unwrap();

        let solution = Solver::new().solve(&model).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!(model.is_feasible(&solution.values, 1e-9));
        assert!((solution.values[0] - 2.0).abs() < 1e-12);
        assert!((solution.values[1] - 1.0).abs() < 1e-9);
        assert!((solution.objective_value - 7.0).abs() < 1e-9, "obj = {}", solution.objective_value);
    }

    #[test]
    fn test_integer_infeasible_with_feasible_relaxation() {
        // 2x = 1 has no integer solution
        let mut model = Model::with_variables(1);
        model.set_objective(vec![1.0], Sense::Maximize).unwrap();
        model.add_constraint("", vec![2.0], ConstraintOp::Eq, 1.0).unwrap();
        model.set_integer(0, true).unwrap();

        let relaxed = Solver::new().solve_relaxation(&model).unwrap();
        assert_eq!(relaxed.status, SolutionStatus::Optimal);
        assert_eq!(relaxed.values, vec![0.5]);

        let solution = Solver::new().solve(&model).unwrap();
        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_relaxation_ignores_integrality() {
        let relaxed = Solver::new().solve_relaxation(&knapsack()).unwrap();
        assert_eq!(relaxed.status, SolutionStatus::Optimal);
        assert!((relaxed.objective_value - 22.0).abs() < 1e-9);
        assert!((relaxed.values[2] - 0.5).abs() < 1e-9);
        assert_eq!(relaxed.stats.nodes, 1);
    }

    #[test]
    fn test_node_limit() {
        let config = SolverConfig::default().with_node_limit(1);
        let err = Solver::with_config(config).solve(&knapsack()).unwrap_err();
        assert_eq!(err, SolveError::NodeLimit { nodes: 1 });
    }

    #[test]
    fn test_cancelled_before_branching() {
        let token = CancelToken::new();
        token.cancel();
        let config = SolverConfig::default().with_cancel_token(token);
        let solution = Solver::with_config(config).solve(&knapsack()).unwrap();
        assert_eq!(solution.status, SolutionStatus::Cancelled);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let err = Solver::new().solve(&Model::with_variables(0)).unwrap_err();
        assert!(matches!(err, SolveError::InvalidModel(_)));
    }
}
