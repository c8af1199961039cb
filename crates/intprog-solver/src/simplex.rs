use tracing::{debug, trace, warn};

use crate::config::{PivotRule, SolverConfig};
use crate::error::SolveError;
use crate::model::{ConstraintOp, Model};
use crate::solution::{Solution, SolveStats};

/// Solve the continuous relaxation of `model`, ignoring integrality.
///
/// Runs under the configured pivot rule; if Dantzig's rule exhausts the
/// iteration limit the solve restarts from scratch under Bland's rule, which
/// cannot cycle.
pub(crate) fn solve_relaxation(model: &Model, config: &SolverConfig) -> Result<Solution, SolveError> {
    let mut simplex = Simplex::new(config, config.pivot_rule);
    match simplex.solve(model) {
        Err(SolveError::NumericInstability { iterations }) if config.pivot_rule == PivotRule::Dantzig => {
            warn!(
                component = "simplex",
                operation = "fallback",
                iterations = iterations as u64,
                "Iteration limit reached, retrying with Bland's rule"
            );
            let mut fallback = Simplex::new(config, PivotRule::Bland);
            let mut solution = fallback.solve(model).map_err(|err| match err {
                SolveError::NumericInstability { iterations: more } => SolveError::NumericInstability {
                    iterations: iterations + more,
                },
                other => other,
            })?;
            solution.stats.iterations += iterations;
            Ok(solution)
        }
        result => result,
    }
}

/// Two-phase tableau simplex over the minimization form of a model
struct Simplex {
    tolerance: f64,
    max_iterations: usize,
    rule: PivotRule,
    /// Pivots performed so far
    iterations: usize,
}

/// Dense tableau. The last row holds reduced costs, with `-z` in the RHS column.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    /// Lower bound substituted out of each structural variable
    shift: Vec<f64>,
}

impl Tableau {
    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn rhs_col(&self) -> usize {
        self.data[0].len() - 1
    }

    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
}

impl Simplex {
    fn new(config: &SolverConfig, rule: PivotRule) -> Self {
        Self {
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
            rule,
            iterations: 0,
        }
    }

    fn solve(&mut self, model: &Model) -> Result<Solution, SolveError> {
        let Some(mut tableau) = self.build_tableau(model) else {
            debug!(
                component = "simplex",
                operation = "build",
                "Crossed variable bounds, relaxation is infeasible"
            );
            return Ok(self.finish(Solution::infeasible()));
        };

        debug!(
            component = "simplex",
            operation = "solve",
            rule = ?self.rule,
            rows = tableau.basic_vars.len() as u64,
            columns = tableau.rhs_col() as u64,
            artificials = tableau.n_artificial as u64,
            "Solving relaxation"
        );

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 && !self.phase1(&mut tableau)? {
            return Ok(self.finish(Solution::infeasible()));
        }

        // Phase 2: Optimize
        let solution = match self.phase2(&mut tableau, &model.minimization_costs())? {
            SimplexResult::Optimal => {
                let solution = self.extract_solution(&tableau, model);
                self.check_point(model, &solution.values)?;
                solution
            }
            SimplexResult::Unbounded => Solution::unbounded(model.objective().sense),
        };

        debug!(
            component = "simplex",
            operation = "solve",
            status = ?solution.status,
            iterations = self.iterations as u64,
            "Relaxation solved"
        );
        Ok(self.finish(solution))
    }

    fn finish(&self, solution: Solution) -> Solution {
        solution.with_stats(SolveStats {
            iterations: self.iterations,
            ..SolveStats::default()
        })
    }

    /// Standard form: `x = lower + x'`, finite upper bounds as extra rows,
    /// non-negative right-hand sides. Returns `None` if some bounds cross.
    fn build_tableau(&self, model: &Model) -> Option<Tableau> {
        let n_vars = model.num_variables();
        let bounds = model.bounds();

        if bounds.iter().any(|b| b.lower > b.upper + self.tolerance) {
            return None;
        }
        let shift: Vec<f64> = bounds.iter().map(|b| b.lower).collect();

        let mut rows: Vec<(Vec<f64>, ConstraintOp, f64)> =
            Vec::with_capacity(model.num_constraints() + n_vars);
        for c in model.constraints() {
            rows.push((c.coefficients.clone(), c.op, c.rhs - c.activity(&shift)));
        }
        for (j, b) in bounds.iter().enumerate() {
            if b.upper.is_finite() {
                let mut coefficients = vec![0.0; n_vars];
                coefficients[j] = 1.0;
                rows.push((coefficients, ConstraintOp::Le, (b.upper - b.lower).max(0.0)));
            }
        }

        // RHS must be non-negative
        for (coefficients, op, rhs) in &mut rows {
            if *rhs < 0.0 {
                coefficients.iter_mut().for_each(|c| *c = -*c);
                *rhs = -*rhs;
                *op = op.flipped();
            }
        }

        let n_slack = rows.iter().filter(|r| r.1 != ConstraintOp::Eq).count();
        let n_artificial = rows.iter().filter(|r| r.1 != ConstraintOp::Le).count();
        let n_rows = rows.len();
        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS

        let mut data = vec![vec![0.0; total_cols]; n_rows + 1];
        let mut basic_vars = vec![0; n_rows];
        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (coefficients, op, rhs)) in rows.into_iter().enumerate() {
            data[i][..n_vars].copy_from_slice(&coefficients);
            data[i][total_cols - 1] = rhs;

            match op {
                ConstraintOp::Le => {
                    data[i][slack_idx] = 1.0;
                    basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        Some(Tableau {
            data,
            basic_vars,
            n_vars,
            n_slack,
            n_artificial,
            shift,
        })
    }

    /// Minimize the sum of artificials. Returns false if it stays positive.
    fn phase1(&mut self, tableau: &mut Tableau) -> Result<bool, SolveError> {
        let obj_row = tableau.obj_row();
        let rhs_col = tableau.rhs_col();
        let art_start = tableau.art_start();

        tableau.data[obj_row].fill(0.0);
        for j in art_start..art_start + tableau.n_artificial {
            tableau.data[obj_row][j] = 1.0;
        }

        // Price out the basic artificials
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..=rhs_col {
                    let value = tableau.data[i][j];
                    tableau.data[obj_row][j] -= value;
                }
            }
        }

        // Bounded below by zero, so never unbounded
        if let SimplexResult::Unbounded = self.optimize(tableau, rhs_col)? {
            return Ok(false);
        }

        let infeasibility = -tableau.data[obj_row][rhs_col];
        if infeasibility > self.tolerance {
            trace!(
                component = "simplex",
                operation = "phase1",
                infeasibility,
                "Artificial variables remain positive"
            );
            return Ok(false);
        }

        self.drive_out_artificials(tableau);
        Ok(true)
    }

    /// Pivot zero-level artificials out of the basis. Rows with no other
    /// candidate column are redundant and keep their artificial.
    fn drive_out_artificials(&mut self, tableau: &mut Tableau) {
        let art_start = tableau.art_start();
        for i in 0..tableau.basic_vars.len() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            if let Some(col) = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance) {
                self.pivot(tableau, i, col);
            } else {
                trace!(component = "simplex", operation = "phase1", row = i as u64, "Redundant row");
            }
        }
    }

    fn phase2(&mut self, tableau: &mut Tableau, costs: &[f64]) -> Result<SimplexResult, SolveError> {
        let obj_row = tableau.obj_row();
        let rhs_col = tableau.rhs_col();

        tableau.data[obj_row].fill(0.0);
        tableau.data[obj_row][..tableau.n_vars].copy_from_slice(costs);

        for i in 0..obj_row {
            let cost = tableau.data[obj_row][tableau.basic_vars[i]];
            if cost != 0.0 {
                for j in 0..=rhs_col {
                    let value = tableau.data[i][j];
                    tableau.data[obj_row][j] -= cost * value;
                }
            }
        }

        // Artificial columns may not re-enter
        let limit = tableau.art_start();
        self.optimize(tableau, limit)
    }

    /// Pivot until no column below `limit` improves the objective.
    fn optimize(&mut self, tableau: &mut Tableau, limit: usize) -> Result<SimplexResult, SolveError> {
        for _ in 0..self.max_iterations {
            let Some(pivot_col) = self.find_pivot_column(tableau, limit) else {
                return Ok(SimplexResult::Optimal);
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return Ok(SimplexResult::Unbounded);
            };
            trace!(
                component = "simplex",
                operation = "pivot",
                row = pivot_row as u64,
                col = pivot_col as u64,
                "Pivot"
            );
            self.pivot(tableau, pivot_row, pivot_col);
            self.iterations += 1;
        }

        if self.find_pivot_column(tableau, limit).is_none() {
            return Ok(SimplexResult::Optimal);
        }
        Err(SolveError::NumericInstability {
            iterations: self.iterations,
        })
    }

    fn find_pivot_column(&self, tableau: &Tableau, limit: usize) -> Option<usize> {
        let reduced = &tableau.data[tableau.obj_row()][..limit];
        match self.rule {
            PivotRule::Bland => reduced.iter().position(|&d| d < -self.tolerance),
            PivotRule::Dantzig => {
                let mut min_val = -self.tolerance;
                let mut min_col = None;
                for (j, &d) in reduced.iter().enumerate() {
                    if d < min_val {
                        min_val = d;
                        min_col = Some(j);
                    }
                }
                min_col
            }
        }
    }

    /// Minimum-ratio test, ties to the lowest basic variable index.
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.rhs_col();
        let mut best: Option<(usize, f64)> = None;

        for i in 0..tableau.basic_vars.len() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col] / val;
            best = match best {
                None => Some((i, ratio)),
                Some((row, min_ratio)) => {
                    let tied = (ratio - min_ratio).abs() <= self.tolerance;
                    if (!tied && ratio < min_ratio)
                        || (tied && tableau.basic_vars[i] < tableau.basic_vars[row])
                    {
                        Some((i, ratio))
                    } else {
                        Some((row, min_ratio))
                    }
                }
            };
        }

        best.map(|(row, _)| row)
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }
        tableau.data[row][col] = 1.0;

        let pivot_row = tableau.data[row].clone();
        for (i, data_row) in tableau.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = data_row[col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in data_row.iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
            data_row[col] = 0.0;
        }
    }

    /// Reject a basic solution that drifted off the model through round-off.
    /// Each row is checked relative to its own right-hand side.
    fn check_point(&self, model: &Model, values: &[f64]) -> Result<(), SolveError> {
        let drifted = model
            .violations(values, self.tolerance)
            .into_iter()
            .find(|v| v.amount > self.tolerance * (1.0 + v.rhs.abs()));
        match drifted {
            Some(violation) => {
                warn!(
                    component = "simplex",
                    operation = "extract",
                    constraint = %violation.name,
                    amount = violation.amount,
                    "Basic solution violates the model"
                );
                Err(SolveError::NumericInstability {
                    iterations: self.iterations,
                })
            }
            None => Ok(()),
        }
    }

    fn extract_solution(&self, tableau: &Tableau, model: &Model) -> Solution {
        let rhs_col = tableau.rhs_col();

        let mut values = tableau.shift.clone();
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < tableau.n_vars {
                values[basic] += tableau.data[i][rhs_col];
            }
        }
        for value in &mut values {
            if value.abs() < self.tolerance {
                *value = 0.0;
            }
        }

        let objective_value = model.evaluate(&values);
        Solution::optimal(values, objective_value)
    }
}
