//! Human-readable and serializable views of a solve result.

use std::fmt;

use intprog_solver::{Model, Solution, SolutionStatus, SolveStats};
use serde::Serialize;

/// Formats a value for display: integral values print without a decimal
/// part, everything else with at most six decimals.
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    if (value - rounded).abs() < 1e-9 {
        // avoid "-0"
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        return format!("{:.0}", rounded);
    }
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Pairs a model with its solution for printing
pub struct Report<'a> {
    model: &'a Model,
    solution: &'a Solution,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub status: SolutionStatus,
    pub variables: Vec<VariableValue>,
    /// `None` when the status carries no finite objective
    pub objective_value: Option<f64>,
    pub stats: SolveStats,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub name: String,
    pub value: f64,
    pub integer: bool,
}

impl<'a> Report<'a> {
    pub fn new(model: &'a Model, solution: &'a Solution) -> Self {
        Self { model, solution }
    }

    pub fn summary(&self) -> ReportSummary {
        let variables = self
            .model
            .variables()
            .iter()
            .zip(&self.solution.values)
            .map(|(variable, &value)| VariableValue {
                name: variable.name.clone(),
                value,
                integer: variable.is_integer,
            })
            .collect();
        let objective = self.solution.objective_value;
        ReportSummary {
            status: self.solution.status,
            variables,
            objective_value: objective.is_finite().then_some(objective),
            stats: self.solution.stats,
        }
    }

    fn write_assignment(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (variable, value) in self.model.variables().iter().zip(&self.solution.values) {
            writeln!(f, "{} = {}", variable.name, format_value(*value))?;
        }
        write!(
            f,
            "Objective Value: {}",
            format_value(self.solution.objective_value)
        )
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.solution.status {
            SolutionStatus::Optimal => {
                writeln!(f, "Optimal Solution:")?;
                self.write_assignment(f)
            }
            SolutionStatus::Infeasible => write!(f, "The problem is infeasible."),
            SolutionStatus::Unbounded => write!(f, "The problem is unbounded."),
            SolutionStatus::Cancelled => {
                write!(f, "Solve cancelled.")?;
                if self.solution.values.is_empty() {
                    return Ok(());
                }
                writeln!(f)?;
                writeln!(f, "Best Solution Found:")?;
                self.write_assignment(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intprog_solver::{ConstraintOp, Sense, Solver};

    fn knapsack() -> Model {
        let mut model = Model::with_variables(2);
        model
            .set_objective(vec![5.0, 4.0], Sense::Maximize)
            .unwrap();
        model
            .add_constraint("", vec![6.0, 4.0], ConstraintOp::Le, 24.0)
            .unwrap();
        model
            .add_constraint("", vec![1.0, 2.0], ConstraintOp::Le, 6.0)
            .unwrap();
        model
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(12.0), "12");
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(2.9999999999), "3");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(1.0 / 3.0), "0.333333");
        assert_eq!(format_value(-0.0000001), "0");
        assert_eq!(format_value(f64::INFINITY), "inf");
    }

    #[test]
    fn test_optimal_report() {
        let model = knapsack();
        let solution = Solver::new().solve(&model).unwrap();
        let text = Report::new(&model, &solution).to_string();
        assert_eq!(text, "Optimal Solution:\nx1 = 3\nx2 = 1.5\nObjective Value: 21");
    }

    #[test]
    fn test_status_messages() {
        let model = knapsack();
        let infeasible = Solution::infeasible();
        assert_eq!(
            Report::new(&model, &infeasible).to_string(),
            "The problem is infeasible."
        );
        let unbounded = Solution::unbounded(Sense::Maximize);
        assert_eq!(
            Report::new(&model, &unbounded).to_string(),
            "The problem is unbounded."
        );
        let cancelled = Solution::cancelled(None);
        assert_eq!(Report::new(&model, &cancelled).to_string(), "Solve cancelled.");
        let cancelled = Solution::cancelled(Some((vec![4.0, 0.0], 20.0)));
        assert_eq!(
            Report::new(&model, &cancelled).to_string(),
            "Solve cancelled.\nBest Solution Found:\nx1 = 4\nx2 = 0\nObjective Value: 20"
        );
    }

    #[test]
    fn test_summary() {
        let mut model = knapsack();
        model.set_integer(1, true).unwrap();
        let solution = Solution::optimal(vec![3.0, 1.5], 21.0);
        let summary = Report::new(&model, &solution).summary();
        assert_eq!(summary.status, SolutionStatus::Optimal);
        assert_eq!(summary.objective_value, Some(21.0));
        assert_eq!(summary.variables[1].name, "x2");
        assert!(summary.variables[1].integer);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "optimal");
        assert_eq!(json["variables"][0]["value"], 3.0);

        let infeasible = Solution::infeasible();
        let summary = Report::new(&model, &infeasible).summary();
        assert!(summary.variables.is_empty());
        assert_eq!(summary.objective_value, None);
    }
}
