use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// A decision variable. Lower bound 0, no upper bound unless tightened.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Display name (`x1`, `x2`, ... unless given explicitly)
    pub name: String,
    /// Restricted to integer values
    pub is_integer: bool,
}

/// Optimization direction
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "Minimize", alias = "min"))]
    Minimize,
    #[cfg_attr(feature = "serde", serde(alias = "Maximize", alias = "max"))]
    Maximize,
}

impl Sense {
    /// Multiplier that turns an objective in this sense into a minimization.
    pub fn sign(self) -> f64 {
        match self {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Minimize => write!(f, "minimize"),
            Sense::Maximize => write!(f, "maximize"),
        }
    }
}

impl FromStr for Sense {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" | "minimize" => Ok(Sense::Minimize),
            "max" | "maximize" => Ok(Sense::Maximize),
            other => Err(format!("unknown optimization sense '{other}'")),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficient for each variable, by index
    pub coefficients: Vec<f64>,
    pub sense: Sense,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficient for each variable, by index
    pub coefficients: Vec<f64>,
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

impl Constraint {
    /// Left-hand side evaluated at `values`.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    #[cfg_attr(feature = "serde", serde(rename = "<="))]
    Le,
    /// Greater than or equal (>=)
    #[cfg_attr(feature = "serde", serde(rename = ">="))]
    Ge,
    /// Equal (=)
    #[cfg_attr(feature = "serde", serde(rename = "=", alias = "=="))]
    Eq,
}

impl ConstraintOp {
    /// Direction after multiplying both sides by -1.
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOp::Le => write!(f, "<="),
            ConstraintOp::Ge => write!(f, ">="),
            ConstraintOp::Eq => write!(f, "="),
        }
    }
}

impl FromStr for ConstraintOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<=" => Ok(ConstraintOp::Le),
            ">=" => Ok(ConstraintOp::Ge),
            "=" | "==" => Ok(ConstraintOp::Eq),
            other => Err(format!("unknown constraint sign '{other}'")),
        }
    }
}

/// Closed interval a variable is confined to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }
}

/// A constraint or bound broken by some assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Constraint name, or variable name for bound violations
    pub name: String,
    pub activity: f64,
    pub op: ConstraintOp,
    pub rhs: f64,
    pub amount: f64,
}

/// A linear or mixed-integer program.
///
/// Built once by the caller and only read by the solver. Branching works on
/// clones with tightened [`Bounds`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    variables: Vec<Variable>,
    objective: Objective,
    constraints: Vec<Constraint>,
    bounds: Vec<Bounds>,
}

impl Model {
    pub fn new(names: Vec<String>) -> Self {
        let n = names.len();
        Self {
            variables: names
                .into_iter()
                .map(|name| Variable {
                    name,
                    is_integer: false,
                })
                .collect(),
            objective: Objective {
                coefficients: vec![0.0; n],
                sense: Sense::Minimize,
            },
            constraints: Vec::new(),
            bounds: vec![Bounds::default(); n],
        }
    }

    /// Model with `n` continuous variables named `x1..xn`.
    pub fn with_variables(n: usize) -> Self {
        Self::new((1..=n).map(|i| format!("x{i}")).collect())
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, sense: Sense) -> Result<(), ModelError> {
        self.check_dense("objective", &coefficients)?;
        self.objective = Objective { coefficients, sense };
        Ok(())
    }

    /// Set the objective from `(index, coefficient)` pairs. Repeated indices are summed.
    pub fn set_sparse_objective(&mut self, terms: &[(usize, f64)], sense: Sense) -> Result<(), ModelError> {
        let coefficients = self.densify("objective", terms)?;
        self.set_objective(coefficients, sense)
    }

    /// Append a constraint. An empty name becomes `c{n}` (1-based).
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        coefficients: Vec<f64>,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), ModelError> {
        let mut name = name.into();
        if name.is_empty() {
            name = format!("c{}", self.constraints.len() + 1);
        }
        let context = format!("constraint {name}");
        self.check_dense(&context, &coefficients)?;
        if !rhs.is_finite() {
            return Err(ModelError::NonFinite { context });
        }
        self.constraints.push(Constraint {
            name,
            coefficients,
            op,
            rhs,
        });
        Ok(())
    }

    /// Append a constraint given as `(index, coefficient)` pairs.
    pub fn add_sparse_constraint(
        &mut self,
        name: impl Into<String>,
        terms: &[(usize, f64)],
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), ModelError> {
        let name = name.into();
        let coefficients = self.densify(&format!("constraint {name}"), terms)?;
        self.add_constraint(name, coefficients, op, rhs)
    }

    pub fn set_integer(&mut self, index: usize, is_integer: bool) -> Result<(), ModelError> {
        let variable = self
            .variables
            .get_mut(index)
            .ok_or_else(|| ModelError::UnknownVariable {
                context: "integer restriction".to_string(),
                index,
            })?;
        variable.is_integer = is_integer;
        Ok(())
    }

    /// Re-check every invariant of the model.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.variables.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        self.check_dense("objective", &self.objective.coefficients)?;
        for c in &self.constraints {
            let context = format!("constraint {}", c.name);
            self.check_dense(&context, &c.coefficients)?;
            if !c.rhs.is_finite() {
                return Err(ModelError::NonFinite { context });
            }
        }
        if self.bounds.len() != self.variables.len() {
            return Err(ModelError::DimensionMismatch {
                context: "bounds".to_string(),
                expected: self.variables.len(),
                found: self.bounds.len(),
            });
        }
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integers(&self) -> bool {
        self.variables.iter().any(|v| v.is_integer)
    }

    /// Objective value at `values`, in the model's own sense.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Constraints and bounds broken by `values`, worst first.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<Violation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let activity = c.activity(values);
            let amount = match c.op {
                ConstraintOp::Le => activity - c.rhs,
                ConstraintOp::Ge => c.rhs - activity,
                ConstraintOp::Eq => (activity - c.rhs).abs(),
            };
            if amount > tolerance {
                violations.push(Violation {
                    name: c.name.clone(),
                    activity,
                    op: c.op,
                    rhs: c.rhs,
                    amount,
                });
            }
        }

        for ((variable, bounds), &value) in self.variables.iter().zip(&self.bounds).zip(values) {
            if value < bounds.lower - tolerance {
                violations.push(Violation {
                    name: variable.name.clone(),
                    activity: value,
                    op: ConstraintOp::Ge,
                    rhs: bounds.lower,
                    amount: bounds.lower - value,
                });
            } else if value > bounds.upper + tolerance {
                violations.push(Violation {
                    name: variable.name.clone(),
                    activity: value,
                    op: ConstraintOp::Le,
                    rhs: bounds.upper,
                    amount: value - bounds.upper,
                });
            }
        }

        violations.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        violations
    }

    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.variables.len() && self.violations(values, tolerance).is_empty()
    }

    /// Objective coefficients of the equivalent minimization problem.
    pub(crate) fn minimization_costs(&self) -> Vec<f64> {
        let sign = self.objective.sense.sign();
        self.objective.coefficients.iter().map(|c| sign * c).collect()
    }

    /// Copy with the upper bound of `index` lowered to `upper`.
    pub(crate) fn with_upper_bound(&self, index: usize, upper: f64) -> Model {
        let mut model = self.clone();
        let bounds = &mut model.bounds[index];
        bounds.upper = bounds.upper.min(upper);
        model
    }

    /// Copy with the lower bound of `index` raised to `lower`.
    pub(crate) fn with_lower_bound(&self, index: usize, lower: f64) -> Model {
        let mut model = self.clone();
        let bounds = &mut model.bounds[index];
        bounds.lower = bounds.lower.max(lower);
        model
    }

    fn check_dense(&self, context: &str, coefficients: &[f64]) -> Result<(), ModelError> {
        if coefficients.len() != self.variables.len() {
            return Err(ModelError::DimensionMismatch {
                context: context.to_string(),
                expected: self.variables.len(),
                found: coefficients.len(),
            });
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::NonFinite {
                context: context.to_string(),
            });
        }
        Ok(())
    }

    fn densify(&self, context: &str, terms: &[(usize, f64)]) -> Result<Vec<f64>, ModelError> {
        let mut coefficients = vec![0.0; self.variables.len()];
        for &(index, coef) in terms {
            let slot = coefficients
                .get_mut(index)
                .ok_or_else(|| ModelError::UnknownVariable {
                    context: context.to_string(),
                    index,
                })?;
            *slot += coef;
        }
        Ok(coefficients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_and_bounds() {
        let model = Model::with_variables(3);
        let names: Vec<_> = model.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x1", "x2", "x3"]);
        assert!(model.bounds().iter().all(|b| b.lower == 0.0 && b.upper.is_infinite()));
        assert!(!model.has_integers());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut model = Model::with_variables(2);
        let err = model
            .add_constraint("cap", vec![1.0], ConstraintOp::Le, 4.0)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DimensionMismatch {
                context: "constraint cap".to_string(),
                expected: 2,
                found: 1,
            }
        );
        assert_eq!(model.num_constraints(), 0);

        assert!(model.set_objective(vec![1.0, 2.0, 3.0], Sense::Maximize).is_err());
    }

    #[test]
    fn test_sparse_terms() {
        let mut model = Model::with_variables(3);
        model
            .add_sparse_constraint("", &[(0, 1.0), (2, 2.0), (0, 0.5)], ConstraintOp::Ge, 1.0)
            .unwrap();
        assert_eq!(model.constraints()[0].name, "c1");
        assert_eq!(model.constraints()[0].coefficients, vec![1.5, 0.0, 2.0]);

        let err = model.set_sparse_objective(&[(3, 1.0)], Sense::Minimize).unwrap_err();
        assert!(matches!(err, ModelError::UnknownVariable { index: 3, .. }));
        assert!(model.set_integer(5, true).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut model = Model::with_variables(1);
        assert!(matches!(
            model.add_constraint("a", vec![f64::NAN], ConstraintOp::Le, 1.0),
            Err(ModelError::NonFinite { .. })
        ));
        assert!(matches!(
            model.add_constraint("b", vec![1.0], ConstraintOp::Le, f64::INFINITY),
            Err(ModelError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_empty_model_invalid() {
        assert_eq!(Model::with_variables(0).validate(), Err(ModelError::EmptyModel));
    }

    #[test]
    fn test_violations() {
        let mut model = Model::with_variables(2);
        model
            .add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 4.0)
            .unwrap();
        model
            .add_constraint("diff", vec![1.0, -1.0], ConstraintOp::Eq, 0.0)
            .unwrap();

        assert!(model.is_feasible(&[2.0, 2.0], 1e-9));

        let violations = model.violations(&[4.0, 1.0], 1e-9);
        let names: Vec<_> = violations.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["diff", "sum"]);
        assert!((violations[0].amount - 3.0).abs() < 1e-12);

        let violations = model.violations(&[-1.0, -1.0], 1e-9);
        assert!(violations.iter().any(|v| v.name == "x1" && v.op == ConstraintOp::Ge));
    }

    #[test]
    fn test_bound_tightening_copies() {
        let model = Model::with_variables(1);
        let down = model.with_upper_bound(0, 3.0);
        let up = down.with_lower_bound(0, 2.0);
        assert_eq!(model.bounds()[0], Bounds::default());
        assert_eq!(down.bounds()[0].upper, 3.0);
        assert_eq!(up.bounds()[0], Bounds { lower: 2.0, upper: 3.0 });
        // Tightening never loosens
        assert_eq!(up.with_upper_bound(0, 10.0).bounds()[0].upper, 3.0);
    }

    #[test]
    fn test_parse_ops_and_sense() {
        assert_eq!("<=".parse::<ConstraintOp>(), Ok(ConstraintOp::Le));
        assert_eq!("==".parse::<ConstraintOp>(), Ok(ConstraintOp::Eq));
        assert!("<".parse::<ConstraintOp>().is_err());
        assert_eq!("Maximize".parse::<Sense>(), Ok(Sense::Maximize));
        assert_eq!("min".parse::<Sense>(), Ok(Sense::Minimize));
        assert_eq!(ConstraintOp::Ge.to_string(), ">=");
        assert_eq!(ConstraintOp::Le.flipped(), ConstraintOp::Ge);
    }

    #[test]
    fn test_minimization_costs() {
        let mut model = Model::with_variables(2);
        model.set_objective(vec![3.0, -2.0], Sense::Maximize).unwrap();
        assert_eq!(model.minimization_costs(), vec![-3.0, 2.0]);
        assert_eq!(model.evaluate(&[1.0, 1.0]), 1.0);
    }
}
