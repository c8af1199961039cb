//! JSON payload mirroring the solver input form: one objective coefficient
//! and one integer flag per variable, then one row per constraint.

use intprog_solver::{ConstraintOp, Model, ModelError, Sense};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Invalid form JSON: {0}")]
    Json(String),
    #[error("Form has no variables")]
    NoVariables,
    #[error("Expected {expected} integer flags, found {found}")]
    IntegerFlags { expected: usize, found: usize },
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormInput {
    #[serde(default = "default_sense")]
    pub sense: Sense,
    /// Objective coefficient per variable; its length fixes the variable count
    pub objective: Vec<f64>,
    /// Integer restriction per variable; empty means all continuous
    #[serde(default)]
    pub integer: Vec<bool>,
    #[serde(default)]
    pub constraints: Vec<FormConstraint>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormConstraint {
    #[serde(default)]
    pub name: Option<String>,
    pub coefficients: Vec<f64>,
    pub sign: ConstraintOp,
    pub rhs: f64,
}

fn default_sense() -> Sense {
    Sense::Maximize
}

impl FormInput {
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        serde_json::from_str(json).map_err(|e| FormError::Json(e.to_string()))
    }

    /// Build a model with variables `x1..xn`.
    pub fn into_model(self) -> Result<Model, FormError> {
        let n = self.objective.len();
        if n == 0 {
            return Err(FormError::NoVariables);
        }
        if !self.integer.is_empty() && self.integer.len() != n {
            return Err(FormError::IntegerFlags {
                expected: n,
                found: self.integer.len(),
            });
        }

        let mut model = Model::with_variables(n);
        model.set_objective(self.objective, self.sense)?;
        for constraint in self.constraints {
            model.add_constraint(
                constraint.name.unwrap_or_default(),
                constraint.coefficients,
                constraint.sign,
                constraint.rhs,
            )?;
        }
        for (index, is_integer) in self.integer.into_iter().enumerate() {
            model.set_integer(index, is_integer)?;
        }
        Ok(model)
    }
}
