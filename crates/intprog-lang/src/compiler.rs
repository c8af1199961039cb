use std::collections::{HashMap, HashSet};

use intprog_solver::{Model, ModelError};
use thiserror::Error;

use crate::ast::*;
use crate::parser::{ParseError, Parser};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Duplicate constraint name: {0}")]
    DuplicateConstraint(String),
    #[error("Objective contains a constant term ({0}); only variable terms are allowed")]
    ObjectiveConstant(f64),
    #[error("Problem declares no variables")]
    NoVariables,
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),
}

/// A program lowered to a solver model
#[derive(Debug, Clone)]
pub struct CompiledProblem {
    pub model: Model,
    /// Constraint labels as written, `None` where the source gave none
    pub labels: Vec<Option<String>>,
}

/// Lowers parsed programs to [`Model`]s
#[derive(Debug, Default)]
pub struct Compiler {
    /// Variable name to model index, in order of first appearance
    variables: HashMap<String, usize>,
    names: Vec<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and compile in one step.
    pub fn compile_source(source: &str) -> Result<CompiledProblem, CompileError> {
        let program = Parser::parse(source)?;
        Compiler::new().compile(&program)
    }

    pub fn compile(&mut self, program: &Program) -> Result<CompiledProblem, CompileError> {
        self.variables.clear();
        self.names.clear();
        self.collect_variables(program);
        if self.names.is_empty() {
            return Err(CompileError::NoVariables);
        }

        let mut model = Model::new(self.names.clone());

        // parse_program guarantees exactly one objective
        if let Some(objective) = program.objective() {
            let constant = objective.expr.constant();
            if constant != 0.0 {
                return Err(CompileError::ObjectiveConstant(constant));
            }
            let terms = self.sparse(&objective.expr, 1.0);
            model.set_sparse_objective(&terms, objective.sense)?;
        }

        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for constraint in program.constraints() {
            if let Some(name) = &constraint.name {
                if !seen.insert(name.clone()) {
                    return Err(CompileError::DuplicateConstraint(name.clone()));
                }
            }

            // lhs - rhs (op) rhs_constants - lhs_constants
            let mut terms = self.sparse(&constraint.lhs, 1.0);
            terms.extend(self.sparse(&constraint.rhs, -1.0));
            let rhs = constraint.rhs.constant() - constraint.lhs.constant();

            model.add_sparse_constraint(
                constraint.name.clone().unwrap_or_default(),
                &terms,
                constraint.op,
                rhs,
            )?;
            labels.push(constraint.name.clone());
        }

        for declaration in program.declarations() {
            if declaration.kind == DeclarationKind::Int {
                for name in &declaration.names {
                    model.set_integer(self.variables[name.as_str()], true)?;
                }
            }
        }

        model.validate()?;
        Ok(CompiledProblem { model, labels })
    }

    fn collect_variables(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::Objective(o) => self.intern_expr(&o.expr),
                Item::Constraint(c) => {
                    self.intern_expr(&c.lhs);
                    self.intern_expr(&c.rhs);
                }
                Item::Declaration(d) => {
                    for name in &d.names {
                        self.intern(name);
                    }
                }
            }
        }
    }

    fn intern_expr(&mut self, expr: &LinearExpr) {
        for (name, _) in expr.variable_terms() {
            self.intern(name);
        }
    }

    fn intern(&mut self, name: &str) {
        if !self.variables.contains_key(name) {
            self.variables.insert(name.to_string(), self.names.len());
            self.names.push(name.to_string());
        }
    }

    fn sparse(&self, expr: &LinearExpr, sign: f64) -> Vec<(usize, f64)> {
        expr.variable_terms()
            .map(|(name, coef)| (self.variables[name], sign * coef))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intprog_solver::{ConstraintOp, Sense};

    #[test]
    fn test_compile_moves_terms_left() {
        let compiled = Compiler::compile_source(
            "maximize 3x1 + 2x2\nsubject to\ncap: x1 + 1 <= 5 - x2\n2x1 = x2 + x1 + 3",
        )
        .unwrap();
        let model = &compiled.model;

        assert_eq!(model.objective().sense, Sense::Maximize);
        assert_eq!(model.objective().coefficients, vec![3.0, 2.0]);

        let cap = &model.constraints()[0];
        assert_eq!(cap.name, "cap");
        assert_eq!(cap.coefficients, vec![1.0, 1.0]);
        assert_eq!(cap.op, ConstraintOp::Le);
        assert_eq!(cap.rhs, 4.0);

        let second = &model.constraints()[1];
        assert_eq!(second.name, "c2");
        assert_eq!(second.coefficients, vec![1.0, -1.0]);
        assert_eq!(second.rhs, 3.0);

        assert_eq!(compiled.labels, vec![Some("cap".to_string()), None]);
    }

    #[test]
    fn test_variable_order_and_integers() {
        let compiled =
            Compiler::compile_source("min b + a\nvar c\nint a, c\na + b + c >= 1").unwrap();
        let variables = compiled.model.variables();
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        let integer: Vec<_> = variables.iter().map(|v| v.is_integer).collect();
        assert_eq!(integer, vec![false, true, true]);
        assert_eq!(compiled.model.objective().coefficients, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_duplicate_constraint_name() {
        let err = Compiler::compile_source("max x\nc: x <= 1\nc: x <= 2").unwrap_err();
        assert_eq!(err, CompileError::DuplicateConstraint("c".to_string()));
    }

    #[test]
    fn test_objective_constant_rejected() {
        let err = Compiler::compile_source("max x + 5\nx <= 1").unwrap_err();
        assert_eq!(err, CompileError::ObjectiveConstant(5.0));
    }

    #[test]
    fn test_constant_only_problem() {
        let err = Compiler::compile_source("max 0").unwrap_err();
        assert_eq!(err, CompileError::NoVariables);
    }

    #[test]
    fn test_parse_errors_propagate() {
        let err = Compiler::compile_source("x <= 1").unwrap_err();
        assert_eq!(err, CompileError::Parse(ParseError::MissingObjective));
    }
}
