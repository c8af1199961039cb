use intprog_solver::{ConstraintOp, Sense};

use crate::lexer::Span;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub enum Item {
    Objective(ObjectiveDecl),
    Constraint(ConstraintDecl),
    Declaration(Declaration),
}

/// `maximize: 3 x1 + 2 x2`
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectiveDecl {
    pub span: Span,
    pub sense: Sense,
    pub expr: LinearExpr,
}

/// `cap: x1 + x2 <= 4`. Both sides may hold variables and constants.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct ConstraintDecl {
    pub span: Span,
    pub name: Option<String>,
    pub lhs: LinearExpr,
    pub op: ConstraintOp,
    pub rhs: LinearExpr,
}

/// `int x1, x2` or `var x3`
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Declaration {
    pub span: Span,
    pub kind: DeclarationKind,
    pub names: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// Continuous variable
    Var,
    /// Integer-restricted variable
    Int,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LinearExpr {
    pub terms: Vec<Term>,
}

/// `coefficient * variable`, or a bare constant when `variable` is `None`
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Term {
    pub span: Span,
    pub coefficient: f64,
    pub variable: Option<String>,
}

impl LinearExpr {
    /// Sum of the constant terms.
    pub fn constant(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable.is_none())
            .map(|t| t.coefficient)
            .sum()
    }

    /// Variable terms in source order.
    pub fn variable_terms(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms
            .iter()
            .filter_map(|t| t.variable.as_deref().map(|name| (name, t.coefficient)))
    }
}

impl Program {
    pub fn objective(&self) -> Option<&ObjectiveDecl> {
        self.items.iter().find_map(|item| match item {
            Item::Objective(o) => Some(o),
            _ => None,
        })
    }

    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Constraint(c) => Some(c),
            _ => None,
        })
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter().filter_map(|item| match item {
            Item::Declaration(d) => Some(d),
            _ => None,
        })
    }
}
