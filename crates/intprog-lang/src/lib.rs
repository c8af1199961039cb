pub mod ast;
pub mod compiler;
pub mod form;
pub mod lexer;
pub mod parser;
pub mod report;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use ast::*;
pub use compiler::{CompileError, CompiledProblem, Compiler};
pub use form::{FormConstraint, FormError, FormInput};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use report::{format_value, Report, ReportSummary, VariableValue};
