//! WASM bindings for intprog
//!
//! JavaScript-friendly entry points for editors and web forms.

use wasm_bindgen::prelude::*;

use crate::compiler::{CompileError, Compiler};
use crate::form::FormInput;
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};
use crate::report::Report;
use intprog_solver::{Model, Solver};

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse source code and return the AST as JSON
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsValue> {
    let program = Parser::parse(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&program)
}

/// Tokenize source code and return tokens as JSON
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<TokenInfo> = Lexer::tokenize(source)
        .into_iter()
        .map(|t| TokenInfo {
            kind: format!("{:?}", t.kind),
            text: t.text,
            start: t.span.start,
            end: t.span.end,
        })
        .collect();
    to_js(&tokens)
}

#[derive(serde::Serialize)]
struct TokenInfo {
    kind: String,
    text: String,
    start: usize,
    end: usize,
}

#[derive(serde::Serialize, Debug, PartialEq)]
struct Diagnostic {
    start: usize,
    end: usize,
    severity: String,
    message: String,
}

/// Validate source code and return diagnostics as JSON
#[wasm_bindgen]
pub fn validate(source: &str) -> JsValue {
    serde_wasm_bindgen::to_value(&diagnostics(source)).unwrap_or(JsValue::NULL)
}

fn diagnostics(source: &str) -> Vec<Diagnostic> {
    let error = match Compiler::compile_source(source) {
        Ok(_) => return Vec::new(),
        Err(e) => e,
    };
    let (start, end) = match &error {
        CompileError::Parse(ParseError::UnexpectedToken { span, .. })
        | CompileError::Parse(ParseError::DuplicateObjective(span)) => (span.start, span.end),
        _ => (0, source.len()),
    };
    vec![Diagnostic {
        start,
        end,
        severity: "error".to_string(),
        message: error.to_string(),
    }]
}

/// Solve a problem written in the text language
#[wasm_bindgen]
pub fn solve(source: &str) -> Result<JsValue, JsValue> {
    let compiled = Compiler::compile_source(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    solve_model(&compiled.model)
}

/// Solve a problem given as a JSON form payload
#[wasm_bindgen]
pub fn solve_form(json: &str) -> Result<JsValue, JsValue> {
    let model = FormInput::from_json(json)
        .and_then(FormInput::into_model)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    solve_model(&model)
}

fn solve_model(model: &Model) -> Result<JsValue, JsValue> {
    let solution = Solver::new()
        .solve(model)
        .map_err(|e| JsValue::from_str(&format!("{} ({})", e, e.code())))?;
    let report = Report::new(model, &solution);
    to_js(&SolveResult {
        summary: report.summary(),
        text: report.to_string(),
    })
}

#[derive(serde::Serialize)]
struct SolveResult {
    #[serde(flatten)]
    summary: crate::report::ReportSummary,
    text: String,
}
