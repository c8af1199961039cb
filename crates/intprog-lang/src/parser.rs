use intprog_solver::{ConstraintOp, Sense};
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Span, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Missing objective: add a `maximize` or `minimize` line")]
    MissingObjective,
    #[error("Second objective at position {0:?}; only one is allowed")]
    DuplicateObjective(Span),
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Program, ParseError> {
        let tokens = crate::lexer::Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_program()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) if t.kind != TokenKind::Eof => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("{:?} '{}'", t.kind, t.text),
                span: t.span,
            },
            _ => ParseError::UnexpectedEof,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            self.advance().ok_or(ParseError::UnexpectedEof)
        } else {
            Err(self.unexpected(&format!("{:?}", kind)))
        }
    }

    fn end_of_line(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    /// End of the most recently consumed token.
    fn last_end(&self, fallback: usize) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(fallback)
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        let mut has_objective = false;

        loop {
            self.skip_newlines();

            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Maximize | TokenKind::Minimize => {
                    let objective = self.parse_objective()?;
                    if has_objective {
                        return Err(ParseError::DuplicateObjective(objective.span));
                    }
                    has_objective = true;
                    items.push(Item::Objective(objective));
                }
                TokenKind::Subject => {
                    self.advance();
                    self.expect(TokenKind::To)?;
                    self.parse_header_rest()?;
                }
                TokenKind::St => {
                    self.advance();
                    self.parse_header_rest()?;
                }
                TokenKind::Int | TokenKind::Var => {
                    items.push(Item::Declaration(self.parse_declaration()?));
                }
                _ => items.push(Item::Constraint(self.parse_constraint()?)),
            }
        }

        if !has_objective {
            return Err(ParseError::MissingObjective);
        }
        Ok(Program { items })
    }

    fn parse_header_rest(&mut self) -> Result<(), ParseError> {
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
        }
        self.end_of_line()
    }

    fn parse_objective(&mut self) -> Result<ObjectiveDecl, ParseError> {
        let keyword = self.advance().ok_or(ParseError::UnexpectedEof)?;
        let sense = match keyword.kind {
            TokenKind::Maximize => Sense::Maximize,
            _ => Sense::Minimize,
        };
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
        }
        let expr = self.parse_expr()?;
        let span = Span::new(keyword.span.start, self.last_end(keyword.span.end));
        self.end_of_line()?;
        Ok(ObjectiveDecl { span, sense, expr })
    }

    fn parse_constraint(&mut self) -> Result<ConstraintDecl, ParseError> {
        let start = self.current().map(|t| t.span.start).unwrap_or(0);

        let name = if self.peek_kind() == TokenKind::Ident && self.peek_kind_at(1) == TokenKind::Colon {
            let name = self.advance().map(|t| t.text);
            self.advance();
            name
        } else {
            None
        };

        let lhs = self.parse_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Le => ConstraintOp::Le,
            TokenKind::Ge => ConstraintOp::Ge,
            TokenKind::Eq => ConstraintOp::Eq,
            _ => return Err(self.unexpected("<=, >= or =")),
        };
        self.advance();
        let rhs = self.parse_expr()?;

        let span = Span::new(start, self.last_end(start));
        self.end_of_line()?;
        Ok(ConstraintDecl {
            span,
            name,
            lhs,
            op,
            rhs,
        })
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let keyword = self.advance().ok_or(ParseError::UnexpectedEof)?;
        let kind = match keyword.kind {
            TokenKind::Int => DeclarationKind::Int,
            _ => DeclarationKind::Var,
        };

        let mut names = vec![self.expect(TokenKind::Ident)?.text];
        loop {
            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                    names.push(self.expect(TokenKind::Ident)?.text);
                }
                TokenKind::Ident => {
                    names.push(self.expect(TokenKind::Ident)?.text);
                }
                _ => break,
            }
        }

        let span = Span::new(keyword.span.start, self.last_end(keyword.span.end));
        self.end_of_line()?;
        Ok(Declaration { span, kind, names })
    }

    /// Consume any run of `+`/`-` and return the resulting sign.
    fn parse_signs(&mut self) -> f64 {
        let mut sign = 1.0;
        loop {
            match self.peek_kind() {
                TokenKind::Plus => {}
                TokenKind::Minus => sign = -sign,
                _ => return sign,
            }
            self.advance();
            self.skip_newlines();
        }
    }

    fn parse_expr(&mut self) -> Result<LinearExpr, ParseError> {
        let mut terms = Vec::new();
        let sign = self.parse_signs();
        terms.push(self.parse_term(sign)?);

        while matches!(self.peek_kind(), TokenKind::Plus | TokenKind::Minus) {
            let sign = self.parse_signs();
            terms.push(self.parse_term(sign)?);
        }

        Ok(LinearExpr { terms })
    }

    /// `3`, `x1`, `3 x1`, `3 * x1` or `x1 * 3`
    fn parse_term(&mut self, sign: f64) -> Result<Term, ParseError> {
        match self.peek_kind() {
            TokenKind::Number => {
                let number = self.expect(TokenKind::Number)?;
                let coefficient = parse_number(&number)?;
                let variable = match self.peek_kind() {
                    TokenKind::Star => {
                        self.advance();
                        Some(self.expect(TokenKind::Ident)?)
                    }
                    TokenKind::Ident => Some(self.expect(TokenKind::Ident)?),
                    _ => None,
                };
                let end = variable.as_ref().map_or(number.span.end, |v| v.span.end);
                Ok(Term {
                    span: Span::new(number.span.start, end),
                    coefficient: sign * coefficient,
                    variable: variable.map(|v| v.text),
                })
            }
            TokenKind::Ident => {
                let ident = self.expect(TokenKind::Ident)?;
                let mut coefficient = 1.0;
                let mut span = ident.span;
                if self.peek_kind() == TokenKind::Star {
                    self.advance();
                    let number = self.expect(TokenKind::Number)?;
                    coefficient = parse_number(&number)?;
                    span = span.merge(number.span);
                }
                Ok(Term {
                    span,
                    coefficient: sign * coefficient,
                    variable: Some(ident.text),
                })
            }
            _ => Err(self.unexpected("number or variable")),
        }
    }
}

fn parse_number(token: &Token) -> Result<f64, ParseError> {
    token
        .text
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(token.text.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(expr: &LinearExpr) -> Vec<(Option<&str>, f64)> {
        expr.terms
            .iter()
            .map(|t| (t.variable.as_deref(), t.coefficient))
            .collect()
    }

    #[test]
    fn test_parse_objective() {
        let program = Parser::parse("maximize: 3x1 + 2 * x2 - x3").unwrap();
        let objective = program.objective().unwrap();
        assert_eq!(objective.sense, Sense::Maximize);
        assert_eq!(
            terms(&objective.expr),
            vec![(Some("x1"), 3.0), (Some("x2"), 2.0), (Some("x3"), -1.0)]
        );
        assert_eq!(objective.span, Span::new(0, 27));
    }

    #[test]
    fn test_parse_full_program() {
        let source = r#"
            // small production plan
            minimize x1 + x2
            subject to:
              demand: x1 + x2 >= 10
              x1 - x2 = 2
              2.5 * x1 <= x2 * 4 + 1
            int x1, x2
            var x3
        "#;
        let program = Parser::parse(source).unwrap();
        let constraints: Vec<_> = program.constraints().collect();
        assert_eq!(constraints.len(), 3);
        assert_eq!(constraints[0].name.as_deref(), Some("demand"));
        assert_eq!(constraints[0].op, ConstraintOp::Ge);
        assert_eq!(constraints[1].name, None);
        assert_eq!(constraints[1].op, ConstraintOp::Eq);
        assert_eq!(terms(&constraints[2].lhs), vec![(Some("x1"), 2.5)]);
        assert_eq!(terms(&constraints[2].rhs), vec![(Some("x2"), 4.0), (None, 1.0)]);

        let declarations: Vec<_> = program.declarations().collect();
        assert_eq!(declarations[0].kind, DeclarationKind::Int);
        assert_eq!(declarations[0].names, vec!["x1", "x2"]);
        assert_eq!(declarations[1].kind, DeclarationKind::Var);
    }

    #[test]
    fn test_signs_and_constants() {
        let program = Parser::parse("max x\n- -x + 3 - 2 <= -1").unwrap();
        let c = program.constraints().next().unwrap();
        assert_eq!(terms(&c.lhs), vec![(Some("x"), 1.0), (None, 3.0), (None, -2.0)]);
        assert_eq!(c.rhs.constant(), -1.0);
    }

    #[test]
    fn test_st_header() {
        let program = Parser::parse("min x\ns.t.\nx >= 1\nst\nx <= 2").unwrap();
        assert_eq!(program.constraints().count(), 2);
    }

    #[test]
    fn test_missing_objective() {
        assert_eq!(Parser::parse("x1 <= 4"), Err(ParseError::MissingObjective));
    }

    #[test]
    fn test_duplicate_objective() {
        let err = Parser::parse("max x\nmin x").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateObjective(_)));
    }

    #[test]
    fn test_missing_operator() {
        let err = Parser::parse("max x\nx + 4").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof);

        let err = Parser::parse("max x\nx + 4 5").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, .. } => assert_eq!(expected, "<=, >= or ="),
            other => panic!("Expected unexpected token, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = Parser::parse("max x\nx <= 4 5").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, span, .. } => {
                assert_eq!(expected, "end of line");
                assert_eq!(span, Span::new(13, 14));
            }
            other => panic!("Expected unexpected token, got {other:?}"),
        }
    }
}
