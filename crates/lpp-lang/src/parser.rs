use lpp_solver::Relation;
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Lexer, Span, Token, TokenKind};

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found '{found}' at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of expression: {0}")]
    UnexpectedEof(String),
    #[error("Expression is empty")]
    EmptyExpression,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Variable marker '{text}' has no index at position {span:?}")]
    MissingVariableIndex { text: String, span: Span },
    #[error("Variable {text} is out of range, expected x1..x{var_count}")]
    VariableOutOfRange {
        text: String,
        var_count: usize,
        span: Span,
    },
    #[error("Constant term '{text}' is not supported, every term needs a variable")]
    ConstantTerm { text: String, span: Span },
    #[error("Missing relation (<=, >= or =) in constraint: {0}")]
    MissingRelation(String),
    #[error("Expected exactly one relation (<=, >= or =) in constraint: {0}")]
    DuplicateRelation(String),
    #[error("Invalid right-hand side '{rhs}' in constraint: {constraint}")]
    InvalidRhs { rhs: String, constraint: String },
}

/// Relation operators in match order. The two-character operators come first
/// so `=` never matches inside `<=` or `>=`.
const RELATIONS: [(&str, Relation); 3] = [
    ("<=", Relation::Le),
    (">=", Relation::Ge),
    ("=", Relation::Eq),
];

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Lexer::tokenize(source),
            pos: 0,
        }
    }

    /// Parse a linear expression such as `3x1 - 2.5*x2 + x1`
    pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
        Parser::new(source).parse_expr()
    }

    /// Split a constraint on its single relation and parse both sides
    pub fn parse_constraint(source: &str) -> Result<ConstraintExpr, ParseError> {
        let Some((op, relation)) = RELATIONS.into_iter().find(|(op, _)| source.contains(op)) else {
            return Err(ParseError::MissingRelation(source.to_string()));
        };
        let Some((lhs, rhs)) = source.split_once(op) else {
            return Err(ParseError::MissingRelation(source.to_string()));
        };

        let is_relation_char = |c: char| matches!(c, '<' | '>' | '=');
        if lhs.contains(is_relation_char) || rhs.contains(is_relation_char) {
            return Err(ParseError::DuplicateRelation(source.to_string()));
        }

        let rhs_text = rhs.trim();
        let rhs_value = rhs_text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidRhs {
                rhs: rhs_text.to_string(),
                constraint: source.to_string(),
            })?;

        // `lhs` is a prefix of `source`, so its spans are valid for both
        let lhs = Parser::parse_expression(lhs)?;

        Ok(ConstraintExpr {
            lhs,
            relation,
            rhs: rhs_value,
        })
    }

    fn current(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        if token.kind == TokenKind::Eof {
            return ParseError::UnexpectedEof(self.source.to_string());
        }
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.text.clone(),
            span: token.span,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut terms: Vec<Term> = Vec::new();

        loop {
            // A run of signs combines: `- -x1` is `+x1`
            let mut sign = 1.0;
            let mut saw_sign = false;
            while matches!(self.peek_kind(), TokenKind::Plus | TokenKind::Minus) {
                if self.advance().kind == TokenKind::Minus {
                    sign = -sign;
                }
                saw_sign = true;
            }

            if self.peek_kind() == TokenKind::Eof {
                if terms.is_empty() {
                    return Err(ParseError::EmptyExpression);
                }
                if saw_sign {
                    return Err(self.unexpected("term"));
                }
                break;
            }

            if !terms.is_empty() && !saw_sign {
                return Err(self.unexpected("'+' or '-'"));
            }

            terms.push(self.parse_term(sign)?);
        }

        let end = self.current().span;
        Ok(Expr {
            span: start.merge(end),
            terms,
        })
    }

    fn parse_term(&mut self, sign: f64) -> Result<Term, ParseError> {
        let start = self.current().span;

        let mut coefficient = 1.0;
        let mut literal: Option<Token> = None;
        let mut saw_star = false;
        if self.peek_kind() == TokenKind::Number {
            let token = self.advance();
            coefficient = token
                .text
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber(token.text.clone()))?;
            literal = Some(token);
            if self.peek_kind() == TokenKind::Star {
                self.advance();
                saw_star = true;
            }
        }

        if self.peek_kind() != TokenKind::Variable {
            return match (&literal, self.peek_kind()) {
                (Some(number), TokenKind::Plus | TokenKind::Minus | TokenKind::Eof) if !saw_star => {
                    Err(ParseError::ConstantTerm {
                        text: number.text.clone(),
                        span: number.span,
                    })
                }
                _ => Err(self.unexpected("variable")),
            };
        }

        let token = self.advance();
        let digits = &token.text[1..];
        if digits.is_empty() {
            return Err(ParseError::MissingVariableIndex {
                text: token.text.clone(),
                span: token.span,
            });
        }
        // Indices too large for usize are out of range for any model
        let variable = digits.parse::<usize>().unwrap_or(usize::MAX);

        Ok(Term {
            span: start.merge(token.span),
            coefficient: sign * coefficient,
            variable,
            name: format!("x{}", digits),
        })
    }
}
