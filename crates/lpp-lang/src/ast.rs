use lpp_solver::{LinearExpression, Relation};

use crate::lexer::Span;
use crate::parser::ParseError;

/// One `coefficient * variable` term, sign already applied
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub span: Span,
    pub coefficient: f64,
    /// 1-based variable index as written
    pub variable: usize,
    /// Variable as written, e.g. `x3`
    pub name: String,
}

/// Sum of terms, in source order
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub terms: Vec<Term>,
}

impl Expr {
    /// Dense coefficient vector over `var_count` variables. Repeated
    /// variables accumulate.
    pub fn to_linear(&self, var_count: usize) -> Result<LinearExpression, ParseError> {
        let mut linear = LinearExpression::zeros(var_count);
        for term in &self.terms {
            if term.variable == 0 || term.variable > var_count {
                return Err(ParseError::VariableOutOfRange {
                    text: term.name.clone(),
                    var_count,
                    span: term.span,
                });
            }
            linear.add_term(term.variable, term.coefficient);
        }
        Ok(linear)
    }
}

/// `lhs <relation> rhs`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintExpr {
    pub lhs: Expr,
    pub relation: Relation,
    pub rhs: f64,
}
