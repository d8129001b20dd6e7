pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use compiler::{CompileError, CompiledProblem, Compiler, ProblemText};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};

use lpp_solver::{LinearExpression, Relation};

/// Parse an objective such as `3x1 + 2x2` into coefficients over `var_count`
/// variables
pub fn parse_objective(text: &str, var_count: usize) -> Result<LinearExpression, ParseError> {
    Parser::parse_expression(text)?.to_linear(var_count)
}

/// Parse a constraint such as `2x1 + 3x2 <= 5` into its left-hand side,
/// relation and right-hand side
pub fn parse_constraint(
    text: &str,
    var_count: usize,
) -> Result<(LinearExpression, Relation, f64), ParseError> {
    let constraint = Parser::parse_constraint(text)?;
    Ok((constraint.lhs.to_linear(var_count)?, constraint.relation, constraint.rhs))
}
