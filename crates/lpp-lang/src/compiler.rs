use log::debug;
use lpp_solver::{Constraint, Direction, Domain, Model, ModelError};
use thiserror::Error;

use crate::parser::{ParseError, Parser};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Objective: {0}")]
    Objective(ParseError),
    #[error("Constraint {index}: {source}")]
    Constraint { index: usize, source: ParseError },
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("Integer variable x{index} is outside x1..x{var_count}")]
    IntegerOutOfRange { index: usize, var_count: usize },
}

/// A problem as entered by a user: one objective string, one string per
/// constraint, and a domain per variable
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemText {
    pub var_count: usize,
    pub objective: String,
    pub direction: Direction,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Vec<String>,
    /// Empty means every variable is continuous
    #[cfg_attr(feature = "serde", serde(default))]
    pub domains: Vec<Domain>,
}

impl ProblemText {
    pub fn new(var_count: usize, objective: impl Into<String>, direction: Direction) -> Self {
        Self {
            var_count,
            objective: objective.into(),
            direction,
            constraints: Vec::new(),
            domains: Vec::new(),
        }
    }

    pub fn constraint(mut self, text: impl Into<String>) -> Self {
        self.constraints.push(text.into());
        self
    }

    /// Marks the 1-based `variables` as integer
    pub fn integers(mut self, variables: &[usize]) -> Result<Self, CompileError> {
        if self.domains.is_empty() {
            self.domains = vec![Domain::Continuous; self.var_count];
        }
        for &index in variables {
            let domain = index
                .checked_sub(1)
                .and_then(|i| self.domains.get_mut(i))
                .ok_or(CompileError::IntegerOutOfRange {
                    index,
                    var_count: self.var_count,
                })?;
            *domain = Domain::Integer;
        }
        Ok(self)
    }
}

/// Compiled representation of a problem ready for solving
#[derive(Debug, Clone)]
pub struct CompiledProblem {
    /// Variable names, `x1..xN`
    pub variables: Vec<String>,
    /// Source text of each kept constraint, in model order
    pub constraints: Vec<String>,
    pub model: Model,
}

/// Compiler for converting problem text to models
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Parse every field and build the model. Blank constraint strings are
    /// skipped; the first malformed field aborts compilation.
    pub fn compile(&self, problem: &ProblemText) -> Result<CompiledProblem, CompileError> {
        let n = problem.var_count;

        let objective = Parser::parse_expression(&problem.objective)
            .and_then(|expr| expr.to_linear(n))
            .map_err(CompileError::Objective)?;

        let mut constraints = Vec::new();
        let mut sources = Vec::new();
        for (i, text) in problem.constraints.iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            let to_error = |source: ParseError| CompileError::Constraint { index: i + 1, source };
            let parsed = Parser::parse_constraint(text).map_err(to_error)?;
            let lhs = parsed.lhs.to_linear(n).map_err(to_error)?;
            constraints.push(Constraint::new(lhs, parsed.relation, parsed.rhs));
            sources.push(text.trim().to_string());
        }

        let domains = if problem.domains.is_empty() {
            vec![Domain::Continuous; n]
        } else {
            problem.domains.clone()
        };

        let model = Model::build(objective, problem.direction, constraints, domains)?;
        debug!(
            "compiled problem: {} variables, {} constraints",
            model.num_variables(),
            model.num_constraints()
        );

        Ok(CompiledProblem {
            variables: (0..n).map(Model::variable_name).collect(),
            constraints: sources,
            model,
        })
    }
}
