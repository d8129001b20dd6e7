mod branch;
mod cancel;
mod problem;
mod simplex;
mod solution;

pub use cancel::CancelToken;
pub use problem::{Constraint, Direction, Domain, LinearExpression, Model, ModelError, Relation};
pub use simplex::{PivotRule, Relaxation, Solver};
pub use solution::{Solution, SolutionStatus};

/// Build a model and solve it with the default solver settings.
///
/// Dimension mismatches are reported before any solving starts. Without a
/// cancellation token the search runs to completion.
pub fn solve(
    objective: LinearExpression,
    direction: Direction,
    constraints: Vec<Constraint>,
    domains: Vec<Domain>,
    cancel: Option<&CancelToken>,
) -> Result<Solution, ModelError> {
    let model = Model::build(objective, direction, constraints, domains)?;
    let never = CancelToken::new();
    Ok(Solver::new().solve(&model, cancel.unwrap_or(&never)))
}
