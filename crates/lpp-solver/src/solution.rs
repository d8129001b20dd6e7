use crate::problem::Model;

/// The result of solving an LP/MIP model
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Value of each variable, `values[0]` is `x1`. Empty unless a feasible
    /// point is known.
    pub values: Vec<f64>,
    /// Objective value in the model's own direction
    pub objective_value: f64,
    /// Branch-and-bound nodes whose relaxation was solved
    pub nodes_explored: usize,
    /// Simplex pivots across all relaxations
    pub iterations: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// No point satisfies all constraints (and integrality)
    Infeasible,
    /// The objective can improve without limit
    Unbounded,
    /// The cancellation token fired before the search finished
    Cancelled,
    /// A relaxation exceeded the simplex iteration cap
    IterationLimit,
}

impl SolutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "Optimal",
            SolutionStatus::Infeasible => "Infeasible",
            SolutionStatus::Unbounded => "Unbounded",
            SolutionStatus::Cancelled => "Cancelled",
            SolutionStatus::IterationLimit => "Iteration limit",
        }
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Solution {
    pub(crate) fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            nodes_explored: 0,
            iterations: 0,
        }
    }

    pub(crate) fn without_values(status: SolutionStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
            nodes_explored: 0,
            iterations: 0,
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolutionStatus::Infeasible)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolutionStatus::Unbounded)
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Value of the 1-based `variable`, if the solution carries values
    pub fn value(&self, variable: usize) -> Option<f64> {
        variable.checked_sub(1).and_then(|i| self.values.get(i)).copied()
    }

    /// `(name, value)` pairs in variable order, e.g. `("x1", 5.0)`
    pub fn assignment(&self) -> impl Iterator<Item = (String, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (Model::variable_name(i), v))
    }

    pub(crate) fn with_stats(mut self, nodes_explored: usize, iterations: usize) -> Self {
        self.nodes_explored = nodes_explored;
        self.iterations = iterations;
        self
    }
}

/// Snaps integer-domain values to the nearest integer and recomputes the
/// objective when every variable is integer, so the reported objective matches
/// the reported assignment exactly.
pub(crate) fn finalize_values(model: &Model, mut values: Vec<f64>) -> (Vec<f64>, f64) {
    for (v, domain) in values.iter_mut().zip(model.domains()) {
        if *domain == crate::problem::Domain::Integer {
            *v = v.round();
        }
        // Avoid reporting -0
        if *v == 0.0 {
            *v = 0.0;
        }
    }
    let mut objective = model.objective().dot(&values);
    if model.is_all_integer() && model.objective().coefficients().iter().all(|c| c.fract() == 0.0) {
        objective = objective.round();
    }
    if objective == 0.0 {
        objective = 0.0;
    }
    (values, objective)
}
