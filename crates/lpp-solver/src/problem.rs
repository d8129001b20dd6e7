use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model must declare at least one variable")]
    NoVariables,
    #[error("Objective has {found} coefficients but the model has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {index} has {found} coefficients but the model has {expected} variables")]
    ConstraintLength {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite value in {0}")]
    NonFiniteCoefficient(String),
}

/// Dense coefficient vector over the variables `x1..xN`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearExpression {
    coefficients: Vec<f64>,
}

impl LinearExpression {
    /// All-zero expression over `var_count` variables
    pub fn zeros(var_count: usize) -> Self {
        Self {
            coefficients: vec![0.0; var_count],
        }
    }

    pub fn from_coefficients(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Adds `coefficient` to the slot of the 1-based `variable`.
    ///
    /// Panics if `variable` is 0 or greater than [`len`](Self::len).
    pub fn add_term(&mut self, variable: usize, coefficient: f64) {
        self.coefficients[variable - 1] += coefficient;
    }

    /// Coefficient of the 1-based `variable`, 0 when out of range
    pub fn coefficient(&self, variable: usize) -> f64 {
        variable
            .checked_sub(1)
            .and_then(|i| self.coefficients.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Evaluates the expression at `values`
    pub fn dot(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(c, v)| c * v)
            .sum()
    }
}

impl From<Vec<f64>> for LinearExpression {
    fn from(coefficients: Vec<f64>) -> Self {
        Self::from_coefficients(coefficients)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    #[default]
    Continuous,
    Integer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Left-hand side coefficients
    pub lhs: LinearExpression,
    /// Comparison operator
    pub relation: Relation,
    /// Right-hand side value
    pub rhs: f64,
}

impl Constraint {
    pub fn new(lhs: impl Into<LinearExpression>, relation: Relation, rhs: f64) -> Self {
        Self {
            lhs: lhs.into(),
            relation,
            rhs,
        }
    }

    /// Whether `values` satisfy the constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.dot(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Normalized form, e.g. `3x1 - x2 <= 4`
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (j, &c) in self.lhs.coefficients().iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            match (first, c < 0.0) {
                (true, true) => write!(f, "-")?,
                (true, false) => {}
                (false, true) => write!(f, " - ")?,
                (false, false) => write!(f, " + ")?,
            }
            if c.abs() != 1.0 {
                write!(f, "{}", c.abs())?;
            }
            write!(f, "{}", Model::variable_name(j))?;
            first = false;
        }
        if first {
            write!(f, "0")?;
        }
        write!(f, " {} {}", self.relation.symbol(), self.rhs)
    }
}

/// A validated LP/MIP model. All variables are non-negative.
#[derive(Debug, Clone)]
pub struct Model {
    objective: LinearExpression,
    direction: Direction,
    constraints: Vec<Constraint>,
    domains: Vec<Domain>,
}

impl Model {
    /// Assembles a model, checking that every vector matches the variable
    /// count given by `domains`.
    pub fn build(
        objective: LinearExpression,
        direction: Direction,
        constraints: Vec<Constraint>,
        domains: Vec<Domain>,
    ) -> Result<Self, ModelError> {
        let n = domains.len();
        if n == 0 {
            return Err(ModelError::NoVariables);
        }
        if objective.len() != n {
            return Err(ModelError::ObjectiveLength {
                expected: n,
                found: objective.len(),
            });
        }
        if objective.coefficients().iter().any(|c| !c.is_finite()) {
            return Err(ModelError::NonFiniteCoefficient("objective".to_string()));
        }

        for (i, c) in constraints.iter().enumerate() {
            if c.lhs.len() != n {
                return Err(ModelError::ConstraintLength {
                    index: i + 1,
                    expected: n,
                    found: c.lhs.len(),
                });
            }
            if !c.rhs.is_finite() || c.lhs.coefficients().iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFiniteCoefficient(format!("constraint {}", i + 1)));
            }
        }

        Ok(Self {
            objective,
            direction,
            constraints,
            domains,
        })
    }

    /// Copy of this model with extra constraints appended. Used for
    /// branch-and-bound sub-models; `self` is left untouched.
    pub(crate) fn with_extra_constraints(&self, extra: impl IntoIterator<Item = Constraint>) -> Model {
        let mut constraints = self.constraints.clone();
        constraints.extend(extra);
        Model {
            objective: self.objective.clone(),
            direction: self.direction,
            constraints,
            domains: self.domains.clone(),
        }
    }

    pub fn objective(&self) -> &LinearExpression {
        &self.objective
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn num_variables(&self) -> usize {
        self.domains.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integer_variables(&self) -> bool {
        self.domains.contains(&Domain::Integer)
    }

    pub fn is_all_integer(&self) -> bool {
        self.domains.iter().all(|d| *d == Domain::Integer)
    }

    /// Variable name for a 0-based column, e.g. `x1`
    pub fn variable_name(index: usize) -> String {
        format!("x{}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_checks_lengths() {
        let err = Model::build(
            vec![1.0, 2.0].into(),
            Direction::Maximize,
            vec![],
            vec![Domain::Continuous],
        )
        .unwrap_err();
        assert_eq!(err, ModelError::ObjectiveLength { expected: 1, found: 2 });

        let err = Model::build(
            vec![1.0].into(),
            Direction::Maximize,
            vec![
                Constraint::new(vec![1.0], Relation::Le, 5.0),
                Constraint::new(vec![1.0, 1.0], Relation::Le, 5.0),
            ],
            vec![Domain::Continuous],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::ConstraintLength {
                index: 2,
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_build_rejects_empty_and_non_finite() {
        let err = Model::build(LinearExpression::zeros(0), Direction::Minimize, vec![], vec![]).unwrap_err();
        assert_eq!(err, ModelError::NoVariables);

        let err = Model::build(
            vec![1.0].into(),
            Direction::Minimize,
            vec![Constraint::new(vec![1.0], Relation::Ge, f64::NAN)],
            vec![Domain::Integer],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::NonFiniteCoefficient(_)));
    }

    #[test]
    fn test_linear_expression_terms() {
        let mut expr = LinearExpression::zeros(3);
        expr.add_term(1, 2.0);
        expr.add_term(3, -1.5);
        expr.add_term(1, 0.5);
        assert_eq!(expr.coefficients(), &[2.5, 0.0, -1.5]);
        assert_eq!(expr.coefficient(1), 2.5);
        assert_eq!(expr.coefficient(0), 0.0);
        assert_eq!(expr.coefficient(4), 0.0);
        assert_eq!(expr.dot(&[2.0, 7.0, 2.0]), 2.0);
    }

    #[test]
    fn test_constraint_satisfaction() {
        let c = Constraint::new(vec![1.0, 1.0], Relation::Eq, 4.0);
        assert!(c.is_satisfied(&[1.0, 3.0], 1e-9));
        assert!(!c.is_satisfied(&[1.0, 2.0], 1e-9));
        let c = Constraint::new(vec![2.0, 0.0], Relation::Ge, 4.0);
        assert!(c.is_satisfied(&[2.0, 0.0], 1e-9));
        assert!(!c.is_satisfied(&[1.9, 0.0], 1e-9));
    }

    #[test]
    fn test_constraint_display() {
        let c = Constraint::new(vec![3.0, -1.0, 0.0, 0.5], Relation::Le, 4.0);
        assert_eq!(c.to_string(), "3x1 - x2 + 0.5x4 <= 4");
        let c = Constraint::new(vec![-1.0, 1.0], Relation::Ge, -2.5);
        assert_eq!(c.to_string(), "-x1 + x2 >= -2.5");
        let c = Constraint::new(vec![0.0], Relation::Eq, 0.0);
        assert_eq!(c.to_string(), "0 = 0");
    }
}
