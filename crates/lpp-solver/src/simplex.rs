use log::debug;

use crate::cancel::CancelToken;
use crate::problem::{Direction, Model, Relation};
use crate::solution::{Solution, SolutionStatus, finalize_values};

/// Rule for choosing the entering column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotRule {
    /// Most negative reduced cost, switching to Bland's rule after a run of
    /// degenerate pivots
    Dantzig,
    /// Lowest-index column with negative reduced cost
    Bland,
}

/// Outcome of solving the continuous relaxation of a model. Every variant
/// carries the pivots spent reaching it.
#[derive(Debug, Clone, PartialEq)]
pub enum Relaxation {
    Optimal {
        values: Vec<f64>,
        objective_value: f64,
        iterations: usize,
    },
    Infeasible { iterations: usize },
    Unbounded { iterations: usize },
    IterationLimit { iterations: usize },
}

impl Relaxation {
    pub fn iterations(&self) -> usize {
        match self {
            Relaxation::Optimal { iterations, .. }
            | Relaxation::Infeasible { iterations }
            | Relaxation::Unbounded { iterations }
            | Relaxation::IterationLimit { iterations } => *iterations,
        }
    }
}

/// Simplex solver with branch-and-bound for integer variables
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots per relaxation (both phases) before giving up
    pub(crate) max_iterations: usize,
    /// Tolerance for floating point comparisons
    pub(crate) tolerance: f64,
    /// How far from an integer a value may be and still count as integral
    pub(crate) integrality_tolerance: f64,
    pub(crate) pivot_rule: PivotRule,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            integrality_tolerance: 1e-6,
            pivot_rule: PivotRule::Dantzig,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    pub fn with_pivot_rule(mut self, rule: PivotRule) -> Self {
        self.pivot_rule = rule;
        self
    }

    /// Solve the model, running branch-and-bound if any variable is integer
    pub fn solve(&self, model: &Model, cancel: &CancelToken) -> Solution {
        if model.has_integer_variables() {
            return self.branch_and_bound(model, cancel);
        }

        if cancel.is_cancelled() {
            return Solution::without_values(SolutionStatus::Cancelled);
        }

        let solution = match self.relax(model) {
            Relaxation::Optimal { values, iterations, .. } => {
                let (values, objective_value) = finalize_values(model, values);
                Solution::optimal(values, objective_value).with_stats(1, iterations)
            }
            Relaxation::Infeasible { iterations } => Solution::infeasible().with_stats(1, iterations),
            Relaxation::Unbounded { iterations } => Solution::unbounded().with_stats(1, iterations),
            Relaxation::IterationLimit { iterations } => {
                Solution::without_values(SolutionStatus::IterationLimit).with_stats(1, iterations)
            }
        };
        log::info!("LP solved: {}", solution.status);
        solution
    }

    /// Solve the continuous relaxation of the model with the two-phase simplex
    /// method. Integer domains are ignored.
    pub fn relax(&self, model: &Model) -> Relaxation {
        let mut tableau = self.build_tableau(model);
        let mut iterations = 0;

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, &mut iterations) {
                PhaseResult::Optimal => {}
                PhaseResult::Unbounded | PhaseResult::Infeasible => {
                    return Relaxation::Infeasible { iterations };
                }
                PhaseResult::IterationLimit => return Relaxation::IterationLimit { iterations },
            }
        }

        // Phase 2: Optimize
        self.set_phase2_objective(&mut tableau, model);
        let art_start = tableau.artificial_start();
        match self.run(&mut tableau, art_start, &mut iterations) {
            PhaseResult::Optimal => {}
            PhaseResult::Unbounded => return Relaxation::Unbounded { iterations },
            PhaseResult::Infeasible => return Relaxation::Infeasible { iterations },
            PhaseResult::IterationLimit => return Relaxation::IterationLimit { iterations },
        }

        let values = self.extract_values(&tableau);
        let objective_value = model.objective().dot(&values);
        debug!(
            "relaxation optimal after {} pivots, obj.: {}",
            iterations, objective_value
        );

        Relaxation::Optimal {
            values,
            objective_value,
            iterations,
        }
    }

    fn build_tableau(&self, model: &Model) -> Tableau {
        let n_vars = model.num_variables();
        let n_constraints = model.num_constraints();

        // Rows with a negative RHS are negated first, which flips the relation
        let rows: Vec<(f64, Relation)> = model
            .constraints()
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    let flipped = match c.relation {
                        Relation::Le => Relation::Ge,
                        Relation::Ge => Relation::Le,
                        Relation::Eq => Relation::Eq,
                    };
                    (-1.0, flipped)
                } else {
                    (1.0, c.relation)
                }
            })
            .collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;
        for (_, relation) in &rows {
            match relation {
                Relation::Le => n_slack += 1,
                Relation::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                Relation::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        let rhs_col = total_cols - 1;
        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (c, (sign, relation))) in model.constraints().iter().zip(&rows).enumerate() {
            for (j, &coef) in c.lhs.coefficients().iter().enumerate() {
                tableau.data[i][j] = sign * coef;
            }
            tableau.data[i][rhs_col] = sign * c.rhs;

            match relation {
                Relation::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                Relation::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                Relation::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        tableau
    }

    /// Minimize the sum of artificial variables. On success every artificial
    /// is zero and, where possible, out of the basis.
    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize) -> PhaseResult {
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();
        let art_start = tableau.artificial_start();
        let rhs_col = n_cols - 1;

        // Reduced costs of "minimize sum of artificials" with the artificial
        // basis priced out: d_j = -sum of a_ij over artificial rows
        tableau.data[obj_row].fill(0.0);
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    if j < art_start || j == rhs_col {
                        tableau.data[obj_row][j] -= tableau.data[i][j];
                    }
                }
            }
        }

        match self.run(tableau, rhs_col, iterations) {
            PhaseResult::Optimal => {}
            other => return other,
        }

        // The RHS cell of the objective row holds minus the current sum
        let infeasibility = -tableau.data[obj_row][rhs_col];
        debug!("phase 1 finished, sum of artificials: {}", infeasibility);
        if infeasibility > self.tolerance {
            return PhaseResult::Infeasible;
        }

        // Drive zero-valued artificials out of the basis
        for i in 0..obj_row {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let col = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            if let Some(col) = col {
                self.pivot(tableau, i, col);
            } else {
                debug!("constraint row {} is redundant", i + 1);
            }
        }

        PhaseResult::Optimal
    }

    /// Install the (minimization) objective and price out the current basis
    fn set_phase2_objective(&self, tableau: &mut Tableau, model: &Model) {
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();
        let sign = match model.direction() {
            Direction::Minimize => 1.0,
            Direction::Maximize => -1.0,
        };

        tableau.data[obj_row].fill(0.0);
        for (j, &coef) in model.objective().coefficients().iter().enumerate() {
            tableau.data[obj_row][j] = sign * coef;
        }

        for i in 0..obj_row {
            let basic = tableau.basic_vars[i];
            let cost = tableau.data[obj_row][basic];
            if cost.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] -= cost * tableau.data[i][j];
                }
            }
        }
    }

    /// Pivot until no column below `exclude_from` has a negative reduced cost
    fn run(&self, tableau: &mut Tableau, exclude_from: usize, iterations: &mut usize) -> PhaseResult {
        let mut rule = self.pivot_rule;
        let mut degenerate_run = 0;
        let degenerate_limit = tableau.obj_row().max(10);
        let rhs_col = tableau.n_cols() - 1;

        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from, rule) else {
                return PhaseResult::Optimal;
            };
            if *iterations >= self.max_iterations {
                debug!("iteration limit of {} reached", self.max_iterations);
                return PhaseResult::IterationLimit;
            }
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return PhaseResult::Unbounded;
            };

            if tableau.data[pivot_row][rhs_col].abs() <= self.tolerance {
                degenerate_run += 1;
                if rule == PivotRule::Dantzig && degenerate_run > degenerate_limit {
                    debug!("{} degenerate pivots in a row, switching to Bland's rule", degenerate_run);
                    rule = PivotRule::Bland;
                }
            } else {
                degenerate_run = 0;
            }

            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize, rule: PivotRule) -> Option<usize> {
        let obj_row = &tableau.data[tableau.obj_row()];
        let candidates = obj_row[..exclude_from]
            .iter()
            .enumerate()
            .filter(|(_, d)| **d < -self.tolerance);

        match rule {
            PivotRule::Bland => candidates.map(|(j, _)| j).next(),
            PivotRule::Dantzig => {
                // Strict comparison keeps the lowest index on ties
                let mut best: Option<(usize, f64)> = None;
                for (j, &d) in candidates {
                    if best.is_none_or(|(_, b)| d < b) {
                        best = Some((j, d));
                    }
                }
                best.map(|(j, _)| j)
            }
        }
    }

    /// Minimum-ratio test, ties broken by the lowest basic variable index
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.n_cols() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(r) => {
                    ratio < min_ratio - self.tolerance
                        || (ratio <= min_ratio + self.tolerance
                            && tableau.basic_vars[i] < tableau.basic_vars[r])
                }
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_cols = tableau.n_cols();

        tableau.basic_vars[row] = col;

        // Scale pivot row
        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = tableau.data[row].clone();
        for (i, r) in tableau.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor == 0.0 {
                continue;
            }
            for (x, p) in r.iter_mut().zip(&pivot_row) {
                *x -= factor * p;
            }
        }
    }

    fn extract_values(&self, tableau: &Tableau) -> Vec<f64> {
        let rhs_col = tableau.n_cols() - 1;
        let mut values = vec![0.0; tableau.n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < tableau.n_vars {
                let v = tableau.data[i][rhs_col];
                values[basic] = if v.abs() < self.tolerance { 0.0 } else { v };
            }
        }
        values
    }
}

/// Dense simplex tableau. The last row holds reduced costs of the current
/// minimization objective, with minus the objective value in the RHS cell.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    fn artificial_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum PhaseResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}
