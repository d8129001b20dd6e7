use log::{debug, info};

use crate::cancel::CancelToken;
use crate::problem::{Constraint, Direction, Domain, LinearExpression, Model, Relation};
use crate::simplex::{Relaxation, Solver};
use crate::solution::{Solution, SolutionStatus, finalize_values};

/// Bound added to a variable by one branching step
#[derive(Debug, Clone, Copy)]
enum Bound {
    /// `x <= value`
    Upper(f64),
    /// `x >= value`
    Lower(f64),
}

/// A sub-model in the search tree. Each node owns exactly one added bound and
/// refers to its parent by arena index; nodes are never modified once pushed.
#[derive(Debug)]
struct Node {
    parent: Option<usize>,
    /// 0-based variable and the bound placed on it, `None` for the root
    bound: Option<(usize, Bound)>,
    depth: usize,
}

/// Best integer-feasible point found so far
struct Incumbent {
    /// Objective expressed as a minimization score
    score: f64,
    values: Vec<f64>,
}

impl Solver {
    /// Depth-first branch-and-bound over the integer variables of `model`
    pub(crate) fn branch_and_bound(&self, model: &Model, cancel: &CancelToken) -> Solution {
        let sign = match model.direction() {
            Direction::Minimize => 1.0,
            Direction::Maximize => -1.0,
        };

        let mut arena = vec![Node {
            parent: None,
            bound: None,
            depth: 0,
        }];
        let mut stack = vec![0];
        let mut incumbent: Option<Incumbent> = None;
        let mut nodes_explored = 0;
        let mut iterations = 0;

        loop {
            if cancel.is_cancelled() {
                info!("branch-and-bound cancelled after {} nodes", nodes_explored);
                return self
                    .with_incumbent(model, SolutionStatus::Cancelled, incumbent)
                    .with_stats(nodes_explored, iterations);
            }
            let Some(idx) = stack.pop() else {
                break;
            };

            let Some(sub_model) = self.sub_model(model, &arena, idx) else {
                debug!("node {}: contradictory bounds, pruned", idx);
                continue;
            };

            nodes_explored += 1;
            let relaxation = self.relax(&sub_model);
            iterations += relaxation.iterations();
            let (values, objective_value) = match relaxation {
                Relaxation::Optimal {
                    values,
                    objective_value,
                    ..
                } => (values, objective_value),
                Relaxation::Infeasible { .. } => {
                    debug!("node {}: infeasible, pruned", idx);
                    continue;
                }
                Relaxation::Unbounded { .. } => {
                    info!("branch-and-bound: relaxation of node {} is unbounded", idx);
                    return Solution::unbounded().with_stats(nodes_explored, iterations);
                }
                Relaxation::IterationLimit { .. } => {
                    info!("branch-and-bound: iteration limit reached at node {}", idx);
                    return self
                        .with_incumbent(model, SolutionStatus::IterationLimit, incumbent)
                        .with_stats(nodes_explored, iterations);
                }
            };

            let score = sign * objective_value;
            if let Some(best) = &incumbent {
                if score >= best.score - self.tolerance * best.score.abs().max(1.0) {
                    debug!("node {}: bound {} no better than incumbent, pruned", idx, objective_value);
                    continue;
                }
            }

            let Some((var, value)) = self.most_fractional(model.domains(), &values) else {
                debug!("node {}: new incumbent, obj.: {}", idx, objective_value);
                incumbent = Some(Incumbent { score, values });
                continue;
            };

            let depth = arena[idx].depth + 1;
            debug!(
                "node {}: branching on {} = {} at depth {}",
                idx,
                Model::variable_name(var),
                value,
                depth
            );
            // Pushed last, so the floor branch is explored first
            for bound in [Bound::Lower(value.ceil()), Bound::Upper(value.floor())] {
                arena.push(Node {
                    parent: Some(idx),
                    bound: Some((var, bound)),
                    depth,
                });
                stack.push(arena.len() - 1);
            }
        }

        info!(
            "branch-and-bound finished after {} nodes, incumbent found: {}",
            nodes_explored,
            incumbent.is_some()
        );
        self.with_incumbent(model, SolutionStatus::Optimal, incumbent)
            .with_stats(nodes_explored, iterations)
    }

    /// The root model plus the tightest bounds collected along the node's
    /// chain, or `None` when a lower bound exceeds an upper bound.
    fn sub_model(&self, model: &Model, arena: &[Node], idx: usize) -> Option<Model> {
        let n = model.num_variables();
        let mut lower = vec![0.0_f64; n];
        let mut upper = vec![f64::INFINITY; n];

        let mut current = Some(idx);
        while let Some(i) = current {
            let node = &arena[i];
            match node.bound {
                Some((var, Bound::Upper(v))) => upper[var] = upper[var].min(v),
                Some((var, Bound::Lower(v))) => lower[var] = lower[var].max(v),
                None => {}
            }
            current = node.parent;
        }

        let mut extra = Vec::new();
        for var in 0..n {
            if lower[var] > upper[var] + self.tolerance {
                return None;
            }
            if upper[var].is_finite() {
                extra.push(bound_constraint(n, var, Relation::Le, upper[var]));
            }
            if lower[var] > 0.0 {
                extra.push(bound_constraint(n, var, Relation::Ge, lower[var]));
            }
        }

        Some(model.with_extra_constraints(extra))
    }

    /// The integer variable farthest from an integer value, lowest index on
    /// ties. `None` when every integer variable is integral.
    fn most_fractional(&self, domains: &[Domain], values: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (j, (&value, domain)) in values.iter().zip(domains).enumerate() {
            if *domain != Domain::Integer {
                continue;
            }
            let deviation = (value - value.round()).abs();
            if deviation <= self.integrality_tolerance {
                continue;
            }
            if best.is_none_or(|(_, _, d)| deviation > d) {
                best = Some((j, value, deviation));
            }
        }
        best.map(|(j, value, _)| (j, value))
    }

    fn with_incumbent(&self, model: &Model, status: SolutionStatus, incumbent: Option<Incumbent>) -> Solution {
        match (status, incumbent) {
            (SolutionStatus::Optimal, None) => Solution::infeasible(),
            (status, None) => Solution::without_values(status),
            (status, Some(best)) => {
                let (values, objective_value) = finalize_values(model, best.values);
                let mut solution = Solution::optimal(values, objective_value);
                solution.status = status;
                solution
            }
        }
    }
}

fn bound_constraint(n: usize, var: usize, relation: Relation, rhs: f64) -> Constraint {
    let mut lhs = LinearExpression::zeros(n);
    lhs.add_term(var + 1, 1.0);
    Constraint::new(lhs, relation, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn model(
        objective: Vec<f64>,
        direction: Direction,
        constraints: Vec<Constraint>,
        domains: Vec<Domain>,
    ) -> Model {
        Model::build(LinearExpression::from(objective), direction, constraints, domains).unwrap()
    }

    /// Best objective over all integer points in `[0, limit]^n` that satisfy
    /// the constraints.
    fn brute_force(model: &Model, limit: i64) -> Option<f64> {
        let n = model.num_variables();
        let mut point = vec![0i64; n];
        let mut best: Option<f64> = None;
        loop {
            let values: Vec<f64> = point.iter().map(|&v| v as f64).collect();
            if model.constraints().iter().all(|c| c.is_satisfied(&values, 1e-9)) {
                let obj = model.objective().dot(&values);
                best = Some(match (best, model.direction()) {
                    (None, _) => obj,
                    (Some(b), Direction::Maximize) => b.max(obj),
                    (Some(b), Direction::Minimize) => b.min(obj),
                });
            }

            let mut k = 0;
            loop {
                if k == n {
                    return best;
                }
                point[k] += 1;
                if point[k] <= limit {
                    break;
                }
                point[k] = 0;
                k += 1;
            }
        }
    }

    #[test]
    fn test_integer_knapsack_matches_enumeration() {
        init();
        // Maximize 2x1 + 3x2 s.t. x1 + x2 <= 4
        let m = model(
            vec![2.0, 3.0],
            Direction::Maximize,
            vec![Constraint::new(vec![1.0, 1.0], Relation::Le, 4.0)],
            vec![Domain::Integer, Domain::Integer],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![0.0, 4.0]);
        assert_eq!(solution.objective_value, 12.0);
        assert_eq!(Some(solution.objective_value), brute_force(&m, 4));
    }

    #[test]
    fn test_fractional_relaxation_is_branched() {
        init();
        // Maximize 5x1 + 4x2
        //   6x1 + 4x2 <= 24
        //   x1 + 2x2 <= 6
        // LP optimum (3, 1.5) = 21, integer optimum (4, 0) = 20
        let m = model(
            vec![5.0, 4.0],
            Direction::Maximize,
            vec![
                Constraint::new(vec![6.0, 4.0], Relation::Le, 24.0),
                Constraint::new(vec![1.0, 2.0], Relation::Le, 6.0),
            ],
            vec![Domain::Integer, Domain::Integer],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.objective_value, 20.0);
        assert_eq!(Some(20.0), brute_force(&m, 6));
        assert!(solution.nodes_explored > 1);
        for c in m.constraints() {
            assert!(c.is_satisfied(&solution.values, 1e-6));
        }
    }

    #[test]
    fn test_minimization_matches_enumeration() {
        init();
        // Minimize 3x1 + 5x2 + 4x3
        //   2x1 + 3x2 + x3 >= 7
        //   x1 + x2 + 2x3 >= 5
        //   x1 - x3 = 1
        let m = model(
            vec![3.0, 5.0, 4.0],
            Direction::Minimize,
            vec![
                Constraint::new(vec![2.0, 3.0, 1.0], Relation::Ge, 7.0),
                Constraint::new(vec![1.0, 1.0, 2.0], Relation::Ge, 5.0),
                Constraint::new(vec![1.0, 0.0, -1.0], Relation::Eq, 1.0),
            ],
            vec![Domain::Integer; 3],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(Some(solution.objective_value), brute_force(&m, 8));
        for c in m.constraints() {
            assert!(c.is_satisfied(&solution.values, 1e-6));
        }
    }

    #[test]
    fn test_mixed_model_keeps_continuous_fraction() {
        // Maximize x1 + x2, x1 integer, x2 continuous
        //   2x1 <= 3
        //   2x2 <= 3
        let m = model(
            vec![1.0, 1.0],
            Direction::Maximize,
            vec![
                Constraint::new(vec![2.0, 0.0], Relation::Le, 3.0),
                Constraint::new(vec![0.0, 2.0], Relation::Le, 3.0),
            ],
            vec![Domain::Integer, Domain::Continuous],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values[0], 1.0);
        assert!((solution.values[1] - 1.5).abs() < 1e-9);
        assert!((solution.objective_value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_integer_infeasible() {
        // 2x1 = 1 has no integer solution
        let m = model(
            vec![1.0],
            Direction::Maximize,
            vec![Constraint::new(vec![2.0], Relation::Eq, 1.0)],
            vec![Domain::Integer],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_integer_unbounded() {
        let m = model(vec![1.0], Direction::Maximize, vec![], vec![Domain::Integer]);
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_cancelled_before_start() {
        let m = model(
            vec![2.0, 3.0],
            Direction::Maximize,
            vec![Constraint::new(vec![1.0, 1.0], Relation::Le, 4.0)],
            vec![Domain::Integer, Domain::Integer],
        );
        let token = CancelToken::with_timeout(Duration::ZERO);
        let solution = Solver::new().solve(&m, &token);
        assert_eq!(solution.status, SolutionStatus::Cancelled);
        assert_eq!(solution.nodes_explored, 0);
    }

    #[test]
    fn test_iteration_limit_keeps_incumbent() {
        init();
        // Maximize x1 - 2x2, x1 integer
        //   x1 - x2 <= 1.5
        //   x1 + x2 <= 10
        // The root and the x1 <= 1 node each take one pivot and the latter
        // yields the incumbent (1, 0). The x1 >= 2 node needs two.
        let m = model(
            vec![1.0, -2.0],
            Direction::Maximize,
            vec![
                Constraint::new(vec![1.0, -1.0], Relation::Le, 1.5),
                Constraint::new(vec![1.0, 1.0], Relation::Le, 10.0),
            ],
            vec![Domain::Integer, Domain::Continuous],
        );
        let solution = Solver::new()
            .with_max_iterations(1)
            .solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::IterationLimit);
        assert_eq!(solution.values, vec![1.0, 0.0]);
        assert_eq!(solution.objective_value, 1.0);
        assert_eq!(solution.nodes_explored, 3);
        assert_eq!(solution.iterations, 3);

        // Without the cap the same search proves (1, 0) optimal
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_cancelled_search_keeps_incumbent() {
        let m = model(
            vec![2.0, 3.0],
            Direction::Maximize,
            vec![Constraint::new(vec![1.0, 1.0], Relation::Le, 4.0)],
            vec![Domain::Integer, Domain::Integer],
        );
        let best = Incumbent {
            score: -12.0,
            values: vec![0.0, 4.000000001],
        };
        let solution = Solver::new().with_incumbent(&m, SolutionStatus::Cancelled, Some(best));
        assert_eq!(solution.status, SolutionStatus::Cancelled);
        assert_eq!(solution.values, vec![0.0, 4.0]);
        assert_eq!(solution.objective_value, 12.0);

        let solution = Solver::new().with_incumbent(&m, SolutionStatus::Cancelled, None);
        assert_eq!(solution.status, SolutionStatus::Cancelled);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_infeasible_nodes_count_pivots() {
        // 2x1 = 1: the root takes phase-1 pivots and both children are
        // infeasible after pivoting as well
        let m = model(
            vec![1.0],
            Direction::Maximize,
            vec![Constraint::new(vec![2.0], Relation::Eq, 1.0)],
            vec![Domain::Integer],
        );
        let solution = Solver::new().solve(&m, &CancelToken::new());
        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert_eq!(solution.nodes_explored, 3);
        assert!(solution.iterations >= 3, "iterations = {}", solution.iterations);
    }

    #[test]
    fn test_most_fractional_prefers_lowest_index_on_ties() {
        let solver = Solver::new();
        let domains = [Domain::Integer, Domain::Integer, Domain::Continuous];
        assert_eq!(solver.most_fractional(&domains, &[1.5, 2.5, 0.5]), Some((0, 1.5)));
        assert_eq!(solver.most_fractional(&domains, &[1.2, 2.4, 0.5]), Some((1, 2.4)));
        assert_eq!(solver.most_fractional(&domains, &[1.0, 2.0000000001, 0.5]), None);
    }

    #[test]
    fn test_sub_model_detects_contradictory_bounds() {
        let m = model(vec![1.0], Direction::Maximize, vec![], vec![Domain::Integer]);
        let arena = vec![
            Node {
                parent: None,
                bound: None,
                depth: 0,
            },
            Node {
                parent: Some(0),
                bound: Some((0, Bound::Upper(2.0))),
                depth: 1,
            },
            Node {
                parent: Some(1),
                bound: Some((0, Bound::Lower(3.0))),
                depth: 2,
            },
        ];
        let solver = Solver::new();
        assert!(solver.sub_model(&m, &arena, 2).is_none());
        let sub = solver.sub_model(&m, &arena, 1).unwrap();
        assert_eq!(sub.num_constraints(), 1);
        assert_eq!(sub.constraints()[0].relation, Relation::Le);
    }
}
