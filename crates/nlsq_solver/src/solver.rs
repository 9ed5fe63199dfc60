// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! The Levenberg-Marquardt outer/inner loop.

use std::time::Instant;

use nlsq_linalg::{cholesky_solve, compute_jtj, compute_jtr, qr_solve, Matrix};

use crate::options::SolverOptions;
use crate::residual_source::ResidualSource;
use crate::result::{convergence_reason, SolverResult};

fn sum_of_squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn clamp_to_trust_region(delta: &mut [f64], radius: f64) {
    if !radius.is_finite() {
        return;
    }
    let n = norm(delta);
    if n > radius && n > 0.0 {
        let scale = radius / n;
        for d in delta.iter_mut() {
            *d *= scale;
        }
    }
}

/// Solve `(J^T J + lambda I) delta = -J^T r` via Cholesky, or the augmented
/// least-squares problem `[J; sqrt(lambda) I] delta = -[r; 0]` via QR.
fn solve_step(jacobian: &Matrix, residuals: &[f64], jtr: &[f64], lambda: f64, use_qr: bool) -> Result<Vec<f64>, String> {
    let n = jacobian.cols();
    if use_qr {
        let m = jacobian.rows();
        let mut augmented = Matrix::zeros(m + n, n);
        for i in 0..m {
            for j in 0..n {
                augmented[(i, j)] = jacobian[(i, j)];
            }
        }
        let sqrt_lambda = lambda.max(0.0).sqrt();
        for i in 0..n {
            augmented[(m + i, i)] = sqrt_lambda;
        }
        let mut rhs = vec![0.0; m + n];
        rhs[..m].copy_from_slice(&residuals.iter().map(|r| -r).collect::<Vec<_>>());
        qr_solve(&augmented, &rhs).map_err(|e| format!("{}{e}", convergence_reason::LINEAR_SOLVER_FAILED_PREFIX))
    } else {
        let jtj = compute_jtj(jacobian);
        let neg_jtr: Vec<f64> = jtr.iter().map(|&g| -g).collect();
        let damped = jtj.with_added_diagonal(&vec![lambda; n]);
        match cholesky_solve(&damped, &neg_jtr) {
            Ok(delta) => Ok(delta),
            Err(_first_err) if lambda == 0.0 => {
                log::debug!("nlsq_solver: cholesky failed at lambda=0, retrying with fallback damping");
                let fallback = jtj.with_added_diagonal(&vec![1e-6; n]);
                cholesky_solve(&fallback, &neg_jtr)
                    .map_err(|e| format!("{}{e}", convergence_reason::LINEAR_SOLVER_FAILED_PREFIX))
            }
            Err(first_err) => Err(format!("{}{first_err}", convergence_reason::LINEAR_SOLVER_FAILED_PREFIX)),
        }
    }
}

enum InnerStep {
    Accepted { new_params: Vec<f64> },
    ParamToleranceReached,
    Failed(String),
}

#[allow(clippy::too_many_arguments)]
fn adaptive_inner_step(
    params: &[f64],
    cost: f64,
    jacobian: &Matrix,
    residuals: &[f64],
    jtr: &[f64],
    lambda: &mut f64,
    options: &SolverOptions,
    mut try_params: impl FnMut(&[f64]) -> f64,
) -> InnerStep {
    for _ in 0..options.max_inner_iterations {
        let mut delta = match solve_step(jacobian, residuals, jtr, *lambda, options.use_qr) {
            Ok(delta) => delta,
            Err(reason) => return InnerStep::Failed(reason),
        };
        clamp_to_trust_region(&mut delta, options.trust_region_radius);
        if norm(&delta) < options.param_tolerance {
            return InnerStep::ParamToleranceReached;
        }

        let new_params: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + d).collect();
        let new_cost = try_params(&new_params);
        if new_cost < cost {
            *lambda = (*lambda / options.damping_decrease_factor).max(1e-10);
            return InnerStep::Accepted { new_params };
        }
        *lambda = (*lambda * options.damping_increase_factor).min(1e10);
    }
    InnerStep::Failed(convergence_reason::DAMPING_ADJUSTMENT_FAILED.to_string())
}

#[allow(clippy::too_many_arguments)]
fn line_search_inner_step(
    params: &[f64],
    cost: f64,
    jacobian: &Matrix,
    residuals: &[f64],
    jtr: &[f64],
    lambda: f64,
    options: &SolverOptions,
    mut try_params: impl FnMut(&[f64]) -> f64,
) -> InnerStep {
    let mut delta = match solve_step(jacobian, residuals, jtr, lambda, options.use_qr) {
        Ok(delta) => delta,
        Err(reason) => return InnerStep::Failed(reason),
    };
    clamp_to_trust_region(&mut delta, options.trust_region_radius);
    if norm(&delta) < options.param_tolerance {
        return InnerStep::ParamToleranceReached;
    }

    let mut alpha = 1.0;
    for _ in 0..options.line_search_steps {
        let new_params: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + alpha * d).collect();
        let new_cost = try_params(&new_params);
        if new_cost < cost {
            return InnerStep::Accepted { new_params };
        }
        alpha *= 0.5;
    }
    InnerStep::Failed(convergence_reason::LINE_SEARCH_FAILED.to_string())
}

/// Minimize `sum(r_i(params)^2)` over `params`, starting from
/// `initial_params`, using Levenberg-Marquardt with the given `options`.
pub fn nonlinear_least_squares<S: ResidualSource>(source: &S, initial_params: &[f64], options: &SolverOptions) -> SolverResult {
    let start = Instant::now();
    let mut params = initial_params.to_vec();
    let mut lambda = options.initial_damping;
    let mut prev_cost = f64::INFINITY;
    let mut iterations = 0;

    let (success, reason) = loop {
        if iterations >= options.max_iterations {
            break (false, convergence_reason::MAX_ITERATIONS.to_string());
        }
        iterations += 1;

        let (residuals, jacobian) = source.evaluate_jacobian(&params);
        let cost = sum_of_squares(&residuals);
        let jtr = compute_jtr(&jacobian, &residuals);
        let grad_norm = norm(&jtr);

        if options.verbose {
            log::debug!("nlsq_solver: iter={iterations} cost={cost:e} |g|={grad_norm:e} lambda={lambda:e}");
        }

        if grad_norm < options.gradient_tolerance {
            break (true, convergence_reason::GRADIENT_TOLERANCE.to_string());
        }
        if (prev_cost - cost).abs() < options.cost_tolerance {
            break (true, convergence_reason::COST_TOLERANCE.to_string());
        }
        if cost < options.cost_tolerance {
            break (true, convergence_reason::COST_BELOW_THRESHOLD.to_string());
        }

        let try_params = |candidate: &[f64]| sum_of_squares(&source.evaluate(candidate));
        let inner = if options.adaptive_damping {
            adaptive_inner_step(&params, cost, &jacobian, &residuals, &jtr, &mut lambda, options, try_params)
        } else {
            line_search_inner_step(&params, cost, &jacobian, &residuals, &jtr, lambda, options, try_params)
        };

        match inner {
            InnerStep::Accepted { new_params } => {
                params = new_params;
                prev_cost = cost;
            }
            InnerStep::ParamToleranceReached => break (true, convergence_reason::PARAM_TOLERANCE.to_string()),
            InnerStep::Failed(reason) => break (false, reason),
        }
    };

    let residuals = source.evaluate(&params);
    let final_cost = sum_of_squares(&residuals);
    SolverResult {
        success,
        iterations,
        final_cost,
        convergence_reason: reason,
        computation_time: start.elapsed().as_secs_f64() * 1e3,
        params,
        residuals,
    }
}

#[cfg(test)]
mod tests_solver {
    use super::*;
    use nlsq_autodiff::Graph;
    use nlsq_jit::{CompileMode, CompiledResidualSet};
    use nlsq_utils::assert_approx_equal;

    fn linear_residuals(graph: &Graph, values: &[f64]) -> Vec<usize> {
        let vars = graph.vars(values);
        let target = graph.constant(5.0);
        vec![(vars[0] - target).index()]
    }

    #[test]
    fn converges_on_a_trivial_linear_residual() {
        let set = CompiledResidualSet::new(CompileMode::Eager, 1, linear_residuals, &[0.0]);
        let result = nonlinear_least_squares(&set, &[0.0], &SolverOptions::default());
        assert!(result.success);
        assert_approx_equal!(result.params[0], 5.0, 1e-6);
        assert!(result.final_cost <= 1e-6);
    }

    fn robot_arm_residuals(lengths: [f64; 3], target: (f64, f64)) -> impl Fn(&Graph, &[f64]) -> Vec<usize> {
        move |graph, values| {
            let theta = graph.vars(values);
            let a1 = theta[0];
            let a2 = theta[0] + theta[1];
            let a3 = theta[0] + theta[1] + theta[2];
            let l0 = graph.constant(lengths[0]);
            let l1 = graph.constant(lengths[1]);
            let l2 = graph.constant(lengths[2]);
            let x = l0 * a1.cos() + l1 * a2.cos() + l2 * a3.cos();
            let y = l0 * a1.sin() + l1 * a2.sin() + l2 * a3.sin();
            let tx = graph.constant(target.0);
            let ty = graph.constant(target.1);
            vec![(x - tx).index(), (y - ty).index()]
        }
    }

    #[test]
    fn robot_arm_ik_converges_within_a_few_iterations() {
        let builder = robot_arm_residuals([3.0, 2.5, 2.0], (5.0, 4.0));
        let initial = [0.1, 0.1, 0.1];
        let set = CompiledResidualSet::new(CompileMode::Eager, 3, builder, &initial);
        let options = SolverOptions::default().with_max_iterations(50);
        let result = nonlinear_least_squares(&set, &initial, &options);
        assert!(result.success, "reason: {}", result.convergence_reason);
        assert!(result.final_cost <= 1e-6, "final cost {}", result.final_cost);
        assert!(result.iterations <= 25, "iterations {}", result.iterations);
    }

    fn underdetermined_residuals(graph: &Graph, values: &[f64]) -> Vec<usize> {
        let p = graph.vars(values);
        let three = graph.constant(3.0);
        let one = graph.constant(1.0);
        let r1 = (p[0] + p[1] + p[2]) - three;
        let r2 = (p[0] - p[1]) - one;
        vec![r1.index(), r2.index()]
    }

    #[test]
    fn underdetermined_lm_with_qr_converges() {
        let initial = [0.0, 0.0, 0.0];
        let set = CompiledResidualSet::new(CompileMode::Eager, 3, underdetermined_residuals, &initial);
        let options = SolverOptions::default().with_use_qr(true);
        let result = nonlinear_least_squares(&set, &initial, &options);
        assert!(result.success, "reason: {}", result.convergence_reason);
        let final_grad_norm = {
            let (residuals, jacobian) = ResidualSource::evaluate_jacobian(&set, &result.params);
            let jtr = compute_jtr(&jacobian, &residuals);
            norm(&jtr)
        };
        assert!(final_grad_norm <= 1e-6, "gradient norm {final_grad_norm}");
    }

    #[test]
    fn converges_from_many_random_initial_guesses() {
        use rand::thread_rng;
        use rand_distr::{Distribution, Uniform};

        let spread = Uniform::new(-10.0, 10.0);
        let mut rng = thread_rng();
        for _ in 0..20 {
            let initial = [spread.sample(&mut rng)];
            let set = CompiledResidualSet::new(CompileMode::Eager, 1, linear_residuals, &initial);
            let result = nonlinear_least_squares(&set, &initial, &SolverOptions::default());
            assert!(result.success, "reason: {} from {initial:?}", result.convergence_reason);
            assert_approx_equal!(result.params[0], 5.0, 1e-5);
        }
    }

    #[test]
    fn non_adaptive_line_search_mode_converges_too() {
        let set = CompiledResidualSet::new(CompileMode::Eager, 1, linear_residuals, &[0.0]);
        let options = SolverOptions::default().with_adaptive_damping(false);
        let result = nonlinear_least_squares(&set, &[0.0], &options);
        assert!(result.success, "reason: {}", result.convergence_reason);
        assert_approx_equal!(result.params[0], 5.0, 1e-4);
    }
}
