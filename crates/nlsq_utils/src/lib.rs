// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Test-only helpers shared across the `nlsq` workspace.

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Epsilon constant for use in testing.
// It is set to: f64::sqrt(f64::EPSILON)
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Epsilon constant for use in testing.
pub const NLSQ_EPSILON: f64 = 0.000_000_014_901_161_193_847_656;

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Helper macros.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Helper macro for tests to test floating point approximate equality.
#[macro_export]
macro_rules! assert_approx_equal {
    ($x:expr, $y:expr, $d:expr) => {
        assert!(
            ($x - $y <= $d) && ($y - $x <= $d),
            "\nLeft: \t\t{}, \nRight: \t\t{}, \nPrecision: \t{}\n",
            $x,
            $y,
            $d
        )
    };
}

/// Central-difference numerical derivative of a scalar function at `x`.
///
/// Used by autodiff gradient tests to check analytic partials against a
/// numerical reference, per the accuracy bound in the workspace's testable
/// properties (agreement to at least four decimals away from singularities).
pub fn central_difference<F>(f: F, x: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let h = 1e-6 * x.abs().max(1.0);
    (f(x + h) - f(x - h)) / (2.0 * h)
}

#[cfg(test)]
mod tests_utils {
    use super::*;

    #[test]
    fn test_assert_approx_equal() {
        assert_approx_equal!(1_f64, 1.0, f64::EPSILON);
        assert_approx_equal!(1_f64.exp(), std::f64::consts::E, f64::EPSILON);
    }

    #[test]
    fn test_central_difference_matches_known_derivative() {
        // d/dx sin(x) = cos(x)
        let d = central_difference(f64::sin, 0.7);
        assert_approx_equal!(d, 0.7_f64.cos(), 1e-6);
    }
}
