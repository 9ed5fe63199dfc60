// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! The elemental operation library, reimplemented over raw `f64` operands
//! for kernel interpretation.
//!
//! A compiled [`crate::Kernel`] cannot call back into
//! `nlsq_autodiff::Variable`'s operator overloads — it only has operand
//! values read off its tape — so every primitive's forward value and local
//! partials are recomputed here, one function per [`OpCode`], to the same
//! formulas `nlsq_autodiff::ops` uses on live graph nodes.

use nlsq_autodiff::OpCode;

/// Evaluate `op` on `operands`, returning its value and the local partial
/// derivative with respect to each operand.
#[must_use]
pub fn eval(op: OpCode, payload: Option<f64>, payload2: Option<f64>, operands: &[f64]) -> (f64, Vec<f64>) {
    match op {
        OpCode::Add => (operands[0] + operands[1], vec![1.0, 1.0]),
        OpCode::Sub => (operands[0] - operands[1], vec![1.0, -1.0]),
        OpCode::Mul => (operands[0] * operands[1], vec![operands[1], operands[0]]),
        OpCode::Div => {
            let (a, b) = (operands[0], operands[1]);
            (a / b, vec![1.0 / b, -a / (b * b)])
        }
        OpCode::Neg => (-operands[0], vec![-1.0]),
        OpCode::Reciprocal => {
            let data = 1.0 / operands[0];
            (data, vec![-data * data])
        }
        OpCode::PowConst => {
            let k = payload.expect("pow_const requires a payload");
            let a = operands[0];
            (a.powf(k), vec![k * a.powf(k - 1.0)])
        }
        OpCode::PowValue => {
            let (a, b) = (operands[0], operands[1]);
            let data = a.powf(b);
            let d_base = b * a.powf(b - 1.0);
            let d_exp = if a > 0.0 { data * a.ln() } else { 0.0 };
            (data, vec![d_base, d_exp])
        }
        OpCode::Square => (operands[0] * operands[0], vec![2.0 * operands[0]]),
        OpCode::Cube => (operands[0].powi(3), vec![3.0 * operands[0] * operands[0]]),
        OpCode::Mod => (operands[0] % operands[1], vec![1.0, 0.0]),
        OpCode::Relu => {
            let a = operands[0];
            (a.max(0.0), vec![if a > 0.0 { 1.0 } else { 0.0 }])
        }
        OpCode::Tanh => {
            let data = operands[0].tanh();
            (data, vec![1.0 - data * data])
        }
        OpCode::Sigmoid => {
            let data = 1.0 / (1.0 + (-operands[0]).exp());
            (data, vec![data * (1.0 - data)])
        }
        OpCode::Softplus => {
            let a = operands[0];
            ((1.0 + a.exp()).ln(), vec![1.0 / (1.0 + (-a).exp())])
        }
        OpCode::Exp => {
            let data = operands[0].exp();
            (data, vec![data])
        }
        OpCode::Log => (operands[0].ln(), vec![1.0 / operands[0]]),
        OpCode::Sqrt => {
            let data = operands[0].sqrt();
            (data, vec![0.5 / data])
        }
        OpCode::Abs => {
            let a = operands[0];
            let partial = if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            };
            (a.abs(), vec![partial])
        }
        OpCode::Sign => {
            let a = operands[0];
            (a.signum() * (a != 0.0) as i32 as f64, vec![0.0])
        }
        OpCode::Sin => (operands[0].sin(), vec![operands[0].cos()]),
        OpCode::Cos => (operands[0].cos(), vec![-operands[0].sin()]),
        OpCode::Tan => {
            let c = operands[0].cos();
            (operands[0].tan(), vec![1.0 / (c * c)])
        }
        OpCode::Asin => {
            let a = operands[0];
            (a.asin(), vec![1.0 / (1.0 - a * a).sqrt()])
        }
        OpCode::Acos => {
            let a = operands[0];
            (a.acos(), vec![-1.0 / (1.0 - a * a).sqrt()])
        }
        OpCode::Atan => {
            let a = operands[0];
            (a.atan(), vec![1.0 / (1.0 + a * a)])
        }
        OpCode::Min => {
            let (a, b) = (operands[0], operands[1]);
            if a <= b {
                (a, vec![1.0, 0.0])
            } else {
                (b, vec![0.0, 1.0])
            }
        }
        OpCode::Max => {
            let (a, b) = (operands[0], operands[1]);
            if a >= b {
                (a, vec![1.0, 0.0])
            } else {
                (b, vec![0.0, 1.0])
            }
        }
        OpCode::Clamp => {
            let (lo, hi) = (payload.expect("clamp requires a lower bound"), payload2.expect("clamp requires an upper bound"));
            let a = operands[0];
            let partial = if a < lo || a > hi { 0.0 } else { 1.0 };
            (a.clamp(lo, hi), vec![partial])
        }
        OpCode::Floor => (operands[0].floor(), vec![0.0]),
        OpCode::Ceil => (operands[0].ceil(), vec![0.0]),
        OpCode::Round => (operands[0].round(), vec![0.0]),
        OpCode::Sum => {
            let data = operands.iter().sum();
            (data, vec![1.0; operands.len()])
        }
        OpCode::Mean => {
            let n = operands.len() as f64;
            let data = operands.iter().sum::<f64>() / n;
            (data, vec![1.0 / n; operands.len()])
        }
        OpCode::Eq => (bool_to_f64(operands[0] == operands[1]), vec![0.0, 0.0]),
        OpCode::Neq => (bool_to_f64(operands[0] != operands[1]), vec![0.0, 0.0]),
        OpCode::Gt => (bool_to_f64(operands[0] > operands[1]), vec![0.0, 0.0]),
        OpCode::Lt => (bool_to_f64(operands[0] < operands[1]), vec![0.0, 0.0]),
        OpCode::Gte => (bool_to_f64(operands[0] >= operands[1]), vec![0.0, 0.0]),
        OpCode::Lte => (bool_to_f64(operands[0] <= operands[1]), vec![0.0, 0.0]),
        OpCode::Param | OpCode::Const => unreachable!("leaves are resolved directly by the tape walker"),
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests_elemental {
    use super::*;
    use nlsq_utils::assert_approx_equal;

    #[test]
    fn mul_matches_product_rule() {
        let (value, partials) = eval(OpCode::Mul, None, None, &[3.0, 4.0]);
        assert_approx_equal!(value, 12.0, 1e-12);
        assert_eq!(partials, vec![4.0, 3.0]);
    }

    #[test]
    fn sum_distributes_unit_gradient() {
        let (value, partials) = eval(OpCode::Sum, None, None, &[1.0, 2.0, 3.0]);
        assert_approx_equal!(value, 6.0, 1e-12);
        assert_eq!(partials, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn comparisons_are_non_differentiable() {
        let (value, partials) = eval(OpCode::Gt, None, None, &[2.0, 1.0]);
        assert_eq!(value, 1.0);
        assert_eq!(partials, vec![0.0, 0.0]);
    }
}
