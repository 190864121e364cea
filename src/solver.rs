//! # Bracketed scalar root finder
//!
//! Safeguarded Newton iteration on a sign-changing bracket: a Newton step is taken when it
//! stays inside the bracket and shrinks the residual fast enough, otherwise the bracket is
//! bisected. The bracket is updated after every evaluation, so the iteration can never leave it
//! and converges at least linearly even with a poor derivative.
//!
//! Used by the cell model to invert Butler-Volmer kinetics (overpotential for a given current)
//! and to find the current that produces a target cell voltage.
//!
//! Failure is always explicit: an unbracketed interval, a non-finite residual or derivative,
//! or running out of iterations returns a [`SolverError`] instead of the last estimate.
use crate::errors::SolverError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// absolute tolerance on the root location
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 100,
        }
    }
}

/// Finds a root of `f` inside `[lower, upper]`.
///
/// `f` returns the residual and its derivative at `x`. The residual must change sign over the
/// interval (a zero at either end is accepted as is).
pub fn find_root<F>(
    mut f: F,
    lower: f64,
    upper: f64,
    options: &SolverOptions,
) -> Result<f64, SolverError>
where
    F: FnMut(f64) -> (f64, f64),
{
    let (f_lower, _) = f(lower);
    let (f_upper, _) = f(upper);
    if !f_lower.is_finite() {
        return Err(SolverError::NonFinite(lower));
    }
    if !f_upper.is_finite() {
        return Err(SolverError::NonFinite(upper));
    }
    if f_lower == 0.0 {
        return Ok(lower);
    }
    if f_upper == 0.0 {
        return Ok(upper);
    }
    if f_lower.signum() == f_upper.signum() {
        return Err(SolverError::NotBracketed {
            lower,
            upper,
            f_lower,
            f_upper,
        });
    }
    // orient the bracket so that f(x_neg) < 0 < f(x_pos)
    let (mut x_neg, mut x_pos) = if f_lower < 0.0 {
        (lower, upper)
    } else {
        (upper, lower)
    };

    let mut x = 0.5 * (lower + upper);
    let mut dx_old = (upper - lower).abs();
    let mut dx = dx_old;
    let (mut fx, mut dfx) = f(x);

    for _ in 0..options.max_iterations {
        if !fx.is_finite() || !dfx.is_finite() {
            return Err(SolverError::NonFinite(x));
        }
        let newton_leaves_bracket = ((x - x_pos) * dfx - fx) * ((x - x_neg) * dfx - fx) > 0.0;
        let newton_too_slow = (2.0 * fx).abs() > (dx_old * dfx).abs();
        if newton_leaves_bracket || newton_too_slow {
            dx_old = dx;
            dx = 0.5 * (x_pos - x_neg);
            x = x_neg + dx;
            if x == x_neg {
                return Ok(x);
            }
        } else {
            dx_old = dx;
            dx = fx / dfx;
            let previous = x;
            x -= dx;
            if x == previous {
                return Ok(x);
            }
        }
        if dx.abs() < options.tolerance {
            return Ok(x);
        }
        (fx, dfx) = f(x);
        if fx < 0.0 {
            x_neg = x;
        } else {
            x_pos = x;
        }
    }
    Err(SolverError::NoConvergence {
        iterations: options.max_iterations,
        estimate: x,
    })
}
