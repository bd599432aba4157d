//! 1-D root finding for map inversion.
//!
//! Map components are strictly increasing in their last input, so inversion
//! reduces to solving `S(t) = target` for a monotone `S`: grow a bracket
//! outward from the origin, then take Newton steps safeguarded by bisection.

use tmap_core::{Error, Result};

/// Bracket-expansion cap. 64 doublings from step 1 covers `|t| ≈ 1e19`;
/// anything unbracketed by then points at a broken rectifier, not a far root.
const MAX_EXPANSIONS: u32 = 64;

/// Solve `f(t) = target` for strictly increasing `f`.
///
/// `f` returns the value and derivative at `t` (the derivative is the
/// rectified diagonal, available for free). Converges when the residual
/// `|f(t) − target|` drops to `tol`; exceeding `max_iters` Newton/bisection
/// steps, or failing to bracket, is a [`Error::NonConvergence`] carrying the
/// last iterate and residual.
pub fn invert_monotone<F>(f: &F, target: f64, tol: f64, max_iters: u32) -> Result<f64>
where
    F: Fn(f64) -> Result<(f64, f64)>,
{
    let (v0, _) = f(0.0)?;
    let r0 = v0 - target;
    if r0.abs() <= tol {
        return Ok(0.0);
    }

    // Expand geometrically in the direction of the root until straddled.
    let dir = if r0 < 0.0 { 1.0 } else { -1.0 };
    let mut prev_t = 0.0;
    let mut step = 1.0;
    let mut t = dir;
    let (mut lo, mut hi);
    let mut expansions = 0;
    loop {
        let (v, _) = f(t)?;
        let r = v - target;
        if r.abs() <= tol {
            return Ok(t);
        }
        if (r < 0.0) != (r0 < 0.0) {
            (lo, hi) = if dir > 0.0 { (prev_t, t) } else { (t, prev_t) };
            break;
        }
        expansions += 1;
        if expansions > MAX_EXPANSIONS {
            return Err(Error::non_convergence("inverse bracketing", 0, t, r.abs()));
        }
        prev_t = t;
        step *= 2.0;
        t += dir * step;
    }

    // Safeguarded Newton: steps leaving the bracket fall back to bisection.
    let mut x = 0.5 * (lo + hi);
    let mut last_residual = f64::INFINITY;
    for _ in 0..max_iters {
        let (v, d) = f(x)?;
        let r = v - target;
        last_residual = r.abs();
        if last_residual <= tol {
            return Ok(x);
        }
        if r > 0.0 {
            hi = x;
        } else {
            lo = x;
        }
        let newton = x - r / d;
        x = if d > 0.0 && newton.is_finite() && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    Err(Error::non_convergence("inverse", 0, x, last_residual))
}
