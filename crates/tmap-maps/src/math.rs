//! Numerically stable scalar helpers used by the rectifiers.

/// Stable `log(1 + exp(x))` (softplus).
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`, so the
/// exponential argument is never positive and cannot overflow.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid `1 / (1 + exp(-x))`, the derivative of softplus.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    // x >= 0: 1/(1+exp(-x)); x < 0: exp(x)/(1+exp(x)).
    if x >= 0.0 { recip } else { e * recip }
}

/// Exponential with the argument clamped to `[-700, 700]`.
///
/// Early optimizer iterates can push the expansion derivative to magnitudes
/// where a bare `exp` overflows to `inf` (or underflows to exactly 0, which
/// turns the log-determinant into `-inf`). Clamping keeps the objective
/// finite so line searches can recover.
#[inline]
pub fn exp_clamped(x: f64) -> f64 {
    x.clamp(-700.0, 700.0).exp()
}

/// The clamp applied by [`exp_clamped`], shared with its log form.
#[inline]
pub fn clamp_exp_arg(x: f64) -> f64 {
    x.clamp(-700.0, 700.0)
}
