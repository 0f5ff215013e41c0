//! Numeric comparison helpers shared across the crate.

/// Relative tolerance used for all risk, improvement, and complexity
/// comparisons. Near-equal scores are treated as ties so that tie-breaking
/// (lower variable index, smaller cut) is reproducible across platforms.
pub(crate) const TOL: f64 = 1e-10;

/// `a` is strictly greater than `b` beyond the shared relative tolerance.
#[inline]
pub(crate) fn gt_tol(a: f64, b: f64) -> bool {
    a - b > TOL * a.abs().max(b.abs()).max(1.0)
}
