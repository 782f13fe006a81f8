//! Log-space arithmetic helpers.
//!
//! Probabilities throughout the crate are carried as natural-log values so that
//! products along long execution paths become sums and do not underflow.

/// `log(exp(a) + exp(b))` without leaving log space.
///
/// Either argument may be `-inf` (zero mass).
#[inline]
pub fn logplusexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// `log(Σ exp(x))` over an iterator; `-inf` for an empty iterator.
pub fn logsumexp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().fold(f64::NEG_INFINITY, logplusexp)
}
