//! Scalar and vector helpers shared by predictors and losses.

use crate::{Error, Result};

/// Positive part \(\max(x, 0)\).
#[inline]
pub fn positive_part(x: f64) -> f64 {
    x.max(0.0)
}

/// Half squared Euclidean norm \(\tfrac12 \lVert x \rVert^2\).
pub fn half_square_norm(x: &[f64]) -> f64 {
    0.5 * x.iter().map(|&v| v * v).sum::<f64>()
}

/// Shannon entropy \(H(p) = -\sum_i p_i \log p_i\), with \(0 \log 0 \equiv 0\).
pub fn shannon_entropy(p: &[f64]) -> f64 {
    -p.iter()
        .filter(|&&pi| pi > 0.0)
        .map(|&pi| pi * pi.ln())
        .sum::<f64>()
}

/// Whether `x` is a probability, i.e. lies in \([0, 1]\).
pub fn isproba(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

/// Whether `p` is a probability distribution up to tolerance `tol`:
/// all entries at least `-tol` and total mass within `tol` of 1.
pub fn isprobadist(p: &[f64], tol: f64) -> bool {
    p.iter().all(|&pi| pi >= -tol) && (p.iter().sum::<f64>() - 1.0).abs() <= tol
}

/// 1-based ranks of the entries of `theta`, rank 1 for the largest.
///
/// Ties are broken by index order (the earlier entry gets the smaller rank).
/// Returned as `f64` so rank vectors can be consumed directly as solutions
/// of the ranking polytope.
pub fn ranking(theta: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..theta.len()).collect();
    order.sort_by(|&i, &j| theta[j].total_cmp(&theta[i]));
    let mut ranks = vec![0.0; theta.len()];
    for (r, &i) in order.iter().enumerate() {
        ranks[i] = (r + 1) as f64;
    }
    ranks
}

/// Dot product over slices of equal length.
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

pub(crate) fn check_same_len(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch(a.len(), b.len()));
    }
    Ok(())
}
