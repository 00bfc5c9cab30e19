//! Regularized prediction on the probability simplex.
//!
//! A regularized predictor replaces the hard vertex map
//! \(\operatorname{argmax}_{y} \theta^\top y\) with
//! \[
//! \hat y_\Omega(\theta) = \operatorname{argmax}_{y \in \Delta}
//! \{\theta^\top y - \Omega(y)\}
//! \]
//! for a convex regularizer \(\Omega\) on the simplex \(\Delta\). Two closed
//! forms are provided:
//!
//! - [`soft_argmax`]: \(\Omega(y) = -H(y)\) (negative Shannon entropy), whose
//!   argmax is the softmax, dense and strictly positive;
//! - [`sparse_argmax`]: \(\Omega(y) = \tfrac12\lVert y \rVert^2\), whose
//!   argmax is the Euclidean projection onto \(\Delta\), typically sparse.
//!
//! [`one_hot_argmax`] is the unregularized \(\Omega \equiv 0\) baseline. It
//! does not implement [`Regularized`]: it is piecewise constant, so wrapping
//! it in a Fenchel-Young loss would be meaningless, and the type system
//! rejects it.

use crate::utils::{half_square_norm, isprobadist, positive_part, shannon_entropy};
use crate::{Error, Result};

fn validate_input(z: &[f64]) -> Result<()> {
    if z.is_empty() {
        return Err(Error::EmptyInput);
    }
    if z.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite("objective vector"));
    }
    Ok(())
}

/// One-hot encoding of the argmax; ties go to the first maximal index.
pub fn one_hot_argmax(z: &[f64]) -> Result<Vec<f64>> {
    validate_input(z)?;
    let mut best = 0;
    for i in 1..z.len() {
        if z[i] > z[best] {
            best = i;
        }
    }
    let mut y = vec![0.0; z.len()];
    y[best] = 1.0;
    Ok(y)
}

/// Softmax \(s_i = e^{z_i} / \sum_j e^{z_j}\), stabilized by subtracting
/// \(\max_j z_j\) before exponentiating.
///
/// The output is strictly positive and sums to 1.
pub fn soft_argmax(z: &[f64]) -> Result<Vec<f64>> {
    validate_input(z)?;
    let max = z.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let mut s: Vec<f64> = z.iter().map(|&v| (v - max).exp()).collect();
    let total: f64 = s.iter().sum();
    for si in &mut s {
        *si /= total;
    }
    Ok(s)
}

/// Euclidean projection of `z` onto the probability simplex, together with
/// the boolean support mask of the projection.
///
/// The mask flags the coordinates left strictly positive by the projection;
/// it determines the projection's subgradient, which is why it is returned
/// alongside the value instead of being recomputed.
///
/// Algorithm: sort `z` descending, find the largest `k` with
/// \(z_{(k)} > (\sum_{j \le k} z_{(j)} - 1)/k\), threshold at
/// \(\tau = (\sum_{j \le k} z_{(j)} - 1)/k\), and clamp `z - τ` at zero.
pub fn simplex_projection_and_support(z: &[f64]) -> Result<(Vec<f64>, Vec<bool>)> {
    validate_input(z)?;

    let mut sorted = z.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut k = 0;
    let mut tau = 0.0;
    for (j, &v) in sorted.iter().enumerate() {
        cumsum += v;
        let candidate = (cumsum - 1.0) / (j + 1) as f64;
        if v > candidate {
            k = j + 1;
            tau = candidate;
        }
    }
    debug_assert!(k >= 1, "at least the largest entry stays in the support");

    let p: Vec<f64> = z.iter().map(|&v| positive_part(v - tau)).collect();
    let support: Vec<bool> = p.iter().map(|&pi| pi > 0.0).collect();
    debug_assert!(isprobadist(&p, 1e-9));
    Ok((p, support))
}

/// Euclidean projection of `z` onto the probability simplex.
///
/// Regularized prediction with the square-norm penalty
/// \(\Omega(y) = \tfrac12 \lVert y \rVert^2\); see
/// [`simplex_projection_and_support`] for the support mask.
pub fn sparse_argmax(z: &[f64]) -> Result<Vec<f64>> {
    simplex_projection_and_support(z).map(|(p, _)| p)
}

/// Capability interface of a regularized predictor: the prediction map
/// \(\hat y_\Omega\) and the regularization value \(\Omega\).
///
/// `regularization` is only meaningful on (near-)distributions; membership is
/// checked in debug builds and skipped on the release hot path.
pub trait Regularized {
    /// Compute \(\hat y_\Omega(\theta)\).
    fn predict(&self, theta: &[f64]) -> Result<Vec<f64>>;

    /// Compute \(\Omega(y)\).
    fn regularization(&self, y: &[f64]) -> f64;
}

/// Entropic predictor: [`soft_argmax`] with \(\Omega(y) = -H(y)\).
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftArgmax;

impl Regularized for SoftArgmax {
    fn predict(&self, theta: &[f64]) -> Result<Vec<f64>> {
        soft_argmax(theta)
    }

    fn regularization(&self, y: &[f64]) -> f64 {
        debug_assert!(isprobadist(y, 1e-6));
        -shannon_entropy(y)
    }
}

/// Sparse predictor: [`sparse_argmax`] with \(\Omega(y) = \tfrac12\lVert y\rVert^2\).
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseArgmax;

impl Regularized for SparseArgmax {
    fn predict(&self, theta: &[f64]) -> Result<Vec<f64>> {
        sparse_argmax(theta)
    }

    fn regularization(&self, y: &[f64]) -> f64 {
        debug_assert!(isprobadist(y, 1e-6));
        half_square_norm(y)
    }
}

/// Hard baseline predictor: [`one_hot_argmax`].
///
/// Not a [`Regularized`] implementor: its prediction map has a zero
/// derivative almost everywhere, so there is no loss to build on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneHotArgmax;

impl OneHotArgmax {
    /// Compute the one-hot argmax of `theta`.
    pub fn predict(&self, theta: &[f64]) -> Result<Vec<f64>> {
        one_hot_argmax(theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn one_hot_picks_the_first_maximal_index() {
        assert_eq!(one_hot_argmax(&[3.0, 1.0, 2.0]).unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(one_hot_argmax(&[1.0, 2.0, 2.0]).unwrap(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn soft_argmax_matches_hand_computed_values() {
        // exp([3,1,2]) / sum = [e^3, e^1, e^2] / 30.1929
        let s = soft_argmax(&[3.0, 1.0, 2.0]).unwrap();
        assert_relative_eq!(s[0], 0.665241, epsilon = 1e-5);
        assert_relative_eq!(s[1], 0.090031, epsilon = 1e-5);
        assert_relative_eq!(s[2], 0.244728, epsilon = 1e-5);
        assert_relative_eq!(s.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn soft_argmax_survives_large_inputs() {
        let s = soft_argmax(&[1000.0, 999.0]).unwrap();
        assert!(s.iter().all(|v| v.is_finite()));
        assert_relative_eq!(s.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn soft_argmax_rejects_non_finite_input() {
        assert!(matches!(
            soft_argmax(&[1.0, f64::NAN]),
            Err(crate::Error::NonFinite(_))
        ));
        assert!(matches!(
            soft_argmax(&[1.0, f64::INFINITY]),
            Err(crate::Error::NonFinite(_))
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(one_hot_argmax(&[]), Err(crate::Error::EmptyInput)));
        assert!(matches!(soft_argmax(&[]), Err(crate::Error::EmptyInput)));
        assert!(matches!(sparse_argmax(&[]), Err(crate::Error::EmptyInput)));
    }

    #[test]
    fn sparse_argmax_on_a_dominant_entry_is_a_vertex() {
        let (p, support) = simplex_projection_and_support(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(p, vec![1.0, 0.0, 0.0]);
        assert_eq!(support, vec![true, false, false]);
    }

    #[test]
    fn sparse_argmax_is_the_identity_on_distributions() {
        let z = [0.5, 0.3, 0.2];
        let p = sparse_argmax(&z).unwrap();
        for (pi, zi) in p.iter().zip(&z) {
            assert_relative_eq!(pi, zi, epsilon = 1e-12);
        }
    }

    #[test]
    fn sparse_argmax_of_constant_input_is_uniform() {
        let p = sparse_argmax(&[1.0, 1.0, 1.0]).unwrap();
        for pi in &p {
            assert_relative_eq!(*pi, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn regularization_values_match_their_formulas() {
        let y = [0.5, 0.25, 0.25];
        assert_relative_eq!(
            SoftArgmax.regularization(&y),
            -shannon_entropy(&y),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            SparseArgmax.regularization(&y),
            half_square_norm(&y),
            epsilon = 1e-12
        );
    }

    proptest! {
        #[test]
        fn sparse_argmax_always_lands_in_the_simplex(
            z in prop::collection::vec(-50.0f64..50.0, 1..30)
        ) {
            let p = sparse_argmax(&z).unwrap();
            prop_assert!(p.iter().all(|&pi| pi >= 0.0));
            prop_assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn soft_argmax_is_a_strictly_positive_distribution(
            z in prop::collection::vec(-50.0f64..50.0, 1..30)
        ) {
            let s = soft_argmax(&z).unwrap();
            prop_assert!(s.iter().all(|&si| si > 0.0));
            prop_assert!((s.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn one_hot_argmax_is_an_indicator(
            z in prop::collection::vec(-50.0f64..50.0, 1..30)
        ) {
            let y = one_hot_argmax(&z).unwrap();
            prop_assert_eq!(y.iter().filter(|&&v| v == 1.0).count(), 1);
            prop_assert_eq!(y.iter().filter(|&&v| v == 0.0).count(), z.len() - 1);
        }
    }
}
