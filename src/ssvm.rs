//! Structured support vector machine loss.
//!
//! The structured hinge pairs a base dissimilarity \(\delta(y, y^\star)\)
//! with a margin scaling \(\alpha\):
//! \[
//! \ell(\theta; y^\star) = \max_y \{\delta(y, y^\star) +
//! \alpha\,\theta^\top (y - y^\star)\},
//! \]
//! with the standard subgradient \(\alpha\,(y^\dagger - y^\star)\) at the
//! inner maximizer \(y^\dagger\). The candidate \(y = y^\star\) has objective
//! zero, so the loss is never negative. The loss-augmented argmax is part of
//! the base-loss contract, since solving it needs \(\delta\)'s structure on
//! top of the plain maximizer.

use crate::pullback::GradPullback;
use crate::regularized::one_hot_argmax;
use crate::utils::{check_same_len, dot};
use crate::{Error, Result};

/// Capability interface of a base dissimilarity \(\delta\).
///
/// Implementors provide the value \(\delta(y, y^\star) \ge 0\) and the
/// loss-augmented maximizer
/// \(\operatorname{argmax}_y \{\delta(y, y^\star) + \alpha\,\theta^\top
/// (y - y^\star)\}\).
pub trait BaseLoss {
    /// Dissimilarity \(\delta(y, y^\star)\).
    fn value(&self, y: &[f64], y_true: &[f64]) -> f64;

    /// Loss-augmented argmax used by the structured hinge and its gradient.
    fn compute_maximizer(&self, theta: &[f64], alpha: f64, y_true: &[f64]) -> Result<Vec<f64>>;
}

/// 0-1 dissimilarity on one-hot classes: \(\delta = 0\) iff \(y = y^\star\),
/// else 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroOneLoss;

impl BaseLoss for ZeroOneLoss {
    fn value(&self, y: &[f64], y_true: &[f64]) -> f64 {
        if y == y_true {
            0.0
        } else {
            1.0
        }
    }

    fn compute_maximizer(&self, theta: &[f64], alpha: f64, y_true: &[f64]) -> Result<Vec<f64>> {
        check_same_len(theta, y_true)?;
        // Over one-hot vertices the augmented objective at e_i is
        // alpha*theta_i + (1 - y_true_i), up to a constant in i.
        let scores: Vec<f64> = theta
            .iter()
            .zip(y_true)
            .map(|(&t, &yt)| alpha * t + (1.0 - yt))
            .collect();
        one_hot_argmax(&scores)
    }
}

/// Structured hinge loss over a pluggable base dissimilarity.
#[derive(Debug, Clone)]
pub struct StructuredSvmLoss<L> {
    base_loss: L,
    alpha: f64,
}

impl<L: BaseLoss> StructuredSvmLoss<L> {
    /// Build the hinge with margin scaling `alpha` (nonnegative, finite).
    pub fn new(base_loss: L, alpha: f64) -> Result<Self> {
        if alpha < 0.0 || !alpha.is_finite() {
            return Err(Error::InvalidAlpha(alpha));
        }
        Ok(Self { base_loss, alpha })
    }

    /// Margin scaling \(\alpha\).
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Loss value at `(theta, y_true)`.
    pub fn value(&self, theta: &[f64], y_true: &[f64]) -> Result<f64> {
        self.value_and_grad(theta, y_true).map(|(l, _)| l)
    }

    /// Loss value and its subgradient \(\alpha(y^\dagger - y^\star)\).
    pub fn value_and_grad(&self, theta: &[f64], y_true: &[f64]) -> Result<(f64, Vec<f64>)> {
        check_same_len(theta, y_true)?;
        let y_dagger = self
            .base_loss
            .compute_maximizer(theta, self.alpha, y_true)?;
        check_same_len(&y_dagger, theta)?;

        let loss = self.base_loss.value(&y_dagger, y_true)
            + self.alpha * (dot(theta, &y_dagger) - dot(theta, y_true));
        let grad = y_dagger
            .iter()
            .zip(y_true)
            .map(|(&yd, &yt)| self.alpha * (yd - yt))
            .collect();
        Ok((loss, grad))
    }

    /// Loss value together with its pullback.
    pub fn value_with_pullback(
        &self,
        theta: &[f64],
        y_true: &[f64],
    ) -> Result<(f64, GradPullback)> {
        let (loss, grad) = self.value_and_grad(theta, y_true)?;
        Ok((loss, GradPullback::new(grad)))
    }
}
