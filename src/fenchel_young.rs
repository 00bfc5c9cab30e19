//! Fenchel-Young loss.
//!
//! For a regularizer \(\Omega\) with prediction map
//! \(\hat y_\Omega(\theta) = \operatorname{argmax}_y \{\theta^\top y -
//! \Omega(y)\}\), the Fenchel-Young loss is
//! \[
//! \ell_\Omega(\theta; y^\star) = \Omega^*(\theta) + \Omega(y^\star)
//! - \theta^\top y^\star,
//! \]
//! convex in \(\theta\), nonnegative for \(y^\star\) in the prediction
//! domain, and, by Fenchel duality, with gradient
//! \(\nabla_\theta \ell = \hat y_\Omega(\theta) - y^\star\) for *any*
//! regularizer. The loss works equally over closed-form regularized
//! predictors, where \(\Omega^*(\theta) = \theta^\top\hat y - \Omega(\hat y)\),
//! and over perturbed black-box predictors, where the conjugate is the
//! Monte-Carlo mean of perturbed optimal objectives; there
//! \(\Omega(y^\star)\) has no closed form and is dropped, a constant shift
//! that leaves the gradient, and hence training, untouched.

use crate::oracle::Maximizer;
use crate::perturbed::{PerturbedAdditive, PerturbedMultiplicative};
use crate::pullback::GradPullback;
use crate::regularized::{Regularized, SoftArgmax, SparseArgmax};
use crate::utils::{check_same_len, dot};
use crate::Result;

/// What the Fenchel-Young loss needs from a predictor: the prediction
/// \(\hat y(\theta)\) with the conjugate value \(\Omega^*(\theta)\), and the
/// regularization \(\Omega(y^\star)\) of a target where it has a closed form.
///
/// Methods take `&mut self` because perturbed predictors advance an RNG
/// stream; closed-form implementors simply do not use the mutability.
pub trait FenchelYoungPredictor {
    /// Compute \((\hat y(\theta), \Omega^*(\theta))\).
    fn prediction_and_conjugate(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)>;

    /// Compute \(\Omega(y^\star)\), or 0 where \(\Omega\) has no closed form.
    fn target_regularization(&self, y_true: &[f64]) -> f64;
}

fn conjugate_via_prediction<P: Regularized>(
    predictor: &P,
    theta: &[f64],
) -> Result<(Vec<f64>, f64)> {
    let y_hat = predictor.predict(theta)?;
    let conjugate = dot(theta, &y_hat) - predictor.regularization(&y_hat);
    Ok((y_hat, conjugate))
}

impl FenchelYoungPredictor for SoftArgmax {
    fn prediction_and_conjugate(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        conjugate_via_prediction(self, theta)
    }

    fn target_regularization(&self, y_true: &[f64]) -> f64 {
        self.regularization(y_true)
    }
}

impl FenchelYoungPredictor for SparseArgmax {
    fn prediction_and_conjugate(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        conjugate_via_prediction(self, theta)
    }

    fn target_regularization(&self, y_true: &[f64]) -> f64 {
        self.regularization(y_true)
    }
}

impl<M: Maximizer> FenchelYoungPredictor for PerturbedAdditive<M> {
    fn prediction_and_conjugate(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        self.prediction_and_objective(theta)
    }

    fn target_regularization(&self, _y_true: &[f64]) -> f64 {
        0.0
    }
}

impl<M: Maximizer> FenchelYoungPredictor for PerturbedMultiplicative<M> {
    fn prediction_and_conjugate(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        self.prediction_and_objective(theta)
    }

    fn target_regularization(&self, _y_true: &[f64]) -> f64 {
        0.0
    }
}

/// Fenchel-Young loss over a given predictor.
#[derive(Debug, Clone)]
pub struct FenchelYoungLoss<P> {
    predictor: P,
}

impl<P: FenchelYoungPredictor> FenchelYoungLoss<P> {
    /// Build the loss around a predictor.
    pub fn new(predictor: P) -> Self {
        Self { predictor }
    }

    /// The wrapped predictor.
    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Loss value at `(theta, y_true)`.
    pub fn value(&mut self, theta: &[f64], y_true: &[f64]) -> Result<f64> {
        self.value_and_grad(theta, y_true).map(|(l, _)| l)
    }

    /// Loss value and its exact gradient \(\hat y(\theta) - y^\star\).
    pub fn value_and_grad(&mut self, theta: &[f64], y_true: &[f64]) -> Result<(f64, Vec<f64>)> {
        check_same_len(theta, y_true)?;
        let (y_hat, conjugate) = self.predictor.prediction_and_conjugate(theta)?;
        let loss =
            conjugate + self.predictor.target_regularization(y_true) - dot(theta, y_true);
        let grad = y_hat.iter().zip(y_true).map(|(&p, &t)| p - t).collect();
        Ok((loss, grad))
    }

    /// Loss value together with its pullback.
    pub fn value_with_pullback(
        &mut self,
        theta: &[f64],
        y_true: &[f64],
    ) -> Result<(f64, GradPullback)> {
        let (loss, grad) = self.value_and_grad(theta, y_true)?;
        Ok((loss, GradPullback::new(grad)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regularized::soft_argmax;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// Central finite difference of a scalar function of theta.
    fn finite_difference<F: FnMut(&[f64]) -> f64>(mut f: F, theta: &[f64], h: f64) -> Vec<f64> {
        let mut grad = vec![0.0; theta.len()];
        let mut probe = theta.to_vec();
        for i in 0..theta.len() {
            probe[i] = theta[i] + h;
            let up = f(&probe);
            probe[i] = theta[i] - h;
            let down = f(&probe);
            probe[i] = theta[i];
            grad[i] = (up - down) / (2.0 * h);
        }
        grad
    }

    #[test]
    fn entropic_loss_matches_log_sum_exp_minus_score() {
        // With the entropic regularizer, the conjugate is log-sum-exp, so at
        // a one-hot target the loss is lse(theta) - theta_true.
        let theta = [3.0, 1.0, 2.0];
        let y_true = [1.0, 0.0, 0.0];
        let mut loss = FenchelYoungLoss::new(SoftArgmax);
        let (value, grad) = loss.value_and_grad(&theta, &y_true).unwrap();

        let lse = 3.0 + (1.0 + (-2.0f64).exp() + (-1.0f64).exp()).ln();
        assert_relative_eq!(value, lse - 3.0, epsilon = 1e-9);

        let s = soft_argmax(&theta).unwrap();
        for i in 0..3 {
            assert_relative_eq!(grad[i], s[i] - y_true[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn entropic_gradient_matches_finite_differences() {
        let theta = [0.3, -1.2, 0.8, 0.1];
        let y_true = [0.0, 0.0, 1.0, 0.0];
        let mut loss = FenchelYoungLoss::new(SoftArgmax);
        let (_, grad) = loss.value_and_grad(&theta, &y_true).unwrap();

        let numeric = finite_difference(
            |t| {
                FenchelYoungLoss::new(SoftArgmax)
                    .value(t, &y_true)
                    .unwrap()
            },
            &theta,
            1e-6,
        );
        for (g, n) in grad.iter().zip(&numeric) {
            assert_relative_eq!(g, n, epsilon = 1e-4);
        }
    }

    #[test]
    fn sparse_gradient_matches_finite_differences() {
        // Away from the projection's kinks the loss is smooth.
        let theta = [0.9, -0.4, 0.3];
        let y_true = [0.0, 0.0, 1.0];
        let mut loss = FenchelYoungLoss::new(SparseArgmax);
        let (_, grad) = loss.value_and_grad(&theta, &y_true).unwrap();

        let numeric = finite_difference(
            |t| {
                FenchelYoungLoss::new(SparseArgmax)
                    .value(t, &y_true)
                    .unwrap()
            },
            &theta,
            1e-6,
        );
        for (g, n) in grad.iter().zip(&numeric) {
            assert_relative_eq!(g, n, epsilon = 1e-4);
        }
    }

    #[test]
    fn loss_vanishes_at_the_predictor_output() {
        let theta = [1.0, -0.5, 0.2];
        let mut loss = FenchelYoungLoss::new(SoftArgmax);
        let y_hat = soft_argmax(&theta).unwrap();
        let value = loss.value(&theta, &y_hat).unwrap();
        assert_relative_eq!(value, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut loss = FenchelYoungLoss::new(SoftArgmax);
        assert!(matches!(
            loss.value(&[1.0, 2.0], &[1.0]),
            Err(crate::Error::LengthMismatch(2, 1))
        ));
    }

    #[test]
    fn perturbed_predictor_gradient_is_prediction_minus_target() {
        let vertex_argmax =
            |theta: &[f64]| -> Result<Vec<f64>> { crate::regularized::one_hot_argmax(theta) };
        let theta = [0.5, 0.0, -0.5];
        let y_true = [1.0, 0.0, 0.0];

        let engine = PerturbedAdditive::seeded(vertex_argmax, 0.5, 256, 17).unwrap();
        let mut loss = FenchelYoungLoss::new(engine);
        let (_, grad) = loss.value_and_grad(&theta, &y_true).unwrap();

        let mut engine = PerturbedAdditive::seeded(vertex_argmax, 0.5, 256, 17).unwrap();
        let y_hat = engine.forward(&theta).unwrap();
        for i in 0..3 {
            assert_relative_eq!(grad[i], y_hat[i] - y_true[i], epsilon = 1e-12);
        }
    }

    proptest! {
        #[test]
        fn loss_is_nonnegative_on_the_simplex(
            theta in prop::collection::vec(-5.0f64..5.0, 2..8),
            raw in prop::collection::vec(0.01f64..1.0, 2..8)
        ) {
            // Project the raw weights to a distribution of matching length.
            let d = theta.len().min(raw.len());
            let theta = &theta[..d];
            let total: f64 = raw[..d].iter().sum();
            let y_true: Vec<f64> = raw[..d].iter().map(|w| w / total).collect();

            let entropic = FenchelYoungLoss::new(SoftArgmax).value(theta, &y_true).unwrap();
            prop_assert!(entropic >= -1e-9, "entropic loss = {entropic}");

            let sparse = FenchelYoungLoss::new(SparseArgmax).value(theta, &y_true).unwrap();
            prop_assert!(sparse >= -1e-9, "sparse loss = {sparse}");
        }
    }
}
