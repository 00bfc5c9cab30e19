//! SPO+ loss: convex surrogate of the "Smart Predict-then-Optimize" regret.
//!
//! Given the true objective \(\theta^\star\) with optimal solution
//! \(y^\star\), the surrogate evaluates the maximizer once at the shifted
//! objective \(\theta_\alpha = \alpha\theta - \theta^\star\):
//! \[
//! \ell(\theta) = \langle \theta_\alpha,\, y_\alpha \rangle -
//! \langle \theta_\alpha,\, y^\star \rangle, \qquad
//! y_\alpha = M(\theta_\alpha),
//! \]
//! with subgradient \(\alpha\,(y_\alpha - y^\star)\). The value is
//! nonnegative whenever \(y^\star\) is feasible for \(M\), since the maximum
//! dominates the objective at \(y^\star\). The default \(\alpha = 2\) is the
//! standard convexification.

use crate::oracle::Maximizer;
use crate::pullback::GradPullback;
use crate::utils::{check_same_len, dot};
use crate::{Error, Result};

/// SPO+ loss around a maximizer, with convexification parameter \(\alpha\).
#[derive(Debug, Clone)]
pub struct SpoPlusLoss<M> {
    maximizer: M,
    alpha: f64,
}

impl<M: Maximizer> SpoPlusLoss<M> {
    /// SPO+ loss with the standard \(\alpha = 2\).
    pub fn new(maximizer: M) -> Self {
        Self {
            maximizer,
            alpha: 2.0,
        }
    }

    /// SPO+ loss with a custom \(\alpha\) (positive, finite).
    pub fn with_alpha(maximizer: M, alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || !alpha.is_finite() {
            return Err(Error::InvalidAlpha(alpha));
        }
        Ok(Self { maximizer, alpha })
    }

    /// Convexification parameter \(\alpha\).
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Loss value at `(theta, theta_true, y_true)`.
    pub fn value(&self, theta: &[f64], theta_true: &[f64], y_true: &[f64]) -> Result<f64> {
        self.value_and_grad(theta, theta_true, y_true)
            .map(|(l, _)| l)
    }

    /// Loss value and its subgradient \(\alpha(y_\alpha - y^\star)\).
    pub fn value_and_grad(
        &self,
        theta: &[f64],
        theta_true: &[f64],
        y_true: &[f64],
    ) -> Result<(f64, Vec<f64>)> {
        check_same_len(theta, theta_true)?;
        check_same_len(theta, y_true)?;

        let theta_alpha: Vec<f64> = theta
            .iter()
            .zip(theta_true)
            .map(|(&t, &tt)| self.alpha * t - tt)
            .collect();
        let y_alpha = self.maximizer.maximize(&theta_alpha)?;
        check_same_len(&y_alpha, theta)?;

        let loss = dot(&theta_alpha, &y_alpha) - dot(&theta_alpha, y_true);
        let grad = y_alpha
            .iter()
            .zip(y_true)
            .map(|(&ya, &yt)| self.alpha * (ya - yt))
            .collect();
        Ok((loss, grad))
    }

    /// Loss value together with its pullback.
    pub fn value_with_pullback(
        &self,
        theta: &[f64],
        theta_true: &[f64],
        y_true: &[f64],
    ) -> Result<(f64, GradPullback)> {
        let (loss, grad) = self.value_and_grad(theta, theta_true, y_true)?;
        Ok((loss, GradPullback::new(grad)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regularized::one_hot_argmax;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn vertex_argmax(theta: &[f64]) -> Result<Vec<f64>> {
        one_hot_argmax(theta)
    }

    #[test]
    fn alpha_is_validated() {
        assert!(matches!(
            SpoPlusLoss::with_alpha(vertex_argmax, 0.0),
            Err(Error::InvalidAlpha(_))
        ));
        assert!(matches!(
            SpoPlusLoss::with_alpha(vertex_argmax, f64::NAN),
            Err(Error::InvalidAlpha(_))
        ));
        assert_relative_eq!(SpoPlusLoss::new(vertex_argmax).alpha(), 2.0);
    }

    #[test]
    fn loss_vanishes_at_the_true_objective() {
        let theta_true = [3.0, 1.0, 2.0];
        let y_true = one_hot_argmax(&theta_true).unwrap();
        let loss = SpoPlusLoss::new(vertex_argmax);
        let (value, grad) = loss
            .value_and_grad(&theta_true, &theta_true, &y_true)
            .unwrap();
        assert_relative_eq!(value, 0.0, epsilon = 1e-12);
        assert_eq!(grad, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn shifted_objective_produces_the_hand_computed_loss() {
        // theta_alpha = 2*[0,2,1] - [3,1,2] = [-3,3,0], so y_alpha = e2;
        // loss = <theta_alpha, e2 - e1> = 3 - (-3) = 6.
        let theta = [0.0, 2.0, 1.0];
        let theta_true = [3.0, 1.0, 2.0];
        let y_true = [1.0, 0.0, 0.0];
        let loss = SpoPlusLoss::new(vertex_argmax);
        let (value, grad) = loss.value_and_grad(&theta, &theta_true, &y_true).unwrap();
        assert_relative_eq!(value, 6.0, epsilon = 1e-12);
        assert_eq!(grad, vec![-2.0, 2.0, 0.0]);
    }

    #[test]
    fn missing_dimensions_are_rejected() {
        let loss = SpoPlusLoss::new(vertex_argmax);
        assert!(matches!(
            loss.value(&[1.0, 2.0], &[1.0], &[1.0, 0.0]),
            Err(Error::LengthMismatch(2, 1))
        ));
    }

    proptest! {
        #[test]
        fn loss_is_nonnegative_on_feasible_targets(
            theta in prop::collection::vec(-5.0f64..5.0, 4),
            theta_true in prop::collection::vec(-5.0f64..5.0, 4)
        ) {
            let y_true = one_hot_argmax(&theta_true).unwrap();
            let loss = SpoPlusLoss::new(vertex_argmax);
            let value = loss.value(&theta, &theta_true, &y_true).unwrap();
            prop_assert!(value >= -1e-9, "value = {value}");
        }

        #[test]
        fn gradient_scales_with_alpha(
            theta in prop::collection::vec(-5.0f64..5.0, 3),
            theta_true in prop::collection::vec(-5.0f64..5.0, 3),
            alpha in 0.5f64..4.0
        ) {
            let y_true = one_hot_argmax(&theta_true).unwrap();
            let loss = SpoPlusLoss::with_alpha(vertex_argmax, alpha).unwrap();
            let (_, grad) = loss.value_and_grad(&theta, &theta_true, &y_true).unwrap();
            // Entries of alpha*(y_alpha - y_true) lie in {-alpha, 0, alpha}.
            for g in grad {
                prop_assert!(
                    g.abs() < 1e-12 || (g.abs() - alpha).abs() < 1e-12,
                    "g = {g}, alpha = {alpha}"
                );
            }
        }
    }
}
