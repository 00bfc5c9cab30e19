//! Piecewise-linear interpolation of a black-box maximizer.
//!
//! The forward pass is the unmodified oracle output \(y = M(\theta)\). The
//! backward pass probes the oracle once more, along the incoming sensitivity:
//! \[
//! \partial\theta = \frac{M(\theta + \lambda \, \partial y) - y}{\lambda},
//! \]
//! the finite difference of the interpolated solver. Small \(\lambda\) stays
//! faithful to the solver but yields mostly-zero gradients; larger \(\lambda\)
//! trades faithfulness for informative descent directions. As everywhere in
//! this crate, the oracle is only evaluated, never differentiated.

use crate::oracle::Maximizer;
use crate::pullback::VectorPullback;
use crate::utils::check_same_len;
use crate::{Error, Result};

/// Interpolated surrogate of a maximizer, with probe step \(\lambda\).
#[derive(Debug, Clone)]
pub struct Interpolation<M> {
    maximizer: M,
    lambda: f64,
}

impl<M: Maximizer> Interpolation<M> {
    /// Wrap `maximizer` with probe step `lambda` (positive, finite).
    pub fn new(maximizer: M, lambda: f64) -> Result<Self> {
        if lambda <= 0.0 || !lambda.is_finite() {
            return Err(Error::InvalidLambda(lambda));
        }
        Ok(Self { maximizer, lambda })
    }

    /// Probe step \(\lambda\).
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// The oracle's own solution, untouched.
    pub fn forward(&self, theta: &[f64]) -> Result<Vec<f64>> {
        if theta.is_empty() {
            return Err(Error::EmptyInput);
        }
        let y = self.maximizer.maximize(theta)?;
        if y.len() != theta.len() {
            return Err(Error::LengthMismatch(y.len(), theta.len()));
        }
        Ok(y)
    }

    /// Solution together with its interpolation pullback.
    pub fn forward_with_pullback(
        &self,
        theta: &[f64],
    ) -> Result<(Vec<f64>, InterpolationPullback<'_, M>)> {
        let y = self.forward(theta)?;
        let pullback = InterpolationPullback {
            interpolation: self,
            theta: theta.to_vec(),
            y: y.clone(),
        };
        Ok((y, pullback))
    }
}

/// Pullback of [`Interpolation`]; holds the forward point and re-probes the
/// oracle at \(\theta + \lambda\,\partial y\) when invoked.
#[derive(Debug)]
pub struct InterpolationPullback<'a, M> {
    interpolation: &'a Interpolation<M>,
    theta: Vec<f64>,
    y: Vec<f64>,
}

impl<M: Maximizer> VectorPullback for InterpolationPullback<'_, M> {
    fn backward(&self, upstream: &[f64]) -> Result<Vec<f64>> {
        check_same_len(upstream, &self.theta)?;
        let lambda = self.interpolation.lambda;
        let probe: Vec<f64> = self
            .theta
            .iter()
            .zip(upstream)
            .map(|(&t, &u)| t + lambda * u)
            .collect();
        let y_probe = self.interpolation.maximizer.maximize(&probe)?;
        check_same_len(&y_probe, &self.y)?;
        Ok(y_probe
            .iter()
            .zip(&self.y)
            .map(|(&a, &b)| (a - b) / lambda)
            .collect())
    }
}
