//! Reverse-mode contracts shared by every differentiable component.
//!
//! Each component exposes a `forward` method plus a `*_with_pullback` variant
//! returning the output together with a pullback object. The pullback maps an
//! upstream sensitivity \(\partial L / \partial \text{output}\) to the input
//! sensitivity \(\partial L / \partial \theta\), which is how these components
//! register with a host autodiff engine as opaque custom-derivative nodes.
//! Composite components assemble their pullback from the pullback data of
//! their parts; no rule is ever re-derived downstream, and the wrapped
//! maximizer itself is never differentiated.

use crate::utils::dot;
use crate::{Error, Result};

/// Pullback of a component with vector output.
pub trait VectorPullback {
    /// Map \(\partial L/\partial y\) to \(\partial L/\partial \theta\).
    fn backward(&self, upstream: &[f64]) -> Result<Vec<f64>>;
}

/// Pullback of a component with scalar output (losses, costs).
pub trait ScalarPullback {
    /// Map \(\partial L/\partial \ell\) to \(\partial L/\partial \theta\).
    fn backward(&self, upstream: f64) -> Result<Vec<f64>>;
}

/// Pullback of any scalar component whose input gradient is a fixed vector:
/// backward is just `upstream * grad`.
///
/// All structured losses produce one of these, which makes their exact
/// (sub)gradients inspectable before any scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct GradPullback {
    grad: Vec<f64>,
}

impl GradPullback {
    pub(crate) fn new(grad: Vec<f64>) -> Self {
        Self { grad }
    }

    /// The stored gradient with respect to the objective vector.
    pub fn grad(&self) -> &[f64] {
        &self.grad
    }
}

impl ScalarPullback for GradPullback {
    fn backward(&self, upstream: f64) -> Result<Vec<f64>> {
        if !upstream.is_finite() {
            return Err(Error::NonFinite("upstream sensitivity"));
        }
        Ok(self.grad.iter().map(|g| g * upstream).collect())
    }
}

/// Monte-Carlo pullback of a perturbation engine.
///
/// Holds the replicate solutions \(y_k\) and their score weights \(w_k\)
/// (noise realizations rescaled by the smoothing constants); backward is
/// \[
/// \partial\theta = \sum_k \langle \partial y, y_k \rangle \, w_k,
/// \]
/// the score-function estimate of the vector-Jacobian product. Only oracle
/// *values* enter; the oracle is never differentiated.
#[derive(Debug, Clone)]
pub struct SamplePullback {
    solutions: Vec<Vec<f64>>,
    weights: Vec<Vec<f64>>,
}

impl SamplePullback {
    pub(crate) fn new(solutions: Vec<Vec<f64>>, weights: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(solutions.len(), weights.len());
        debug_assert!(!solutions.is_empty());
        Self { solutions, weights }
    }

    /// Dimension expected of the upstream sensitivity.
    pub fn output_dim(&self) -> usize {
        self.solutions[0].len()
    }

    /// Number of stored replicates.
    pub fn nb_replicates(&self) -> usize {
        self.solutions.len()
    }

    /// Contract the stored score weights against one scalar per replicate:
    /// \(\sum_k c_k w_k\). This is how composed components (a downstream
    /// cost, a loss) reuse this pullback instead of re-deriving the
    /// score-function rule.
    pub(crate) fn weighted_sum(&self, coeffs: &[f64]) -> Result<Vec<f64>> {
        if coeffs.len() != self.weights.len() {
            return Err(Error::LengthMismatch(coeffs.len(), self.weights.len()));
        }
        let dim_in = self.weights[0].len();
        let mut grad = vec![0.0; dim_in];
        for (&c, w) in coeffs.iter().zip(&self.weights) {
            for (gi, wi) in grad.iter_mut().zip(w) {
                *gi += c * wi;
            }
        }
        Ok(grad)
    }
}

impl VectorPullback for SamplePullback {
    fn backward(&self, upstream: &[f64]) -> Result<Vec<f64>> {
        if upstream.len() != self.output_dim() {
            return Err(Error::LengthMismatch(upstream.len(), self.output_dim()));
        }
        let coeffs: Vec<f64> = self.solutions.iter().map(|y| dot(upstream, y)).collect();
        self.weighted_sum(&coeffs)
    }
}
