//! A perturbed maximizer chained through a downstream scalar function.
//!
//! For direct regret minimization the quantity of interest is not the
//! smoothed solution itself but a scalar cost of it,
//! \(\mathbb{E}_Z[g(M(\text{perturb}(\theta, Z)))]\). The score-function
//! identity applies to \(g \circ M\) exactly as it does to \(M\): the same
//! replicate noise weights, with \(g(y_k)\) in place of \(y_k\), give
//! \[
//! \partial_\theta \, \mathbb{E}[g(M(\theta + \varepsilon Z))]
//! \approx \sum_k g(y_k) \, w_k.
//! \]
//! The wrapper therefore contracts the engine's own pullback weights against
//! the sampled costs instead of deriving a new rule; the backward pass is
//! supplied once per engine variant.

use crate::oracle::Maximizer;
use crate::perturbed::{PerturbedAdditive, PerturbedMultiplicative};
use crate::pullback::GradPullback;
use crate::Result;

/// Composition of a perturbation engine with a downstream function
/// \(g : \mathbb{R}^d \to \mathbb{R}\) (typically a cost).
#[derive(Debug, Clone)]
pub struct PerturbedComposition<P, G> {
    perturbed: P,
    g: G,
}

impl<P, G> PerturbedComposition<P, G> {
    /// Chain `g` after a perturbation engine.
    pub fn new(perturbed: P, g: G) -> Self {
        Self { perturbed, g }
    }

    /// The wrapped engine.
    pub fn perturbed(&self) -> &P {
        &self.perturbed
    }
}

impl<M, G> PerturbedComposition<PerturbedAdditive<M>, G>
where
    M: Maximizer,
    G: Fn(&[f64]) -> f64,
{
    /// Monte-Carlo estimate of \(\mathbb{E}[g(M(\theta + \varepsilon Z))]\).
    pub fn forward(&mut self, theta: &[f64]) -> Result<f64> {
        let batch = self.perturbed.run(theta)?;
        let total: f64 = batch.solutions.iter().map(|y| (self.g)(y)).sum();
        Ok(total / batch.solutions.len() as f64)
    }

    /// Estimate together with its score-function pullback.
    pub fn forward_with_pullback(&mut self, theta: &[f64]) -> Result<(f64, GradPullback)> {
        let batch = self.perturbed.run(theta)?;
        let g_samples: Vec<f64> = batch.solutions.iter().map(|y| (self.g)(y)).collect();
        let value = g_samples.iter().sum::<f64>() / g_samples.len() as f64;
        let grad = batch.into_pullback()?.weighted_sum(&g_samples)?;
        Ok((value, GradPullback::new(grad)))
    }
}

impl<M, G> PerturbedComposition<PerturbedMultiplicative<M>, G>
where
    M: Maximizer,
    G: Fn(&[f64]) -> f64,
{
    /// Monte-Carlo estimate of
    /// \(\mathbb{E}[g(M(\theta \odot e^{\varepsilon Z - \varepsilon^2/2}))]\).
    pub fn forward(&mut self, theta: &[f64]) -> Result<f64> {
        let batch = self.perturbed.run(theta)?;
        let total: f64 = batch.solutions.iter().map(|y| (self.g)(y)).sum();
        Ok(total / batch.solutions.len() as f64)
    }

    /// Estimate together with its score-function pullback.
    pub fn forward_with_pullback(&mut self, theta: &[f64]) -> Result<(f64, GradPullback)> {
        let batch = self.perturbed.run(theta)?;
        let g_samples: Vec<f64> = batch.solutions.iter().map(|y| (self.g)(y)).collect();
        let value = g_samples.iter().sum::<f64>() / g_samples.len() as f64;
        let grad = batch.into_pullback()?.weighted_sum(&g_samples)?;
        Ok((value, GradPullback::new(grad)))
    }
}
