//! Capability interface of the wrapped combinatorial maximizer.

use crate::Result;

/// Black-box linear maximizer \(\theta \mapsto \operatorname{argmax}_{y \in
/// \mathcal{Y}} \theta^\top y\) over a problem-specific vertex set.
///
/// Implementations must be deterministic and side-effect-free for a fixed
/// `theta`, and must return a solution of the same length. Nothing in this
/// crate differentiates through a maximizer; smoothing wrappers only evaluate
/// it, and any error it returns is propagated to the caller unchanged (wrap
/// domain-specific failures with [`crate::Error::oracle`]).
pub trait Maximizer {
    /// Solve \(\operatorname{argmax}_{y \in \mathcal{Y}} \theta^\top y\).
    fn maximize(&self, theta: &[f64]) -> Result<Vec<f64>>;
}

/// Closures are maximizers, so solvers can be injected as plain values.
impl<F> Maximizer for F
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    fn maximize(&self, theta: &[f64]) -> Result<Vec<f64>> {
        self(theta)
    }
}
