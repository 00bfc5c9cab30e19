//! Differentiable surrogates for black-box combinatorial maximizers.
//!
//! A combinatorial or LP solver maps an objective vector \(\theta\) to a vertex
//! \(\hat y(\theta) = \operatorname{argmax}_{y \in \mathcal{Y}} \theta^\top y\)
//! of its feasible polytope. That map is piecewise constant and therefore
//! useless to gradient-based training as-is. This crate builds smooth,
//! trainable surrogates around such a solver without ever differentiating it:
//!
//! - [`perturbed`]: Monte-Carlo smoothing by additive or multiplicative noise,
//!   with score-function gradient estimates;
//! - [`regularized`]: closed-form regularized prediction on the probability
//!   simplex (one-hot, entropic, sparse);
//! - [`interpolation`]: piecewise-linear interpolation of the solver;
//! - [`composition`]: a perturbed solver chained through a downstream cost,
//!   for direct regret minimization;
//! - [`fenchel_young`], [`spo_plus`], [`ssvm`]: structured losses with exact
//!   subgradients, built on the predictors above;
//! - [`pullback`]: the reverse-mode contract that lets all of the above
//!   compose with a host autodiff engine as opaque custom-derivative nodes.
//!
//! Public invariants (must not change):
//! - APIs are backend-agnostic (slice-based, `Vec<f64>` outputs).
//! - The wrapped maximizer is a black box: evaluated, never differentiated.
//! - Smoothing and margin parameters (\(\varepsilon\), \(\lambda\), \(\alpha\))
//!   are explicit and validated at construction.
//! - All randomness lives behind an engine-owned, optionally seeded RNG;
//!   there is no process-wide random state.

pub mod composition;
pub mod fenchel_young;
pub mod interpolation;
pub mod oracle;
pub mod perturbed;
pub mod pullback;
pub mod regularized;
pub mod spo_plus;
pub mod ssvm;
pub mod utils;

pub use composition::PerturbedComposition;
pub use fenchel_young::{FenchelYoungLoss, FenchelYoungPredictor};
pub use interpolation::Interpolation;
pub use oracle::Maximizer;
pub use perturbed::{PerturbedAdditive, PerturbedMultiplicative};
pub use pullback::{GradPullback, SamplePullback, ScalarPullback, VectorPullback};
pub use regularized::{
    one_hot_argmax, simplex_projection_and_support, soft_argmax, sparse_argmax, OneHotArgmax,
    Regularized, SoftArgmax, SparseArgmax,
};
pub use spo_plus::SpoPlusLoss;
pub use ssvm::{BaseLoss, StructuredSvmLoss, ZeroOneLoss};
pub use utils::{half_square_norm, isproba, isprobadist, positive_part, ranking, shannon_entropy};

/// Errors shared by every component of the crate.
///
/// Configuration errors (`InvalidEpsilon`, `InvalidSampleCount`,
/// `InvalidLambda`, `InvalidAlpha`) are raised at construction time; shape
/// errors (`EmptyInput`, `LengthMismatch`) and `NonFinite` are raised by the
/// failing call. `Oracle` carries whatever the wrapped maximizer raised,
/// unmodified. Nothing is retried and no partial result is ever returned.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Inputs must be non-empty vectors.
    #[error("inputs must be non-empty")]
    EmptyInput,
    /// Vectors that should share a dimension do not.
    #[error("length mismatch: {0} vs {1}")]
    LengthMismatch(usize, usize),
    /// Noise scale \(\varepsilon\) must be positive and finite.
    #[error("epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),
    /// Monte-Carlo replicate count must be at least 1.
    #[error("nb_samples must be at least 1, got {0}")]
    InvalidSampleCount(usize),
    /// Interpolation step \(\lambda\) must be positive and finite.
    #[error("lambda must be positive and finite, got {0}")]
    InvalidLambda(f64),
    /// Loss scaling \(\alpha\) out of its admissible range.
    #[error("alpha must be finite and within its admissible range, got {0}")]
    InvalidAlpha(f64),
    /// A non-finite value appeared where a finite one is required.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    /// Failure raised by the wrapped maximizer, propagated unchanged.
    #[error(transparent)]
    Oracle(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wrap a maximizer-specific failure for propagation through this crate.
    pub fn oracle<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Oracle(Box::new(err))
    }
}

/// Convenience result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_errors_carry_their_source_unchanged() {
        #[derive(thiserror::Error, Debug)]
        #[error("infeasible instance")]
        struct Infeasible;

        let err = Error::oracle(Infeasible);
        assert_eq!(err.to_string(), "infeasible instance");
        match err {
            Error::Oracle(_) => {}
            other => panic!("expected Oracle, got {other:?}"),
        }
    }
}
