//! Monte-Carlo smoothing of a black-box maximizer.
//!
//! An engine wraps a maximizer \(M\) and averages it over `nb_samples`
//! randomly perturbed objectives. The smoothed map
//! \(\bar y(\theta) = \mathbb{E}_Z[M(\text{perturb}(\theta, Z))]\) is
//! differentiable even though \(M\) is piecewise constant, and its
//! vector-Jacobian products are estimated from oracle values alone via the
//! Gaussian score-function (Stein) identity:
//! \[
//! \partial_\theta \, \mathbb{E}[M(\theta + \varepsilon Z)]
//! \approx \frac{1}{K\varepsilon} \sum_{k=1}^{K} M(\theta + \varepsilon Z_k)
//! \otimes Z_k, \qquad Z_k \sim \mathcal{N}(0, I).
//! \]
//! [`PerturbedAdditive`] shifts the objective, \(\theta + \varepsilon Z\).
//! [`PerturbedMultiplicative`] rescales it, \(\theta \odot
//! \exp(\varepsilon Z - \varepsilon^2/2)\): mean-preserving log-normal noise
//! for objectives whose entries must keep their sign and scale (e.g. strictly
//! positive costs). Its score weights carry a \(1/\theta_i\) factor from the
//! log-normal Stein identity, so the backward pass requires componentwise
//! nonzero \(\theta\).
//!
//! Replicate `k` draws from its own pre-split ChaCha sub-stream (per-call
//! base seed, stream counter `k`), and replicates are combined by an
//! arithmetic mean. The reduction is order-independent, so dispatching
//! replicates across workers would change neither the numbers nor the
//! statistics. A fixed seed replays the same draws on every call, bit for
//! bit; an unseeded engine advances its own generator between calls. Oracle
//! calls are atomic: any oracle error aborts the whole evaluation unchanged,
//! and no partial mean is returned.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::oracle::Maximizer;
use crate::pullback::SamplePullback;
use crate::utils::dot;
use crate::{Error, Result};

/// Noise law: how an objective entry is perturbed and how the matching
/// score weight is formed.
#[derive(Debug, Clone, Copy)]
enum Noise {
    Additive,
    Multiplicative,
}

impl Noise {
    fn perturb(self, theta_i: f64, z_i: f64, epsilon: f64) -> f64 {
        match self {
            Noise::Additive => theta_i + epsilon * z_i,
            Noise::Multiplicative => theta_i * (epsilon * z_i - 0.5 * epsilon * epsilon).exp(),
        }
    }

    fn weight(self, theta_i: f64, z_i: f64, epsilon: f64, inv_k: f64) -> f64 {
        match self {
            Noise::Additive => z_i * inv_k / epsilon,
            Noise::Multiplicative => z_i * inv_k / (epsilon * theta_i),
        }
    }
}

/// One Monte-Carlo evaluation: replicate solutions, their score weights
/// (already rescaled by \(1/(K\varepsilon)\) and, for multiplicative noise,
/// \(1/\theta_i\)), and the perturbed optimal objectives
/// \(\langle \theta_k, y_k \rangle\).
pub(crate) struct PerturbationBatch {
    pub(crate) solutions: Vec<Vec<f64>>,
    pub(crate) weights: Vec<Vec<f64>>,
    pub(crate) objectives: Vec<f64>,
}

impl PerturbationBatch {
    pub(crate) fn mean_solution(&self) -> Vec<f64> {
        let k = self.solutions.len() as f64;
        let mut mean = vec![0.0; self.solutions[0].len()];
        for y in &self.solutions {
            for (mi, yi) in mean.iter_mut().zip(y) {
                *mi += yi;
            }
        }
        for mi in &mut mean {
            *mi /= k;
        }
        mean
    }

    pub(crate) fn mean_objective(&self) -> f64 {
        self.objectives.iter().sum::<f64>() / self.objectives.len() as f64
    }

    pub(crate) fn into_pullback(self) -> Result<SamplePullback> {
        for w in &self.weights {
            if w.iter().any(|wi| !wi.is_finite()) {
                return Err(Error::NonFinite("perturbation score weights"));
            }
        }
        Ok(SamplePullback::new(self.solutions, self.weights))
    }
}

fn run_monte_carlo<M: Maximizer>(
    maximizer: &M,
    theta: &[f64],
    epsilon: f64,
    nb_samples: usize,
    base_seed: u64,
    noise: Noise,
) -> Result<PerturbationBatch> {
    if theta.is_empty() {
        return Err(Error::EmptyInput);
    }
    let d = theta.len();
    let inv_k = 1.0 / nb_samples as f64;
    let mut solutions = Vec::with_capacity(nb_samples);
    let mut weights = Vec::with_capacity(nb_samples);
    let mut objectives = Vec::with_capacity(nb_samples);
    for k in 0..nb_samples {
        // Pre-split sub-stream: replicates are independent of each other
        // and of evaluation order.
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
        rng.set_stream(k as u64);

        let mut perturbed = vec![0.0; d];
        let mut weight = vec![0.0; d];
        for i in 0..d {
            let z: f64 = rng.sample(StandardNormal);
            perturbed[i] = noise.perturb(theta[i], z, epsilon);
            weight[i] = noise.weight(theta[i], z, epsilon, inv_k);
        }

        let y = maximizer.maximize(&perturbed)?;
        if y.len() != d {
            return Err(Error::LengthMismatch(y.len(), d));
        }
        objectives.push(dot(&perturbed, &y));
        solutions.push(y);
        weights.push(weight);
    }
    Ok(PerturbationBatch {
        solutions,
        weights,
        objectives,
    })
}

fn validate_config(epsilon: f64, nb_samples: usize) -> Result<()> {
    if epsilon <= 0.0 || !epsilon.is_finite() {
        return Err(Error::InvalidEpsilon(epsilon));
    }
    if nb_samples == 0 {
        return Err(Error::InvalidSampleCount(nb_samples));
    }
    Ok(())
}

/// Additive Gaussian smoothing: \(\theta \mapsto \theta + \varepsilon Z\).
#[derive(Debug, Clone)]
pub struct PerturbedAdditive<M> {
    maximizer: M,
    epsilon: f64,
    nb_samples: usize,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl<M: Maximizer> PerturbedAdditive<M> {
    /// Engine with entropy-seeded draws: successive calls with the same
    /// `theta` are independent Monte-Carlo estimates.
    pub fn new(maximizer: M, epsilon: f64, nb_samples: usize) -> Result<Self> {
        validate_config(epsilon, nb_samples)?;
        Ok(Self {
            maximizer,
            epsilon,
            nb_samples,
            seed: None,
            rng: ChaCha8Rng::from_entropy(),
        })
    }

    /// Engine with a fixed seed: successive calls with the same `theta`
    /// replay identical draws, bit for bit.
    pub fn seeded(maximizer: M, epsilon: f64, nb_samples: usize, seed: u64) -> Result<Self> {
        validate_config(epsilon, nb_samples)?;
        Ok(Self {
            maximizer,
            epsilon,
            nb_samples,
            seed: Some(seed),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Noise scale \(\varepsilon\).
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Monte-Carlo replicate count \(K\).
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    pub(crate) fn run(&mut self, theta: &[f64]) -> Result<PerturbationBatch> {
        let base = match self.seed {
            Some(seed) => seed,
            None => self.rng.next_u64(),
        };
        run_monte_carlo(
            &self.maximizer,
            theta,
            self.epsilon,
            self.nb_samples,
            base,
            Noise::Additive,
        )
    }

    /// Smoothed prediction \(\bar y(\theta)\), the mean of the replicate
    /// solutions. Lies in the convex hull of the oracle's vertex set.
    pub fn forward(&mut self, theta: &[f64]) -> Result<Vec<f64>> {
        Ok(self.run(theta)?.mean_solution())
    }

    /// Smoothed prediction together with its score-function pullback.
    pub fn forward_with_pullback(&mut self, theta: &[f64]) -> Result<(Vec<f64>, SamplePullback)> {
        let batch = self.run(theta)?;
        let y = batch.mean_solution();
        Ok((y, batch.into_pullback()?))
    }

    /// Smoothed prediction \(\bar y(\theta)\) together with the mean
    /// perturbed optimal objective
    /// \(\bar F(\theta) = \tfrac1K \sum_k \langle \theta_k, y_k \rangle\),
    /// the Monte-Carlo estimate of the convex conjugate consumed by the
    /// Fenchel-Young loss.
    pub fn prediction_and_objective(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        let batch = self.run(theta)?;
        Ok((batch.mean_solution(), batch.mean_objective()))
    }
}

/// Multiplicative log-normal smoothing:
/// \(\theta \mapsto \theta \odot \exp(\varepsilon Z - \varepsilon^2/2)\).
///
/// Mean-preserving and sign-preserving; intended for objectives with a fixed
/// componentwise scale, such as strictly positive costs. The backward pass
/// divides by \(\varepsilon\theta_i\) and reports `NonFinite` on zero entries.
#[derive(Debug, Clone)]
pub struct PerturbedMultiplicative<M> {
    maximizer: M,
    epsilon: f64,
    nb_samples: usize,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl<M: Maximizer> PerturbedMultiplicative<M> {
    /// Engine with entropy-seeded draws: successive calls with the same
    /// `theta` are independent Monte-Carlo estimates.
    pub fn new(maximizer: M, epsilon: f64, nb_samples: usize) -> Result<Self> {
        validate_config(epsilon, nb_samples)?;
        Ok(Self {
            maximizer,
            epsilon,
            nb_samples,
            seed: None,
            rng: ChaCha8Rng::from_entropy(),
        })
    }

    /// Engine with a fixed seed: successive calls with the same `theta`
    /// replay identical draws, bit for bit.
    pub fn seeded(maximizer: M, epsilon: f64, nb_samples: usize, seed: u64) -> Result<Self> {
        validate_config(epsilon, nb_samples)?;
        Ok(Self {
            maximizer,
            epsilon,
            nb_samples,
            seed: Some(seed),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Noise scale \(\varepsilon\).
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Monte-Carlo replicate count \(K\).
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    pub(crate) fn run(&mut self, theta: &[f64]) -> Result<PerturbationBatch> {
        let base = match self.seed {
            Some(seed) => seed,
            None => self.rng.next_u64(),
        };
        run_monte_carlo(
            &self.maximizer,
            theta,
            self.epsilon,
            self.nb_samples,
            base,
            Noise::Multiplicative,
        )
    }

    /// Smoothed prediction \(\bar y(\theta)\), the mean of the replicate
    /// solutions.
    pub fn forward(&mut self, theta: &[f64]) -> Result<Vec<f64>> {
        Ok(self.run(theta)?.mean_solution())
    }

    /// Smoothed prediction together with its score-function pullback.
    pub fn forward_with_pullback(&mut self, theta: &[f64]) -> Result<(Vec<f64>, SamplePullback)> {
        let batch = self.run(theta)?;
        let y = batch.mean_solution();
        Ok((y, batch.into_pullback()?))
    }

    /// Smoothed prediction together with the mean perturbed optimal
    /// objective; see [`PerturbedAdditive::prediction_and_objective`].
    pub fn prediction_and_objective(&mut self, theta: &[f64]) -> Result<(Vec<f64>, f64)> {
        let batch = self.run(theta)?;
        Ok((batch.mean_solution(), batch.mean_objective()))
    }
}
