//! Random sources handed to operators.
//!
//! Every chain owns one [`Randomizer`], seeded explicitly, so a fixed seed
//! reproduces the same sequence of proposals and chains running in parallel
//! share no generator state. Operators only see the [`RandomSource`] trait,
//! which lets tests script the exact draws a proposal receives.

use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// The sampling primitives operators draw from.
pub trait RandomSource {
    /// A draw from `Uniform[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64;

    /// A uniform integer in `0..n`. `n` must be positive.
    fn next_int(&mut self, n: u64) -> u64;

    /// A log-normal draw with log-scale standard deviation `s`.
    ///
    /// When `mean_in_real_space` is set, `m` is the mean of the distribution
    /// itself and the log-scale location becomes `ln(m) - s²/2`; otherwise `m`
    /// is the log-scale location.
    fn next_log_normal(&mut self, m: f64, s: f64, mean_in_real_space: bool) -> f64;
}

/// A seeded per-chain random source backed by [`SmallRng`].
#[derive(Debug, Clone)]
pub struct Randomizer {
    seed: u64,
    rng: SmallRng,
}

impl Randomizer {
    /// Creates a source with a random seed.
    pub fn new() -> Self {
        Self::seed_from_u64(thread_rng().gen::<u64>())
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A draw from `Uniform[0, 1)`, used by the chain for accept/reject.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen()
    }
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for Randomizer {
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.rng.gen::<f64>() * (hi - lo)
    }

    fn next_int(&mut self, n: u64) -> u64 {
        self.rng.gen_range(0..n)
    }

    fn next_log_normal(&mut self, m: f64, s: f64, mean_in_real_space: bool) -> f64 {
        let mu = if mean_in_real_space {
            m.ln() - 0.5 * s * s
        } else {
            m
        };
        let z: f64 = self.rng.sample(StandardNormal);
        (z * s + mu).exp()
    }
}

/// A source that replays fixed draws, for exercising operators on exact
/// perturbations.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedSource {
    pub uniforms: std::collections::VecDeque<f64>,
    pub ints: std::collections::VecDeque<u64>,
    pub log_normals: std::collections::VecDeque<f64>,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(uniforms: &[f64], ints: &[u64], log_normals: &[f64]) -> Self {
        Self {
            uniforms: uniforms.iter().copied().collect(),
            ints: ints.iter().copied().collect(),
            log_normals: log_normals.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedSource {
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        let x = self.uniforms.pop_front().expect("no scripted uniform left");
        assert!(lo <= x && x <= hi, "scripted uniform {x} outside [{lo}, {hi}]");
        x
    }

    fn next_int(&mut self, n: u64) -> u64 {
        let k = self.ints.pop_front().expect("no scripted integer left");
        assert!(k < n, "scripted integer {k} outside 0..{n}");
        k
    }

    fn next_log_normal(&mut self, _m: f64, _s: f64, _mean_in_real_space: bool) -> f64 {
        self.log_normals
            .pop_front()
            .expect("no scripted log-normal left")
    }
}
