//! Mean-reverting (Ornstein-Uhlenbeck) noise used for every jittery sensor channel.

use rand::Rng;
use rand_distr::StandardNormal;

/// One OU step: `previous * (1 - mean_reversion_rate) + N(0, volatility)`.
///
/// The result is unbounded; callers clamp whatever quantity it perturbs.
/// A non-positive volatility degenerates to a pure decay step.
pub fn ou_step<R: Rng + ?Sized>(
    rng: &mut R,
    previous: f64,
    mean_reversion_rate: f64,
    volatility: f64,
) -> f64 {
    let decayed = previous * (1.0 - mean_reversion_rate);
    if volatility <= 0.0 {
        return decayed;
    }
    let z: f64 = rng.sample(StandardNormal);
    decayed + z * volatility
}

/// Zero-mean Gaussian draw, used for uncorrelated micro-jitter.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let z: f64 = rng.sample(StandardNormal);
    z * sigma
}

/// Symmetric uniform draw in `[-amplitude, amplitude]`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-amplitude..=amplitude)
}

/// A single OU accumulator with fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseChannel {
    pub value: f64,
    mean_reversion_rate: f64,
    volatility: f64,
}

impl NoiseChannel {
    pub const fn new(mean_reversion_rate: f64, volatility: f64) -> Self {
        Self {
            value: 0.0,
            mean_reversion_rate,
            volatility,
        }
    }

    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.value = ou_step(rng, self.value, self.mean_reversion_rate, self.volatility);
        self.value
    }

    pub fn clear(&mut self) {
        self.value = 0.0;
    }
}
