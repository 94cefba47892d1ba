//! Per-request sampling decision.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides, per page view, whether a metric should be recorded. The random
/// source is injected so decisions can be made deterministic in tests and
/// reproducible from a seed in the harness.
#[derive(Debug)]
pub struct RandomSampler<R> {
    rng: R,
}

impl RandomSampler<StdRng> {
    /// A sampler over the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// A reproducible sampler for tests and replayable harness runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Returns true with probability exactly `1 / factor`. A factor that is
    /// not a finite number at least 1 disables sampling entirely.
    pub fn should_sample(&mut self, factor: f64) -> bool {
        if !factor.is_finite() || factor < 1.0 {
            return false;
        }
        let draw: f64 = self.rng.gen();
        (draw * factor).floor() == 0.0
    }
}

impl Default for RandomSampler<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}
