use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::FlightError;
use crate::vehicle::parachute::NoiseSpec;

/// Odd constant spreading per-parachute seeds apart.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

// ---------------------------------------------------------------------------
// Time-indexed AR(1) barometer noise
// ---------------------------------------------------------------------------

/// Gaussian AR(1) sequence sampled at a fixed rate and held between samples.
///
/// Samples are generated lazily in index order, so the value at a given
/// time depends only on the seed, never on the order of queries.
#[derive(Debug, Clone)]
pub struct NoiseStream {
    spec: NoiseSpec,
    rng: StdRng,
    normal: Normal<f64>,
    samples: Vec<f64>,
}

impl NoiseStream {
    pub fn new(spec: NoiseSpec, seed: u64) -> Result<Self, FlightError> {
        let normal = Normal::new(0.0, spec.std_dev)
            .map_err(|e| FlightError::Config(format!("invalid noise deviation {}: {e}", spec.std_dev)))?;
        Ok(Self { spec, rng: StdRng::seed_from_u64(seed), normal, samples: Vec::new() })
    }

    /// Noise value (Pa) at simulation time `t`.
    pub fn at(&mut self, t: f64) -> f64 {
        if self.spec.std_dev == 0.0 {
            return self.spec.mean;
        }
        let index = (t.max(0.0) * self.spec.rate).floor() as usize;
        let rho = self.spec.correlation;
        let innovation = (1.0 - rho * rho).sqrt();
        while self.samples.len() <= index {
            let e = self.normal.sample(&mut self.rng);
            let next = match self.samples.last() {
                Some(prev) => rho * prev + innovation * e,
                None => e,
            };
            self.samples.push(next);
        }
        self.spec.mean + self.samples[index]
    }
}

/// One noise stream per parachute, all derived from the run seed.
#[derive(Debug, Clone)]
pub struct SensorNoise {
    streams: Vec<NoiseStream>,
}

impl SensorNoise {
    pub fn new(specs: impl IntoIterator<Item = NoiseSpec>, seed: u64) -> Result<Self, FlightError> {
        let streams = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| NoiseStream::new(spec, seed ^ (i as u64 + 1).wrapping_mul(SEED_STRIDE)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { streams })
    }

    pub fn at(&mut self, index: usize, t: f64) -> f64 {
        self.streams.get_mut(index).map_or(0.0, |s| s.at(t))
    }
}
