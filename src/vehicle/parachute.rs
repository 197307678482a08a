use std::fmt;
use std::sync::Arc;

use crate::dynamics::state::State;
use crate::error::FlightError;
use crate::sim::event::Direction;

/// What a parachute trigger sees: barometric readings with injected noise
/// plus the true state for triggers that model other sensors.
#[derive(Debug, Clone, Copy)]
pub struct SensorReading<'a> {
    pub time: f64,
    /// Static pressure with sensor noise, Pa.
    pub pressure: f64,
    /// Altitude above the pad derived from the noisy pressure, m.
    pub pressure_altitude: f64,
    /// True altitude above ground, m.
    pub altitude: f64,
    pub vertical_velocity: f64,
    pub state: &'a State,
}

pub type TriggerFn = Arc<dyn Fn(&SensorReading<'_>) -> f64 + Send + Sync>;

/// Deployment condition of a parachute.
#[derive(Clone)]
pub enum ParachuteTrigger {
    /// Fires at apogee.
    Apogee,
    /// Fires when the barometric altitude falls through this height above the pad, m.
    Altitude(f64),
    /// Fires when `f` changes sign in `direction`.
    Custom { f: TriggerFn, direction: Direction },
}

impl ParachuteTrigger {
    pub fn custom(direction: Direction, f: impl Fn(&SensorReading<'_>) -> f64 + Send + Sync + 'static) -> Self {
        ParachuteTrigger::Custom { f: Arc::new(f), direction }
    }
}

impl fmt::Debug for ParachuteTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apogee => f.write_str("Apogee"),
            Self::Altitude(h) => f.debug_tuple("Altitude").field(h).finish(),
            Self::Custom { direction, .. } => f.debug_struct("Custom").field("direction", direction).finish_non_exhaustive(),
        }
    }
}

/// Barometer noise: first-order autoregressive Gaussian process sampled at `rate` Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSpec {
    pub mean: f64,      // Pa
    pub std_dev: f64,   // Pa
    pub correlation: f64, // AR(1) coefficient in [0, 1)
    pub rate: f64,      // Hz
}

impl Default for NoiseSpec {
    fn default() -> Self {
        Self { mean: 0.0, std_dev: 0.0, correlation: 0.0, rate: 100.0 }
    }
}

impl NoiseSpec {
    pub fn gaussian(std_dev: f64) -> Self {
        Self { std_dev, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Parachute {
    pub name: String,
    /// Drag coefficient times canopy area, m^2.
    pub drag_area: f64,
    /// Delay between the trigger firing and full inflation, s.
    pub lag: f64,
    pub trigger: ParachuteTrigger,
    pub noise: NoiseSpec,
}

impl Parachute {
    pub fn new(name: impl Into<String>, drag_area: f64, trigger: ParachuteTrigger) -> Self {
        Self {
            name: name.into(),
            drag_area,
            lag: 0.0,
            trigger,
            noise: NoiseSpec::default(),
        }
    }

    pub fn lag(mut self, v: f64) -> Self { self.lag = v; self }
    pub fn noise(mut self, v: NoiseSpec) -> Self { self.noise = v; self }

    pub fn validate(&self) -> Result<(), FlightError> {
        if !(self.drag_area > 0.0) {
            return Err(FlightError::Config(format!("parachute '{}' needs a positive drag area", self.name)));
        }
        if !(self.lag >= 0.0) {
            return Err(FlightError::Config(format!("parachute '{}' lag must be non-negative", self.name)));
        }
        let n = &self.noise;
        if !(n.std_dev >= 0.0) || !n.mean.is_finite() || !(0.0..1.0).contains(&n.correlation) || !(n.rate > 0.0) {
            return Err(FlightError::Config(format!("parachute '{}' has an invalid noise model", self.name)));
        }
        Ok(())
    }
}
