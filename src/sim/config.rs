use serde::{Deserialize, Serialize};

use crate::dynamics::state::StateVector;
use crate::error::FlightError;

// ---------------------------------------------------------------------------
// Simulation configuration
// ---------------------------------------------------------------------------

/// Absolute error tolerances per state group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsTolerance {
    pub position: f64,     // m
    pub velocity: f64,     // m/s
    pub attitude: f64,     // quaternion components
    pub angular_rate: f64, // rad/s
}

impl Default for AbsTolerance {
    fn default() -> Self {
        Self {
            position: 1e-3,
            velocity: 1e-4,
            attitude: 1e-8,
            angular_rate: 1e-6,
        }
    }
}

/// Integrator, event and run settings. Any field missing from a JSON file
/// keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub max_time: f64,     // s of simulated flight
    pub initial_step: f64, // s
    pub min_step: f64,     // s
    pub max_step: f64,     // s
    pub rtol: f64,
    pub atol: AbsTolerance,
    /// Width of the bracket an event time is located to, s.
    pub event_tolerance: f64,
    /// Budget of attempted integration steps.
    pub max_steps: usize,
    /// Seed of the sensor noise streams.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_time: 1200.0,  // 20 min
            initial_step: 1e-3,
            min_step: 1e-10,
            max_step: 1.0,
            rtol: 1e-8,
            atol: AbsTolerance::default(),
            event_tolerance: 1e-6,
            max_steps: 2_000_000,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self, FlightError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| FlightError::Config(format!("bad configuration file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlightError> {
        let positive = [
            ("max_time", self.max_time),
            ("initial_step", self.initial_step),
            ("min_step", self.min_step),
            ("max_step", self.max_step),
            ("event_tolerance", self.event_tolerance),
            ("atol.position", self.atol.position),
            ("atol.velocity", self.atol.velocity),
            ("atol.attitude", self.atol.attitude),
            ("atol.angular_rate", self.atol.angular_rate),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(FlightError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.rtol >= 0.0) {
            return Err(FlightError::Config(format!("rtol must be non-negative, got {}", self.rtol)));
        }
        if self.min_step > self.max_step {
            return Err(FlightError::Config(format!(
                "min_step {} exceeds max_step {}",
                self.min_step, self.max_step
            )));
        }
        if self.max_steps == 0 {
            return Err(FlightError::Config("max_steps must be at least 1".into()));
        }
        Ok(())
    }

    /// Absolute tolerance for each component of the state vector.
    pub fn atol_vector(&self) -> StateVector {
        let a = &self.atol;
        StateVector::from_fn(|i, _| match i {
            0..=2 => a.position,
            3..=5 => a.velocity,
            6..=9 => a.attitude,
            _ => a.angular_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = SimConfig::from_json(r#"{ "seed": 7, "atol": { "position": 0.01 } }"#).unwrap();
        assert_eq!(c.seed, 7);
        assert_eq!(c.atol.position, 0.01);
        assert_eq!(c.atol.velocity, AbsTolerance::default().velocity);
        assert_eq!(c.max_time, SimConfig::default().max_time);
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let c = SimConfig { event_tolerance: 0.0, ..SimConfig::default() };
        assert!(matches!(c.validate(), Err(FlightError::Config(_))));
        assert!(SimConfig::from_json(r#"{ "rtol": -1.0 }"#).is_err());
    }

    #[test]
    fn atol_vector_layout() {
        let v = SimConfig::default().atol_vector();
        assert_eq!(v[2], 1e-3);
        assert_eq!(v[6], 1e-8);
        assert_eq!(v[12], 1e-6);
    }
}
