use std::fmt;

use thiserror::Error;

use crate::dynamics::state::State;
use crate::sim::trajectory::Flight;

/// External model that produced an unusable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Atmosphere,
    Aerodynamics,
    Motor,
    MassProperties,
    ForceModel,
    ParachuteTrigger,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Atmosphere => "atmosphere",
            Self::Aerodynamics => "aerodynamics",
            Self::Motor => "motor",
            Self::MassProperties => "mass properties",
            Self::ForceModel => "force model",
            Self::ParachuteTrigger => "parachute trigger",
        };
        f.write_str(name)
    }
}

/// Physical invariant that the state left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Invariant {
    QuaternionNorm { norm: f64 },
    PositiveMass { mass: f64 },
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuaternionNorm { norm } => write!(f, "attitude quaternion norm drifted to {norm:.9}"),
            Self::PositiveMass { mass } => write!(f, "vehicle mass is {mass} kg"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum FlightError {
    #[error("{collaborator} returned a non-finite value for input {input} at t={time:.6} s")]
    ModelEvaluation {
        collaborator: Collaborator,
        input: String,
        time: f64,
    },

    #[error("integration failed at t={time:.6} s (h={step:.3e}): {reason}")]
    IntegrationFailure { time: f64, step: f64, reason: String },

    #[error("invariant violated at t={time:.6} s: {invariant}")]
    InvariantViolation { time: f64, invariant: Invariant },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FlightError {
    /// Simulation time attached to the error, if any.
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::ModelEvaluation { time, .. }
            | Self::IntegrationFailure { time, .. }
            | Self::InvariantViolation { time, .. } => Some(*time),
            Self::Config(_) => None,
        }
    }
}

/// A run that stopped on a fatal error.
///
/// Carries everything integrated up to the failure so the caller can
/// inspect where and how the flight went wrong.
#[derive(Debug, Error)]
#[error("flight failed: {error}")]
pub struct FlightFailure {
    #[source]
    pub error: FlightError,
    /// Last accepted state before the failure.
    pub last_state: State,
    /// Partial trajectory and events.
    pub flight: Flight,
}
