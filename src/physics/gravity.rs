use serde::{Deserialize, Serialize};

use crate::dynamics::state::{EARTH_RADIUS, G0};

/// Gravity field along the local vertical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GravityModel {
    /// Uniform field, m/s^2.
    Constant(f64),
    /// Inverse-square falloff from a surface value.
    InverseSquare { surface: f64, radius: f64 },
}

impl Default for GravityModel {
    fn default() -> Self {
        GravityModel::InverseSquare { surface: G0, radius: EARTH_RADIUS }
    }
}

impl GravityModel {
    /// Magnitude of the gravitational acceleration at an altitude above sea level.
    pub fn accel(&self, altitude: f64) -> f64 {
        match *self {
            GravityModel::Constant(g) => g,
            GravityModel::InverseSquare { surface, radius } => {
                let r = (radius + altitude).max(1.0);
                surface * (radius / r).powi(2)
            }
        }
    }

    /// Potential energy per unit mass relative to sea level (J/kg).
    pub fn potential(&self, altitude: f64) -> f64 {
        match *self {
            GravityModel::Constant(g) => g * altitude,
            GravityModel::InverseSquare { surface, radius } => {
                let r = (radius + altitude).max(1.0);
                surface * radius * altitude / r
            }
        }
    }
}
