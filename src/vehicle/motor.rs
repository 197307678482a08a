use std::fmt;

use nalgebra::Vector3;

use crate::error::FlightError;
use crate::physics::curve::{Curve, Table};

/// Samples used to tabulate the cumulative impulse of a thrust curve.
const IMPULSE_SAMPLES: usize = 2_000;

// ---------------------------------------------------------------------------
// Motor collaborator
// ---------------------------------------------------------------------------

/// Propulsion model queried with the time since ignition.
///
/// Every quantity is zero beyond the burn duration except the centre of
/// mass, which is meaningless once the propellant is gone.
pub trait Motor: fmt::Debug + Send + Sync {
    fn burn_time(&self) -> f64;
    /// Thrust along the rocket axis, N.
    fn thrust(&self, t: f64) -> f64;
    /// Propellant mass leaving the motor, kg/s (positive while burning).
    fn mass_flow(&self, t: f64) -> f64;
    fn propellant_mass(&self, t: f64) -> f64;
    /// Propellant CG offset from the motor mounting station, m along the axis.
    fn center_of_mass(&self, t: f64) -> f64;
    /// Propellant principal inertia [Ixx, Iyy, Izz] about its own CG, kg·m^2.
    fn inertia(&self, t: f64) -> Vector3<f64>;
}

/// Hollow cylindrical propellant grain burning from the core outward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grain {
    pub outer_radius: f64,
    pub initial_inner_radius: f64,
    pub length: f64,
    /// Grain centre offset from the motor mounting station, m.
    pub offset: f64,
}

impl Grain {
    /// A thin slug at the mounting station, for motors without geometry data.
    pub fn point() -> Self {
        Self { outer_radius: 0.0, initial_inner_radius: 0.0, length: 0.0, offset: 0.0 }
    }
}

/// Solid motor with a tabulated or analytic thrust curve.
///
/// Propellant is consumed in proportion to delivered impulse, i.e. at a
/// constant effective exhaust velocity.
#[derive(Debug, Clone)]
pub struct SolidMotor {
    thrust: Curve,
    burn_time: f64,
    propellant_mass: f64,
    grain: Grain,
    total_impulse: f64,
    impulse: Table,
}

impl SolidMotor {
    pub fn new(thrust: Curve, burn_time: f64, propellant_mass: f64, grain: Grain) -> Result<Self, FlightError> {
        if !(burn_time > 0.0) {
            return Err(FlightError::Config(format!("motor burn time must be positive, got {burn_time}")));
        }
        if !(propellant_mass >= 0.0) {
            return Err(FlightError::Config(format!("propellant mass must be non-negative, got {propellant_mass}")));
        }

        // Cumulative impulse, trapezoidal rule.
        let dt = burn_time / IMPULSE_SAMPLES as f64;
        let mut points = Vec::with_capacity(IMPULSE_SAMPLES + 1);
        let mut acc = 0.0;
        let mut prev = thrust.eval(0.0);
        points.push((0.0, 0.0));
        for i in 1..=IMPULSE_SAMPLES {
            let t = i as f64 * dt;
            let f = thrust.eval(t);
            acc += 0.5 * (prev + f) * dt;
            prev = f;
            points.push((t, acc));
        }
        if !acc.is_finite() {
            return Err(FlightError::Config("thrust curve integrates to a non-finite impulse".into()));
        }
        if propellant_mass > 0.0 && acc <= 0.0 {
            return Err(FlightError::Config("motor carries propellant but delivers no impulse".into()));
        }

        Ok(Self {
            thrust,
            burn_time,
            propellant_mass,
            grain,
            total_impulse: acc,
            impulse: Table::new(&points)?,
        })
    }

    /// Constant thrust for `burn_time` seconds.
    pub fn constant(thrust: f64, burn_time: f64, propellant_mass: f64) -> Result<Self, FlightError> {
        Self::new(Curve::Constant(thrust), burn_time, propellant_mass, Grain::point())
    }

    pub fn with_grain(mut self, grain: Grain) -> Self {
        self.grain = grain;
        self
    }

    pub fn total_impulse(&self) -> f64 {
        self.total_impulse
    }

    /// Effective exhaust velocity, m/s. Infinite for a motor without propellant.
    pub fn exhaust_velocity(&self) -> f64 {
        if self.propellant_mass > 0.0 {
            self.total_impulse / self.propellant_mass
        } else {
            f64::INFINITY
        }
    }

    fn burning(&self, t: f64) -> bool {
        (0.0..=self.burn_time).contains(&t)
    }

    /// Current inner radius squared of the grain from the remaining mass fraction.
    fn inner_radius_sq(&self, remaining: f64) -> f64 {
        let g = &self.grain;
        let ro2 = g.outer_radius * g.outer_radius;
        let ri2 = g.initial_inner_radius * g.initial_inner_radius;
        let fraction = if self.propellant_mass > 0.0 { remaining / self.propellant_mass } else { 0.0 };
        ro2 - fraction * (ro2 - ri2)
    }
}

impl Motor for SolidMotor {
    fn burn_time(&self) -> f64 {
        self.burn_time
    }

    fn thrust(&self, t: f64) -> f64 {
        if self.burning(t) {
            self.thrust.eval(t)
        } else {
            0.0
        }
    }

    fn mass_flow(&self, t: f64) -> f64 {
        if self.burning(t) && self.propellant_mass > 0.0 {
            self.propellant_mass * self.thrust.eval(t) / self.total_impulse
        } else {
            0.0
        }
    }

    fn propellant_mass(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.propellant_mass;
        }
        if t >= self.burn_time || self.propellant_mass == 0.0 {
            return 0.0;
        }
        let burnt = self.impulse.eval(t) / self.total_impulse;
        (self.propellant_mass * (1.0 - burnt)).max(0.0)
    }

    fn center_of_mass(&self, _t: f64) -> f64 {
        self.grain.offset
    }

    fn inertia(&self, t: f64) -> Vector3<f64> {
        let m = self.propellant_mass(t);
        if m <= 0.0 {
            return Vector3::zeros();
        }
        let g = &self.grain;
        let r2_sum = g.outer_radius * g.outer_radius + self.inner_radius_sq(m);
        let i_axial = 0.5 * m * r2_sum;
        let i_trans = m * (3.0 * r2_sum + g.length * g.length) / 12.0;
        Vector3::new(i_trans, i_trans, i_axial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grain() -> Grain {
        Grain { outer_radius: 0.033, initial_inner_radius: 0.015, length: 0.6, offset: 0.3 }
    }

    #[test]
    fn constant_thrust_consumes_propellant_linearly() {
        let m = SolidMotor::constant(1000.0, 4.0, 2.0).unwrap();
        assert!((m.total_impulse() - 4000.0).abs() < 1e-6);
        assert!((m.propellant_mass(2.0) - 1.0).abs() < 1e-9);
        assert!((m.mass_flow(1.0) - 0.5).abs() < 1e-12);
        assert_eq!(m.propellant_mass(5.0), 0.0);
    }

    #[test]
    fn zero_beyond_burn() {
        let m = SolidMotor::constant(1000.0, 4.0, 2.0).unwrap();
        assert_eq!(m.thrust(4.5), 0.0);
        assert_eq!(m.mass_flow(4.5), 0.0);
        assert_eq!(m.thrust(-0.1), 0.0);
        assert_eq!(m.inertia(10.0), Vector3::zeros());
    }

    #[test]
    fn propellant_mass_matches_mass_flow() {
        let curve = Curve::table(&[(0.0, 0.0), (0.2, 2000.0), (3.0, 1600.0), (3.5, 0.0)]).unwrap();
        let m = SolidMotor::new(curve, 3.5, 3.0, grain()).unwrap();
        let (t, h) = (1.7, 1e-4);
        let fd = (m.propellant_mass(t - h) - m.propellant_mass(t + h)) / (2.0 * h);
        assert!((fd - m.mass_flow(t)).abs() / m.mass_flow(t) < 1e-3);
    }

    #[test]
    fn spin_inertia_falls_with_burn() {
        let m = SolidMotor::constant(1000.0, 4.0, 2.0).unwrap().with_grain(grain());
        let full = m.inertia(0.0);
        let half = m.inertia(2.0);
        assert!(half.z < full.z);
        assert!(half.x < full.x);
        assert!(full.x > full.z, "long grain: transverse inertia dominates");
    }

    #[test]
    fn inert_motor_has_no_flow() {
        let m = SolidMotor::constant(1500.0, 4.0, 0.0).unwrap();
        assert_eq!(m.thrust(1.0), 1500.0);
        assert_eq!(m.mass_flow(1.0), 0.0);
        assert_eq!(m.propellant_mass(1.0), 0.0);
        assert!(m.exhaust_velocity().is_infinite());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(SolidMotor::constant(1000.0, 0.0, 1.0).is_err());
        assert!(SolidMotor::constant(0.0, 3.0, 1.0).is_err());
    }
}
