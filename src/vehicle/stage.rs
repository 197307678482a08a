use std::sync::Arc;

use nalgebra::Vector3;

use crate::error::FlightError;
use crate::physics::aerodynamics::{Aerodynamics, ConstantAero};
use crate::vehicle::motor::{Motor, SolidMotor};

// ---------------------------------------------------------------------------
// Stage definition (one stage of a multi-stage rocket)
// ---------------------------------------------------------------------------

/// When a stage's motor lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ignition {
    /// On the rail at t = 0 (booster).
    Liftoff,
    /// `delay` seconds after the stage below burns out.
    AfterBurnout { delay: f64 },
    /// At apogee of the coasting stack.
    Apogee,
}

/// One stage of the stack.
///
/// Stations are distances along the rocket axis from the tail of the full
/// stack, positive toward the nose. `aero` describes the vehicle while this
/// stage is the lowest one still attached.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub dry_mass: f64,              // kg, structure + empty motor case
    pub dry_cg: f64,                // station, m
    pub dry_inertia: Vector3<f64>,  // [Ixx, Iyy, Izz] about the dry CG, kg·m^2
    pub motor: Arc<dyn Motor>,
    pub motor_station: f64,         // station of the motor reference point, m
    pub aero: Arc<dyn Aerodynamics>,
    pub area: f64,                  // aerodynamic reference area, m^2
    pub diameter: f64,              // reference length, m
    pub ignition: Ignition,
}

impl Stage {
    pub fn wet_mass(&self) -> f64 {
        self.dry_mass + self.motor.propellant_mass(0.0)
    }

    pub fn validate(&self) -> Result<(), FlightError> {
        if !(self.dry_mass > 0.0) {
            return Err(FlightError::Config(format!("stage '{}' needs a positive dry mass", self.name)));
        }
        if self.dry_inertia.iter().any(|i| !(*i > 0.0)) {
            return Err(FlightError::Config(format!("stage '{}' needs positive principal inertias", self.name)));
        }
        if !(self.area >= 0.0) || !(self.diameter >= 0.0) {
            return Err(FlightError::Config(format!("stage '{}' has a negative reference size", self.name)));
        }
        if let Ignition::AfterBurnout { delay } = self.ignition {
            if !(delay > 0.0) {
                return Err(FlightError::Config(format!(
                    "stage '{}' ignition delay must be positive, got {delay}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stage builder
// ---------------------------------------------------------------------------

pub struct StageBuilder {
    name: String,
    dry_mass: f64,
    dry_cg: f64,
    dry_inertia: Vector3<f64>,
    motor: Option<Arc<dyn Motor>>,
    motor_station: f64,
    aero: Arc<dyn Aerodynamics>,
    area: f64,
    diameter: f64,
    ignition: Ignition,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dry_mass: 10.0,
            dry_cg: 1.0,
            dry_inertia: Vector3::new(5.0, 5.0, 0.05),
            motor: None,
            motor_station: 0.0,
            aero: Arc::new(ConstantAero { cd: 0.45, cn_alpha: 2.0, cp: 0.6, cm_damping: 1.0 }),
            area: 0.008,
            diameter: 0.1,
            ignition: Ignition::Liftoff,
        }
    }

    pub fn dry_mass(mut self, v: f64) -> Self { self.dry_mass = v; self }
    pub fn dry_cg(mut self, v: f64) -> Self { self.dry_cg = v; self }
    pub fn dry_inertia(mut self, v: Vector3<f64>) -> Self { self.dry_inertia = v; self }
    pub fn motor(mut self, m: impl Motor + 'static) -> Self {
        let m: Arc<dyn Motor> = Arc::new(m);
        self.motor = Some(m);
        self
    }
    pub fn shared_motor(mut self, m: Arc<dyn Motor>) -> Self { self.motor = Some(m); self }
    pub fn motor_station(mut self, v: f64) -> Self { self.motor_station = v; self }
    pub fn aero(mut self, a: impl Aerodynamics + 'static) -> Self { self.aero = Arc::new(a); self }
    pub fn area(mut self, v: f64) -> Self { self.area = v; self }
    pub fn diameter(mut self, v: f64) -> Self { self.diameter = v; self }
    pub fn ignition(mut self, v: Ignition) -> Self { self.ignition = v; self }

    /// Builds the stage; a stage without a motor gets an inert one.
    pub fn build(self) -> Result<Stage, FlightError> {
        let motor: Arc<dyn Motor> = match self.motor {
            Some(m) => m,
            None => Arc::new(SolidMotor::constant(0.0, 1e-3, 0.0)?),
        };
        let stage = Stage {
            name: self.name,
            dry_mass: self.dry_mass,
            dry_cg: self.dry_cg,
            dry_inertia: self.dry_inertia,
            motor,
            motor_station: self.motor_station,
            aero: self.aero,
            area: self.area,
            diameter: self.diameter,
            ignition: self.ignition,
        };
        stage.validate()?;
        Ok(stage)
    }
}
