use std::f64::consts::FRAC_PI_2;

use nalgebra::{UnitQuaternion, Vector3};

use super::parachute::Parachute;
use super::stage::{Ignition, Stage};
use crate::dynamics::frames;
use crate::error::FlightError;

// ---------------------------------------------------------------------------
// Launch rail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rail {
    pub length: f64,      // m of guided travel
    pub inclination: f64, // rad above the horizon
    pub heading: f64,     // rad clockwise from North
}

impl Default for Rail {
    fn default() -> Self {
        Self { length: 5.2, inclination: FRAC_PI_2, heading: 0.0 }
    }
}

impl Rail {
    pub fn new(length: f64) -> Self {
        Self { length, ..Self::default() }
    }

    pub fn inclination(mut self, v: f64) -> Self { self.inclination = v; self }
    pub fn heading(mut self, v: f64) -> Self { self.heading = v; self }

    /// Attitude of a rocket resting on this rail.
    pub fn attitude(&self) -> UnitQuaternion<f64> {
        frames::rail_attitude(self.inclination, self.heading)
    }

    /// Unit vector along the rail, inertial frame.
    pub fn direction(&self) -> Vector3<f64> {
        frames::rail_direction(self.inclination, self.heading)
    }
}

// ---------------------------------------------------------------------------
// Rocket: ordered stages, recovery system, launch rail
// ---------------------------------------------------------------------------

/// A complete vehicle. `stages[0]` is the lowest (first to burn and drop).
#[derive(Debug, Clone)]
pub struct Rocket {
    pub name: String,
    pub stages: Vec<Stage>,
    pub parachutes: Vec<Parachute>,
    pub rail: Rail,
}

impl Rocket {
    /// Wet mass of the whole stack on the pad.
    pub fn liftoff_mass(&self) -> f64 {
        self.stages.iter().map(|s| s.wet_mass()).sum()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage whose aerodynamics and reference size describe the stack while
    /// `active` is the lowest stage still attached.
    pub fn lowest_stage(&self, active: usize) -> Option<&Stage> {
        self.stages.get(active)
    }

    pub fn validate(&self) -> Result<(), FlightError> {
        let Some(first) = self.stages.first() else {
            return Err(FlightError::Config(format!("rocket '{}' has no stages", self.name)));
        };
        if first.ignition != Ignition::Liftoff {
            return Err(FlightError::Config(format!(
                "first stage '{}' must ignite at liftoff",
                first.name
            )));
        }
        for stage in &self.stages {
            stage.validate()?;
        }
        for stage in &self.stages[1..] {
            if stage.ignition == Ignition::Liftoff {
                return Err(FlightError::Config(format!(
                    "upper stage '{}' cannot ignite at liftoff",
                    stage.name
                )));
            }
        }
        for p in &self.parachutes {
            p.validate()?;
        }
        let r = &self.rail;
        if !(r.length >= 0.0) {
            return Err(FlightError::Config(format!("rail length must be non-negative, got {}", r.length)));
        }
        if !(r.inclination > 0.0 && r.inclination <= FRAC_PI_2) || !r.heading.is_finite() {
            return Err(FlightError::Config(format!(
                "rail inclination must lie in (0, pi/2], got {}",
                r.inclination
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rocket builder
// ---------------------------------------------------------------------------

pub struct RocketBuilder {
    name: String,
    stages: Vec<Stage>,
    parachutes: Vec<Parachute>,
    rail: Rail,
}

impl RocketBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stages: vec![], parachutes: vec![], rail: Rail::default() }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn parachute(mut self, parachute: Parachute) -> Self {
        self.parachutes.push(parachute);
        self
    }

    pub fn rail(mut self, rail: Rail) -> Self {
        self.rail = rail;
        self
    }

    pub fn build(self) -> Result<Rocket, FlightError> {
        let rocket = Rocket {
            name: self.name,
            stages: self.stages,
            parachutes: self.parachutes,
            rail: self.rail,
        };
        rocket.validate()?;
        Ok(rocket)
    }
}

// ---------------------------------------------------------------------------
// Preset rockets
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;
    use crate::physics::aerodynamics::{ConstantAero, TabulatedAero};
    use crate::physics::curve::Curve;
    use crate::vehicle::motor::{Grain, SolidMotor};
    use crate::vehicle::parachute::{NoiseSpec, ParachuteTrigger};
    use crate::vehicle::stage::StageBuilder;

    /// Single-stage high-power rocket on an M-class solid motor ("Calisto"),
    /// drogue at apogee and main at 800 m.
    pub fn calisto() -> Result<Rocket, FlightError> {
        let thrust = Curve::table(&[
            (0.0, 0.0),
            (0.055, 100.0),
            (0.092, 1500.0),
            (0.1, 2000.0),
            (0.15, 2200.0),
            (0.2, 1800.0),
            (0.5, 1950.0),
            (1.0, 2034.0),
            (1.5, 2000.0),
            (2.0, 1900.0),
            (2.5, 1760.0),
            (2.9, 1700.0),
            (3.0, 1650.0),
            (3.3, 530.0),
            (3.4, 350.0),
            (3.9, 0.0),
        ])?;
        let grain = Grain { outer_radius: 0.033, initial_inner_radius: 0.015, length: 0.6, offset: 0.3 };
        let motor = SolidMotor::new(thrust, 3.9, 2.956, grain)?;

        let aero = TabulatedAero {
            cd: Curve::table(&[(0.0, 0.45), (0.5, 0.42), (0.9, 0.48), (1.1, 0.62), (1.5, 0.52), (2.0, 0.45)])?,
            cn_alpha: Curve::Constant(8.0),
            cp: Curve::table(&[(0.0, 0.85), (0.8, 0.82), (1.2, 0.95), (2.0, 1.0)])?,
            cm_damping: 2.0,
        };

        let noise = NoiseSpec { mean: 0.0, std_dev: 8.3, correlation: 0.5, rate: 100.0 };
        RocketBuilder::new("Calisto")
            .stage(
                StageBuilder::new("Calisto")
                    .dry_mass(14.426)
                    .dry_cg(1.30)
                    .dry_inertia(Vector3::new(6.321, 6.321, 0.034))
                    .motor(motor)
                    .motor_station(0.0)
                    .aero(aero)
                    .area(0.012_668)
                    .diameter(0.127)
                    .build()?,
            )
            .parachute(Parachute::new("Drogue", 1.0, ParachuteTrigger::Apogee).lag(1.5).noise(noise))
            .parachute(Parachute::new("Main", 10.0, ParachuteTrigger::Altitude(800.0)).lag(1.5).noise(noise))
            .rail(Rail::new(5.2).inclination(85f64.to_radians()).heading(0.0))
            .build()
    }

    /// Two-stage sounding rocket ("Pathfinder"): booster and sustainer with a
    /// one-second coast between them, single parachute at apogee.
    pub fn pathfinder() -> Result<Rocket, FlightError> {
        RocketBuilder::new("Pathfinder")
            .stage(
                StageBuilder::new("S1-Booster")
                    .dry_mass(40.0)
                    .dry_cg(0.75)
                    .dry_inertia(Vector3::new(20.0, 20.0, 2.0))
                    .motor(SolidMotor::constant(5000.0, 10.8, 25.0)?)
                    .motor_station(0.2)
                    .aero(ConstantAero { cd: 0.35, cn_alpha: 6.0, cp: 1.0, cm_damping: 3.0 })
                    .area(0.02)
                    .diameter(0.16)
                    .build()?,
            )
            .stage(
                StageBuilder::new("S2-Sustainer")
                    .dry_mass(8.0)
                    .dry_cg(2.2)
                    .dry_inertia(Vector3::new(2.0, 2.0, 0.2))
                    .motor(SolidMotor::constant(1200.0, 12.2, 6.0)?)
                    .motor_station(1.6)
                    .aero(ConstantAero { cd: 0.28, cn_alpha: 4.0, cp: 1.9, cm_damping: 2.0 })
                    .area(0.008)
                    .diameter(0.1)
                    .ignition(Ignition::AfterBurnout { delay: 1.0 })
                    .build()?,
            )
            .parachute(Parachute::new("Main", 4.0, ParachuteTrigger::Apogee).lag(1.0))
            .rail(Rail::new(6.0))
            .build()
    }
}
