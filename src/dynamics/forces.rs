use nalgebra::Vector3;

use crate::dynamics::frames;
use crate::dynamics::mass::MassProperties;
use crate::dynamics::state::State;
use crate::error::{Collaborator, FlightError};
use crate::physics::aerodynamics::{aero_force, damping_moment, restoring_moment};
use crate::physics::atmosphere::{Atmo, Environment};
use crate::sim::phase::{Configuration, FlightPhase};
use crate::vehicle::Rocket;

// ---------------------------------------------------------------------------
// Loads on the vehicle at one instant
// ---------------------------------------------------------------------------

/// Net force and moment in body axes plus the flight condition they were
/// evaluated at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loads {
    /// Net force including weight, body frame, N.
    pub force: Vector3<f64>,
    /// Net moment about the CG, body frame, N·m.
    pub moment: Vector3<f64>,
    pub thrust: f64,
    pub mach: f64,
    pub dynamic_pressure: f64,
    /// Total angle of attack, rad.
    pub alpha: f64,
    pub v_air_body: Vector3<f64>,
    pub atmosphere: Atmo,
}

/// Stateless composition of gravity, thrust, aerodynamics, parachute drag
/// and rail reaction.
#[derive(Clone, Copy)]
pub struct ForceModel<'a> {
    rocket: &'a Rocket,
    env: &'a dyn Environment,
}

impl<'a> ForceModel<'a> {
    pub fn new(rocket: &'a Rocket, env: &'a dyn Environment) -> Self {
        Self { rocket, env }
    }

    pub fn loads(&self, state: &State, mass: &MassProperties, config: &Configuration) -> Result<Loads, FlightError> {
        let t = state.time;
        let attitude = state.attitude();
        let asl = state.altitude() + self.env.elevation();

        let atmosphere = self.env.atmosphere(asl, t);
        if !atmosphere.is_finite() {
            return Err(model_error(Collaborator::Atmosphere, format!("altitude {asl:.3} m"), t));
        }

        // --- Gravity ---
        let g = self.env.gravity().accel(asl);
        let weight = frames::inertial_to_body(&attitude, &Vector3::new(0.0, 0.0, -g * mass.mass));

        let v_air_body = frames::air_velocity_body(&attitude, &state.vel, &atmosphere.wind);
        let speed = v_air_body.norm();
        let mach = speed / atmosphere.sound_speed;
        let dynamic_pressure = 0.5 * atmosphere.density * speed * speed;
        let alpha = frames::angle_of_attack(&v_air_body);

        let mut force = weight;
        let mut moment = Vector3::zeros();
        let mut thrust = 0.0;

        if config.phase != FlightPhase::ParachuteDescent {
            let stage = self
                .rocket
                .lowest_stage(config.active_stage)
                .ok_or_else(|| model_error(Collaborator::ForceModel, format!("stage {}", config.active_stage), t))?;

            // --- Thrust along body +Z ---
            if config.burning {
                let motor_time = config.motor_time(self.rocket, t).unwrap_or(0.0);
                thrust = stage.motor.thrust(motor_time);
                if !thrust.is_finite() {
                    return Err(model_error(Collaborator::Motor, format!("motor time {motor_time:.6} s"), t));
                }
                force.z += thrust;
            }

            // --- Aerodynamics ---
            let coeffs = stage.aero.coefficients(mach, alpha);
            if !coeffs.is_finite() {
                return Err(model_error(
                    Collaborator::Aerodynamics,
                    format!("mach {mach:.4}, alpha {alpha:.5} rad"),
                    t,
                ));
            }
            force += aero_force(&v_air_body, dynamic_pressure, stage.area, &coeffs);
            moment += restoring_moment(&v_air_body, dynamic_pressure, stage.area, mass.cg, &coeffs);
            moment += damping_moment(&state.omega, speed, dynamic_pressure, stage.area, stage.diameter, &coeffs);
        }

        // --- Parachute drag (force only) ---
        let drag_area = config.drag_area(self.rocket);
        if drag_area > 0.0 {
            force += -v_air_body * (0.5 * atmosphere.density * speed * drag_area);
        }

        // --- Rail reaction ---
        if config.phase == FlightPhase::OnRail {
            let axis = self.rocket.rail.direction();
            let travel = state.pos.dot(&axis);
            let axial_speed = state.vel.dot(&axis);
            let mut axial = force.z;
            if travel <= 0.0 && axial_speed <= 0.0 && axial < 0.0 {
                axial = 0.0; // resting on the pad
            }
            force = Vector3::new(0.0, 0.0, axial);
            moment = Vector3::zeros();
        }

        if force.iter().chain(moment.iter()).any(|v| !v.is_finite()) {
            return Err(model_error(
                Collaborator::ForceModel,
                format!("state at altitude {:.3} m, speed {:.3} m/s", state.altitude(), state.speed()),
                t,
            ));
        }

        Ok(Loads { force, moment, thrust, mach, dynamic_pressure, alpha, v_air_body, atmosphere })
    }
}

fn model_error(collaborator: Collaborator, input: String, time: f64) -> FlightError {
    FlightError::ModelEvaluation { collaborator, input, time }
}
