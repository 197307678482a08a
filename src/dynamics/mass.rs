use nalgebra::Vector3;

use crate::error::{Collaborator, FlightError, Invariant};
use crate::vehicle::Rocket;

/// Time step of the central difference used for dI/dt, s.
pub const INERTIA_RATE_STEP: f64 = 1e-4;

/// Mass, centre of mass and principal inertia of the attached stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub mass: f64,             // kg
    pub cg: f64,               // station along the rocket axis, m
    pub inertia: Vector3<f64>, // [Ixx, Iyy, Izz] about the CG, kg·m^2
}

/// Point contribution to the stack: mass at a station with its own inertia.
struct Part {
    mass: f64,
    station: f64,
    inertia: Vector3<f64>,
}

/// Mass properties of stages `active..` at simulation time `time`.
///
/// `motor_time` is the time since ignition of the active stage's motor,
/// `None` while it is unlit. Upper stages still carry their full propellant.
pub fn mass_properties(
    rocket: &Rocket,
    active: usize,
    motor_time: Option<f64>,
    time: f64,
) -> Result<MassProperties, FlightError> {
    let mut parts = Vec::with_capacity(2 * rocket.stages.len());
    for (i, stage) in rocket.stages.iter().enumerate().skip(active) {
        parts.push(Part { mass: stage.dry_mass, station: stage.dry_cg, inertia: stage.dry_inertia });

        let t = if i == active { motor_time.unwrap_or(0.0) } else { 0.0 };
        let motor = &stage.motor;
        let m = motor.propellant_mass(t);
        let offset = motor.center_of_mass(t);
        let inertia = motor.inertia(t);
        if !m.is_finite() || !offset.is_finite() || inertia.iter().any(|v| !v.is_finite()) {
            return Err(FlightError::ModelEvaluation {
                collaborator: Collaborator::Motor,
                input: format!("stage '{}' motor time {t}", stage.name),
                time,
            });
        }
        if m > 0.0 {
            parts.push(Part { mass: m, station: stage.motor_station + offset, inertia });
        }
    }

    let mass: f64 = parts.iter().map(|p| p.mass).sum();
    if !(mass > 0.0) {
        return Err(FlightError::InvariantViolation { time, invariant: Invariant::PositiveMass { mass } });
    }
    let cg = parts.iter().map(|p| p.mass * p.station).sum::<f64>() / mass;

    // Parallel-axis theorem for the transverse axes; all parts share the roll axis.
    let mut inertia: Vector3<f64> = Vector3::zeros();
    for p in &parts {
        let d2 = (p.station - cg).powi(2);
        inertia.x += p.inertia.x + p.mass * d2;
        inertia.y += p.inertia.y + p.mass * d2;
        inertia.z += p.inertia.z;
    }
    if !cg.is_finite() || inertia.iter().any(|v| !v.is_finite()) {
        return Err(FlightError::ModelEvaluation {
            collaborator: Collaborator::MassProperties,
            input: format!("stages {active}.. mass {mass}"),
            time,
        });
    }

    Ok(MassProperties { mass, cg, inertia })
}

/// dI/dt of the attached stack by central difference.
///
/// Zero unless the active motor is burning: the configuration is held fixed
/// across the difference, so staging never leaks into the rate.
pub fn inertia_rate(
    rocket: &Rocket,
    active: usize,
    motor_time: Option<f64>,
    burning: bool,
    time: f64,
) -> Result<Vector3<f64>, FlightError> {
    let Some(t) = motor_time.filter(|_| burning) else {
        return Ok(Vector3::zeros());
    };
    let ahead = mass_properties(rocket, active, Some(t + INERTIA_RATE_STEP), time)?;
    let behind = mass_properties(rocket, active, Some(t - INERTIA_RATE_STEP), time)?;
    let rate = (ahead.inertia - behind.inertia) / (2.0 * INERTIA_RATE_STEP);
    if rate.iter().any(|v| !v.is_finite()) {
        return Err(FlightError::ModelEvaluation {
            collaborator: Collaborator::MassProperties,
            input: format!("inertia rate at motor time {t}"),
            time,
        });
    }
    Ok(rate)
}
