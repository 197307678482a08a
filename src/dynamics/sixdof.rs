use nalgebra::{Quaternion, Vector3};

use crate::dynamics::forces::{ForceModel, Loads};
use crate::dynamics::mass::{inertia_rate, mass_properties, MassProperties};
use crate::dynamics::state::{Deriv, State, StateVector};
use crate::error::FlightError;
use crate::physics::atmosphere::Environment;
use crate::sim::integrator::OdeSystem;
use crate::sim::phase::{Configuration, FlightPhase};
use crate::vehicle::Rocket;

// ---------------------------------------------------------------------------
// 6DOF Equations of motion
// ---------------------------------------------------------------------------

/// State derivative under the phase constraints.
///
///   d(pos)/dt = vel
///   d(vel)/dt = q ⊗ F_body / m
///   d(q)/dt   = ½ q ⊗ [0, ω]
///   I dω/dt   = M − ω × (I ω) − (dI/dt) ω
///
/// On the rail and under canopy the attitude is frozen; the rail phase
/// also receives only the axial force from the force model.
pub fn derivative(
    state: &State,
    mass: &MassProperties,
    inertia_rate: &Vector3<f64>,
    loads: &Loads,
    phase: FlightPhase,
) -> Deriv {
    if phase == FlightPhase::Landed {
        return Deriv {
            dpos: Vector3::zeros(),
            dvel: Vector3::zeros(),
            dquat: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            domega: Vector3::zeros(),
        };
    }

    let dvel = state.attitude() * loads.force / mass.mass;

    let (dquat, domega) = match phase {
        FlightPhase::OnRail | FlightPhase::ParachuteDescent => {
            (Quaternion::new(0.0, 0.0, 0.0, 0.0), Vector3::zeros())
        }
        _ => {
            let w = &state.omega;
            let dquat = state.quat * Quaternion::new(0.0, w.x, w.y, w.z) * 0.5;
            let i = &mass.inertia;
            let gyro = w.cross(&i.component_mul(w));
            let rhs = loads.moment - gyro - inertia_rate.component_mul(w);
            (dquat, rhs.component_div(i))
        }
    };

    Deriv { dpos: state.vel, dvel, dquat, domega }
}

// ---------------------------------------------------------------------------
// Flight model: the ODE right-hand side for one configuration
// ---------------------------------------------------------------------------

/// Everything evaluated for one state, reused for trajectory samples.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub mass: MassProperties,
    pub loads: Loads,
    pub deriv_vel: Vector3<f64>,
}

/// Right-hand side of the equations of motion with the configuration
/// frozen between two events.
pub struct FlightModel<'a> {
    rocket: &'a Rocket,
    forces: ForceModel<'a>,
    config: Configuration,
}

impl<'a> FlightModel<'a> {
    pub fn new(rocket: &'a Rocket, env: &'a dyn Environment, config: Configuration) -> Self {
        Self { rocket, forces: ForceModel::new(rocket, env), config }
    }

    pub fn set_config(&mut self, config: Configuration) {
        self.config = config;
    }

    fn mass(&self, time: f64) -> Result<(MassProperties, Vector3<f64>), FlightError> {
        let c = &self.config;
        let motor_time = c.motor_time(self.rocket, time);
        let mp = mass_properties(self.rocket, c.active_stage, motor_time, time)?;
        let rate = inertia_rate(self.rocket, c.active_stage, motor_time, c.burning, time)?;
        Ok((mp, rate))
    }

    pub fn deriv(&self, state: &State) -> Result<Deriv, FlightError> {
        let (mp, rate) = self.mass(state.time)?;
        let loads = self.forces.loads(state, &mp, &self.config)?;
        Ok(derivative(state, &mp, &rate, &loads, self.config.phase))
    }

    pub fn evaluate(&self, state: &State) -> Result<Evaluation, FlightError> {
        let (mp, rate) = self.mass(state.time)?;
        let loads = self.forces.loads(state, &mp, &self.config)?;
        let d = derivative(state, &mp, &rate, &loads, self.config.phase);
        Ok(Evaluation { mass: mp, loads, deriv_vel: d.dvel })
    }
}

impl OdeSystem<13> for FlightModel<'_> {
    fn rhs(&self, t: f64, y: &StateVector) -> Result<StateVector, FlightError> {
        self.deriv(&State::from_vector(t, y)).map(|d| d.to_vector())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::aerodynamics::ConstantAero;
    use crate::physics::atmosphere::StandardAtmosphere;
    use crate::physics::gravity::GravityModel;
    use crate::vehicle::motor::SolidMotor;
    use crate::vehicle::rocket::{Rail, RocketBuilder};
    use crate::vehicle::stage::StageBuilder;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn rocket() -> Rocket {
        RocketBuilder::new("T")
            .stage(
                StageBuilder::new("S")
                    .dry_mass(20.0)
                    .dry_inertia(Vector3::new(10.0, 10.0, 0.1))
                    .motor(SolidMotor::constant(1500.0, 4.0, 0.0).unwrap())
                    .aero(ConstantAero::none())
                    .build()
                    .unwrap(),
            )
            .rail(Rail::new(5.2).inclination(80f64.to_radians()))
            .build()
            .unwrap()
    }

    fn env() -> StandardAtmosphere {
        StandardAtmosphere::new().gravity(GravityModel::Constant(9.81))
    }

    #[test]
    fn rail_motion_stays_on_the_rail() {
        let r = rocket();
        let e = env();
        let model = FlightModel::new(&r, &e, Configuration::on_rail(&r, 0.0));
        let s = State::at_rest(0.0, r.rail.attitude());
        let d = model.deriv(&s).unwrap();
        let along = d.dvel.dot(&r.rail.direction());
        assert!(along > 0.0);
        assert!((d.dvel - r.rail.direction() * along).norm() < 1e-9, "lateral acceleration on rail");
        assert_eq!(d.domega, Vector3::zeros());
        assert_eq!(d.dquat.norm(), 0.0);
    }

    #[test]
    fn ballistic_coast_is_pure_gravity() {
        let r = rocket();
        let e = env();
        let model = FlightModel::new(&r, &e, Configuration::free_flight(&r, 0.0));
        let mut s = State::at_rest(10.0, UnitQuaternion::from_euler_angles(0.2, 0.1, 0.0));
        s.vel = Vector3::new(10.0, 0.0, 50.0);
        let d = model.deriv(&s).unwrap();
        assert_relative_eq!(d.dvel, Vector3::new(0.0, 0.0, -9.81), epsilon = 1e-9);
    }

    #[test]
    fn torque_free_spin_keeps_unit_quaternion_rate_orthogonal() {
        let r = rocket();
        let e = env();
        let model = FlightModel::new(&r, &e, Configuration::free_flight(&r, 0.0));
        let mut s = State::at_rest(0.0, UnitQuaternion::identity());
        s.omega = Vector3::new(0.3, -0.2, 5.0);
        let d = model.deriv(&s).unwrap();
        // d|q|^2/dt = 2 q·dq = 0 for a unit quaternion.
        assert!(s.quat.coords.dot(&d.dquat.coords).abs() < 1e-12);
    }

    #[test]
    fn landed_is_frozen() {
        let r = rocket();
        let e = env();
        let mut c = Configuration::free_flight(&r, 0.0);
        c.phase = FlightPhase::Landed;
        let model = FlightModel::new(&r, &e, c);
        let d = model.deriv(&State::at_rest(0.0, UnitQuaternion::identity())).unwrap();
        assert_eq!(d.to_vector(), StateVector::zeros());
    }
}
