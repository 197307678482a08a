use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dynamics::sixdof::FlightModel;
use crate::dynamics::state::{State, QUAT_FATAL_TOL, QUAT_RENORM_TOL};
use crate::error::{FlightError, FlightFailure, Invariant};
use crate::physics::atmosphere::Environment;
use crate::sim::config::SimConfig;
use crate::sim::event::{Detection, EventDetector, EventKind, EventRecord};
use crate::sim::integrator::DormandPrince;
use crate::sim::phase::{self, Action, Configuration, FlightPhase, Reset, Trigger};
use crate::sim::trajectory::{Flight, FlightStatus, Sample};
use crate::vehicle::Rocket;

/// Renormalizations larger than this are reported as suspicious.
const QUAT_WARN_TOL: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Run control
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared with another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where the flight starts.
#[derive(Debug, Clone, Default)]
pub enum InitialCondition {
    /// At rest at the base of the rail with the first stage lit at t = 0.
    #[default]
    OnRail,
    /// Coasting from the given state with the first stage already burnt out.
    FreeFlight(State),
}

// ---------------------------------------------------------------------------
// Flight engine
// ---------------------------------------------------------------------------

/// Runs one flight of `rocket` through `env`.
///
/// Borrows its inputs immutably, so several engines can fly the same rocket
/// concurrently from scoped threads.
pub struct FlightEngine<'a> {
    rocket: &'a Rocket,
    env: &'a dyn Environment,
    config: SimConfig,
    initial: InitialCondition,
    cancel: CancelToken,
}

/// Mutable state of one run.
struct Run<'a> {
    model: FlightModel<'a>,
    detector: EventDetector<'a>,
    integrator: DormandPrince<13>,
    config: Configuration,
    state: State,
    flight: Flight,
    /// Detections pushed past their step by the priority order.
    deferred: Vec<Detection>,
    last_event: Option<f64>,
}

impl<'a> FlightEngine<'a> {
    pub fn new(rocket: &'a Rocket, env: &'a dyn Environment, config: SimConfig) -> Self {
        Self { rocket, env, config, initial: InitialCondition::OnRail, cancel: CancelToken::new() }
    }

    pub fn initial_condition(mut self, initial: InitialCondition) -> Self {
        self.initial = initial;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    fn initial_state(&self) -> (State, Configuration) {
        match &self.initial {
            InitialCondition::OnRail => (
                State::at_rest(0.0, self.rocket.rail.attitude()),
                Configuration::on_rail(self.rocket, 0.0),
            ),
            InitialCondition::FreeFlight(s) => (s.clone(), Configuration::free_flight(self.rocket, s.time)),
        }
    }

    /// Fly until landing, cancellation or the time limit.
    pub fn run(&self) -> Result<Flight, FlightFailure> {
        let (state, config) = self.initial_state();
        let mut run = match self.start(state.clone(), config) {
            Ok(run) => run,
            Err(error) => {
                return Err(FlightFailure { error, last_state: state, flight: Flight::new(self.rocket.name.clone()) });
            }
        };

        match self.fly(&mut run) {
            Ok(status) => {
                run.flight.status = status;
                run.flight.stats = run.integrator.stats();
                info!(
                    rocket = %self.rocket.name,
                    status = ?status,
                    t = run.state.time,
                    steps = run.flight.stats.accepted,
                    rejected = run.flight.stats.rejected,
                    "flight finished"
                );
                Ok(run.flight)
            }
            Err(error) => {
                warn!(rocket = %self.rocket.name, %error, "flight failed");
                run.flight.status = FlightStatus::Aborted;
                run.flight.stats = run.integrator.stats();
                Err(FlightFailure { error, last_state: run.state, flight: run.flight })
            }
        }
    }

    fn start(&self, state: State, config: Configuration) -> Result<Run<'a>, FlightError> {
        self.config.validate()?;
        self.rocket.validate()?;
        if !state.to_vector().iter().all(|v| v.is_finite()) {
            return Err(FlightError::Config("initial state is not finite".into()));
        }
        let norm = state.quat_norm();
        if (norm - 1.0).abs() > QUAT_FATAL_TOL {
            return Err(FlightError::InvariantViolation { time: state.time, invariant: Invariant::QuaternionNorm { norm } });
        }

        let c = &self.config;
        let integrator = DormandPrince::new(c.atol_vector(), c.rtol, c.initial_step, c.min_step, c.max_step, c.max_steps);
        let mut run = Run {
            model: FlightModel::new(self.rocket, self.env, config.clone()),
            detector: EventDetector::new(self.rocket, self.env, c.seed, c.event_tolerance)?,
            integrator,
            config,
            state,
            flight: Flight::new(self.rocket.name.clone()),
            deferred: Vec::new(),
            last_event: None,
        };
        let first = self.sample(&run, &run.state)?;
        run.flight.trajectory.push(first);
        info!(
            rocket = %self.rocket.name,
            phase = %run.config.phase,
            mass = self.rocket.liftoff_mass(),
            "flight started"
        );
        Ok(run)
    }

    fn fly(&self, run: &mut Run<'a>) -> Result<FlightStatus, FlightError> {
        loop {
            if run.config.phase.is_terminal() {
                return Ok(FlightStatus::Landed);
            }
            if self.cancel.is_cancelled() {
                info!(t = run.state.time, "flight cancelled");
                return Ok(FlightStatus::Aborted);
            }
            if run.state.time >= self.config.max_time {
                warn!(t = run.state.time, phase = %run.config.phase, "time limit reached in flight");
                return Ok(FlightStatus::TimeLimit);
            }

            let armed = armed_with_deferred(run, self.rocket);
            let t_stop = armed
                .iter()
                .filter_map(|t| match *t {
                    Trigger::At { time, .. } if time > run.state.time => Some(time),
                    _ => None,
                })
                .fold(self.config.max_time, f64::min);

            let y = run.state.to_vector();
            let step = run.integrator.step(&run.model, run.state.time, &y, t_stop)?;
            let mut group = run.detector.detect(&armed, &step, run.last_event)?;

            match group.first().copied() {
                Some(first) if first.time <= step.t1 => {
                    let y_event = run.integrator.land(&run.model, &step, first.time)?;
                    let mut state = State::from_vector(first.time, &y_event);
                    check_attitude(&mut state)?;
                    group.remove(0);
                    self.process_event(run, first, state, group)?;
                }
                _ => {
                    let mut state = State::from_vector(step.t1, &step.y1);
                    check_attitude(&mut state)?;
                    let sample = self.sample(run, &state)?;
                    run.flight.trajectory.push(sample);
                    run.state = state;
                    run.deferred.extend(group);
                }
            }
        }
    }

    fn process_event(
        &self,
        run: &mut Run<'a>,
        event: Detection,
        state: State,
        rest: Vec<Detection>,
    ) -> Result<(), FlightError> {
        let before = run.config.phase;
        let pre = self.sample(run, &state)?;
        run.flight.trajectory.push(pre);

        let transition = phase::transition(&run.config, event.kind, self.rocket, event.time);
        let relit = transition.actions.iter().any(|a| matches!(a, Action::Ignite { .. }));
        let mut post_state = state.clone();
        if let Some(Reset::ZeroAngularVelocity) = transition.reset {
            post_state.omega = nalgebra::Vector3::zeros();
        }
        run.config.apply(&transition);
        run.model.set_config(run.config.clone());
        run.integrator.restart();

        let name = event.kind.label(self.rocket);
        info!(
            t = event.time,
            event = %name,
            altitude = state.altitude(),
            speed = state.speed(),
            from = %before,
            to = %run.config.phase,
            "event"
        );
        run.flight.events.push(EventRecord {
            kind: event.kind,
            name,
            time: event.time,
            state,
            phase_before: before,
            phase_after: run.config.phase,
        });

        let post = self.sample(run, &post_state)?;
        run.flight.trajectory.push(post);
        run.state = post_state;
        run.last_event = Some(event.time);

        // Carry over detections that still make sense in the new configuration.
        let still_armed = phase::armed_triggers(&run.config, self.rocket);
        let mut deferred: Vec<Detection> = run.deferred.drain(..).chain(rest).filter(|d| d.kind != event.kind).collect();
        deferred.retain(|d| still_armed.iter().any(|t| t.kind() == d.kind));
        // A relit stage starts a new ascent; its apogee is still ahead.
        if relit {
            deferred.retain(|d| d.kind != EventKind::Apogee);
        }
        if !deferred.is_empty() {
            debug!(count = deferred.len(), "events deferred by priority");
        }
        run.deferred = deferred;
        Ok(())
    }

    fn sample(&self, run: &Run<'a>, state: &State) -> Result<Sample, FlightError> {
        let eval = run.model.evaluate(state)?;
        let m = eval.mass.mass;
        let elevation = self.env.elevation();
        let gravity = self.env.gravity();
        let spin = 0.5 * state.omega.dot(&eval.mass.inertia.component_mul(&state.omega));
        Ok(Sample {
            state: state.clone(),
            phase: run.config.phase,
            mass: m,
            cg: eval.mass.cg,
            thrust: eval.loads.thrust,
            mach: eval.loads.mach,
            dynamic_pressure: eval.loads.dynamic_pressure,
            alpha: eval.loads.alpha,
            acceleration: eval.deriv_vel,
            kinetic_energy: 0.5 * m * state.vel.norm_squared() + spin,
            potential_energy: m * (gravity.potential(state.altitude() + elevation) - gravity.potential(elevation)),
        })
    }
}

/// Armed triggers with deferred detections replacing their own triggers.
fn armed_with_deferred(run: &Run<'_>, rocket: &Rocket) -> Vec<Trigger> {
    let mut armed: Vec<Trigger> = phase::armed_triggers(&run.config, rocket)
        .into_iter()
        .filter(|t| !run.deferred.iter().any(|d| d.kind == t.kind()))
        .collect();
    armed.extend(run.deferred.iter().map(|d| Trigger::At { kind: d.kind, time: d.time }));
    armed
}

/// Remove quaternion drift after an accepted step; fail if it grew too large.
fn check_attitude(state: &mut State) -> Result<(), FlightError> {
    let norm = state.quat_norm();
    let drift = (norm - 1.0).abs();
    if drift > QUAT_FATAL_TOL || !norm.is_finite() {
        return Err(FlightError::InvariantViolation { time: state.time, invariant: Invariant::QuaternionNorm { norm } });
    }
    if state.renormalize(QUAT_RENORM_TOL) && drift > QUAT_WARN_TOL {
        warn!(t = state.time, drift, "large quaternion renormalization");
    }
    Ok(())
}

/// Run several engines on scoped threads; results keep the input order.
pub fn run_all(engines: &[FlightEngine<'_>]) -> Vec<Result<Flight, FlightFailure>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = engines.iter().map(|e| scope.spawn(move || e.run())).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::aerodynamics::ConstantAero;
    use crate::physics::atmosphere::StandardAtmosphere;
    use crate::physics::gravity::GravityModel;
    use crate::vehicle::motor::SolidMotor;
    use crate::vehicle::parachute::{Parachute, ParachuteTrigger};
    use crate::vehicle::rocket::{Rail, RocketBuilder};
    use crate::vehicle::stage::StageBuilder;
    use nalgebra::{UnitQuaternion, Vector3};

    fn env() -> StandardAtmosphere {
        StandardAtmosphere::new().gravity(GravityModel::Constant(9.81))
    }

    fn rocket() -> Rocket {
        RocketBuilder::new("Test")
            .stage(
                StageBuilder::new("S")
                    .dry_mass(20.0)
                    .motor(SolidMotor::constant(1500.0, 4.0, 0.0).unwrap())
                    .aero(ConstantAero::none())
                    .build()
                    .unwrap(),
            )
            .parachute(Parachute::new("Main", 8.0, ParachuteTrigger::Apogee))
            .rail(Rail::new(5.2))
            .build()
            .unwrap()
    }

    #[test]
    fn rail_departure_at_rail_length() {
        let r = rocket();
        let e = env();
        let flight = FlightEngine::new(&r, &e, SimConfig::default()).run().unwrap();
        let dep = flight.event(EventKind::RailDeparture).unwrap();
        // a = 1500/20 - 9.81, s = a t^2 / 2
        let a: f64 = 1500.0 / 20.0 - 9.81;
        assert!((dep.time - (2.0 * 5.2 / a).sqrt()).abs() < 1e-5, "t = {}", dep.time);
        assert!((dep.state.altitude() - 5.2).abs() < 1e-4);
    }

    #[test]
    fn events_strictly_increase_and_samples_duplicate_at_events() {
        let r = rocket();
        let e = env();
        let flight = FlightEngine::new(&r, &e, SimConfig::default()).run().unwrap();
        assert_eq!(flight.status, FlightStatus::Landed);
        assert!(flight.events.windows(2).all(|w| w[1].time > w[0].time));
        for ev in &flight.events {
            let at_event = flight.trajectory.samples().iter().filter(|s| s.time() == ev.time).count();
            assert!(at_event >= 2, "{} has {at_event} samples", ev.name);
        }
    }

    #[test]
    fn cancelled_run_is_aborted() {
        let r = rocket();
        let e = env();
        let token = CancelToken::new();
        token.cancel();
        let flight = FlightEngine::new(&r, &e, SimConfig::default()).cancel_token(token).run().unwrap();
        assert_eq!(flight.status, FlightStatus::Aborted);
        assert_eq!(flight.trajectory.len(), 1);
    }

    #[test]
    fn time_limit_status() {
        let r = rocket();
        let e = env();
        let config = SimConfig { max_time: 2.0, ..SimConfig::default() };
        let flight = FlightEngine::new(&r, &e, config).run().unwrap();
        assert_eq!(flight.status, FlightStatus::TimeLimit);
        assert_eq!(flight.final_state().unwrap().time, 2.0);
    }

    #[test]
    fn invalid_config_fails_before_flying() {
        let r = rocket();
        let e = env();
        let config = SimConfig { rtol: -1.0, ..SimConfig::default() };
        let failure = FlightEngine::new(&r, &e, config).run().unwrap_err();
        assert!(matches!(failure.error, FlightError::Config(_)));
        assert!(failure.flight.trajectory.is_empty());
    }

    #[test]
    fn free_flight_start_skips_the_rail() {
        let r = rocket();
        let e = env();
        let mut s = State::at_rest(0.0, UnitQuaternion::identity());
        s.pos.z = 100.0;
        s.vel = Vector3::new(0.0, 0.0, 30.0);
        let flight = FlightEngine::new(&r, &e, SimConfig::default())
            .initial_condition(InitialCondition::FreeFlight(s))
            .run()
            .unwrap();
        assert!(flight.event(EventKind::RailDeparture).is_none());
        let apogee = flight.event(EventKind::Apogee).unwrap();
        assert!((apogee.time - 30.0 / 9.81).abs() < 1e-4);
        assert_eq!(flight.phases()[0], FlightPhase::FreeFlight);
    }
}
