use serde::Serialize;
use tracing::warn;

use crate::dynamics::state::State;
use crate::error::{Collaborator, FlightError};
use crate::physics::atmosphere::{pressure_altitude, Environment};
use crate::sim::integrator::Accepted;
use crate::sim::noise::SensorNoise;
use crate::sim::phase::{FlightPhase, Trigger};
use crate::vehicle::parachute::{ParachuteTrigger, SensorReading};
use crate::vehicle::stage::Ignition;
use crate::vehicle::Rocket;

/// Bisection iterations before the bracket is accepted regardless of width.
const MAX_BISECTIONS: usize = 200;

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

/// Sign change a crossing trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Negative to non-negative.
    Rising,
    /// Positive to non-positive.
    Falling,
    Either,
}

impl Direction {
    /// Whether the guard moved from `g0` to `g` in this direction.
    /// A guard that starts exactly at zero never fires.
    pub fn fired(self, g0: f64, g: f64) -> bool {
        let rising = g0 < 0.0 && g >= 0.0;
        let falling = g0 > 0.0 && g <= 0.0;
        match self {
            Direction::Rising => rising,
            Direction::Falling => falling,
            Direction::Either => rising || falling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    RailDeparture,
    Burnout { stage: usize },
    Ignition { stage: usize },
    Apogee,
    ParachuteTrigger { index: usize },
    ParachuteInflation { index: usize },
    GroundContact,
}

impl EventKind {
    /// Processing order for events closer together than the event
    /// tolerance; lower goes first.
    pub fn priority(self) -> u8 {
        match self {
            EventKind::Burnout { .. } | EventKind::Ignition { .. } => 0,
            EventKind::ParachuteTrigger { .. } | EventKind::ParachuteInflation { .. } => 1,
            EventKind::Apogee => 2,
            EventKind::GroundContact => 3,
            EventKind::RailDeparture => 4,
        }
    }

    /// Human-readable name using the rocket's stage and parachute names.
    pub fn label(self, rocket: &Rocket) -> String {
        let stage = |i: usize| rocket.stages.get(i).map_or("?", |s| s.name.as_str()).to_string();
        let chute = |i: usize| rocket.parachutes.get(i).map_or("?", |p| p.name.as_str()).to_string();
        match self {
            EventKind::RailDeparture => "Rail departure".into(),
            EventKind::Burnout { stage: i } => format!("Burnout ({})", stage(i)),
            EventKind::Ignition { stage: i } => format!("Ignition ({})", stage(i)),
            EventKind::Apogee => "Apogee".into(),
            EventKind::ParachuteTrigger { index } => format!("{} trigger", chute(index)),
            EventKind::ParachuteInflation { index } => format!("{} inflated", chute(index)),
            EventKind::GroundContact => "Ground contact".into(),
        }
    }
}

/// A processed event, appended to the flight log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub name: String,
    pub time: f64,
    /// State at the event, before any reset.
    pub state: State,
    pub phase_before: FlightPhase,
    pub phase_after: FlightPhase,
}

/// An event located inside an accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: EventKind,
    pub time: f64,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Locates armed triggers within accepted steps.
///
/// Owns the sensor noise streams, so parachute guards see the same noisy
/// barometer on every query at a given time.
pub struct EventDetector<'a> {
    rocket: &'a Rocket,
    env: &'a dyn Environment,
    noise: SensorNoise,
    tolerance: f64,
}

impl<'a> EventDetector<'a> {
    pub fn new(rocket: &'a Rocket, env: &'a dyn Environment, seed: u64, tolerance: f64) -> Result<Self, FlightError> {
        let noise = SensorNoise::new(rocket.parachutes.iter().map(|p| p.noise), seed)?;
        Ok(Self { rocket, env, noise, tolerance })
    }

    /// What the flight computer of parachute `index` sees in `state`.
    pub fn reading<'s>(&mut self, index: usize, state: &'s State) -> SensorReading<'s> {
        let t = state.time;
        let elevation = self.env.elevation();
        let pressure = self.env.atmosphere(state.altitude() + elevation, t).pressure + self.noise.at(index, t);
        let ground = self.env.atmosphere(elevation, t).pressure;
        SensorReading {
            time: t,
            pressure,
            pressure_altitude: pressure_altitude(pressure) - pressure_altitude(ground),
            altitude: state.altitude(),
            vertical_velocity: state.vel.z,
            state,
        }
    }

    /// Guard function whose zero crossing is the event.
    ///
    /// A user trigger that reads NaN or infinity is a model error rather
    /// than a trigger that never fires.
    pub fn guard(&mut self, kind: EventKind, state: &State) -> Result<f64, FlightError> {
        let rocket = self.rocket;
        let g = match kind {
            EventKind::RailDeparture => rocket.rail.length - state.pos.dot(&rocket.rail.direction()),
            EventKind::Apogee => state.vel.z,
            EventKind::GroundContact => state.altitude(),
            EventKind::Ignition { stage } => match rocket.stages.get(stage).map(|s| s.ignition) {
                Some(Ignition::Apogee) => state.vel.z,
                _ => 0.0,
            },
            EventKind::ParachuteTrigger { index } => {
                let Some(p) = rocket.parachutes.get(index) else { return Ok(0.0) };
                match &p.trigger {
                    ParachuteTrigger::Apogee => state.vel.z,
                    ParachuteTrigger::Altitude(h) => self.reading(index, state).pressure_altitude - h,
                    ParachuteTrigger::Custom { f, .. } => {
                        let g = f(&self.reading(index, state));
                        if !g.is_finite() {
                            return Err(FlightError::ModelEvaluation {
                                collaborator: Collaborator::ParachuteTrigger,
                                input: format!("parachute '{}' reading {g}", p.name),
                                time: state.time,
                            });
                        }
                        g
                    }
                }
            }
            EventKind::Burnout { .. } | EventKind::ParachuteInflation { .. } => 0.0,
        };
        Ok(g)
    }

    /// Events inside `step`, ordered for processing.
    ///
    /// Detections within the tolerance of the earliest one form a group
    /// sorted by priority; each member is moved to at least one tolerance
    /// after its predecessor (and after `last_event`) so that event times
    /// strictly increase. Members that end up past the step are still
    /// returned; the caller schedules them.
    /// Scheduled times already behind the step fire at its start.
    pub fn detect(
        &mut self,
        triggers: &[Trigger],
        step: &Accepted<13>,
        last_event: Option<f64>,
    ) -> Result<Vec<Detection>, FlightError> {
        let start = State::from_vector(step.t0, &step.y0);
        let end = State::from_vector(step.t1, &step.y1);
        let mut found = Vec::new();

        for trigger in triggers {
            match *trigger {
                Trigger::At { kind, time } => {
                    if time <= step.t1 {
                        found.push(Detection { kind, time: time.max(step.t0) });
                    }
                }
                Trigger::Crossing { kind, direction } => {
                    let g0 = self.guard(kind, &start)?;
                    let g1 = self.guard(kind, &end)?;
                    if direction.fired(g0, g1) {
                        let time = self.bisect(kind, direction, g0, step)?;
                        found.push(Detection { kind, time });
                    }
                }
            }
        }

        let Some(earliest) = found.iter().map(|d| d.time).reduce(f64::min) else {
            return Ok(found);
        };
        let mut group: Vec<Detection> = found.into_iter().filter(|d| d.time <= earliest + self.tolerance).collect();
        group.sort_by(|a, b| a.kind.priority().cmp(&b.kind.priority()).then(a.time.total_cmp(&b.time)));

        if group.len() > 1 {
            let order: Vec<String> = group.iter().map(|d| d.kind.label(self.rocket)).collect();
            warn!(t = earliest, events = ?order, "simultaneous events resolved by priority");
        }

        let mut floor = last_event.map_or(f64::NEG_INFINITY, |t| t + self.tolerance);
        for d in &mut group {
            d.time = d.time.max(floor);
            floor = d.time + self.tolerance;
        }
        Ok(group)
    }

    /// First time (within tolerance) at which the guard has crossed.
    fn bisect(&mut self, kind: EventKind, direction: Direction, g0: f64, step: &Accepted<13>) -> Result<f64, FlightError> {
        let (mut lo, mut hi) = (step.t0, step.t1);
        for _ in 0..MAX_BISECTIONS {
            if hi - lo <= self.tolerance {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let state = State::from_vector(mid, &step.dense.eval(mid));
            if direction.fired(g0, self.guard(kind, &state)?) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(hi)
    }
}
