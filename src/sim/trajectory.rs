use nalgebra::Vector3;
use serde::Serialize;

use crate::dynamics::state::State;
use crate::sim::event::{EventKind, EventRecord};
use crate::sim::integrator::StepStats;
use crate::sim::phase::FlightPhase;

// ---------------------------------------------------------------------------
// Trajectory samples
// ---------------------------------------------------------------------------

/// State plus the quantities derived from it at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub state: State,
    pub phase: FlightPhase,
    pub mass: f64,
    pub cg: f64,
    pub thrust: f64,
    pub mach: f64,
    pub dynamic_pressure: f64,
    pub alpha: f64,                 // rad
    pub acceleration: Vector3<f64>, // inertial, m/s^2
    pub kinetic_energy: f64,        // translational + rotational, J
    pub potential_energy: f64,      // relative to the pad, J
}

impl Sample {
    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn altitude(&self) -> f64 {
        self.state.altitude()
    }

    pub fn speed(&self) -> f64 {
        self.state.speed()
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy
    }
}

/// Ordered samples of one flight. Event boundaries appear twice with the
/// same timestamp: before the event and after its reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub(crate) fn push(&mut self, sample: Sample) {
        debug_assert!(self.samples.last().map_or(true, |s| s.time() <= sample.time()));
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn duration(&self) -> f64 {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) => b.time() - a.time(),
            _ => 0.0,
        }
    }

    /// Linearly interpolated state at `t`. At an event boundary the
    /// post-event state is returned.
    pub fn at(&self, t: f64) -> Option<State> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        if t < first.time() || t > last.time() {
            return None;
        }
        let i = self.samples.partition_point(|s| s.time() <= t);
        if i == self.samples.len() {
            return Some(last.state.clone());
        }
        let (a, b) = (&self.samples[i - 1].state, &self.samples[i].state);
        let w = (t - a.time) / (b.time - a.time);
        let (ya, yb) = (a.to_vector(), b.to_vector());
        Some(State::from_vector(t, &(ya + (yb - ya) * w)))
    }

    /// Sample with the highest altitude.
    pub fn apogee(&self) -> Option<&Sample> {
        self.samples.iter().max_by(|a, b| a.altitude().total_cmp(&b.altitude()))
    }

    pub fn max_by_key(&self, key: impl Fn(&Sample) -> f64) -> Option<&Sample> {
        self.samples.iter().max_by(|a, b| key(a).total_cmp(&key(b)))
    }
}

// ---------------------------------------------------------------------------
// Flight outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlightStatus {
    Landed,
    /// Cancelled, or stopped by a fatal error.
    Aborted,
    /// Reached the configured maximum simulated time in flight.
    TimeLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    pub rocket: String,
    pub trajectory: Trajectory,
    pub events: Vec<EventRecord>,
    pub status: FlightStatus,
    pub stats: StepStats,
}

impl Flight {
    pub(crate) fn new(rocket: impl Into<String>) -> Self {
        Self {
            rocket: rocket.into(),
            trajectory: Trajectory::default(),
            events: Vec::new(),
            status: FlightStatus::Aborted,
            stats: StepStats::default(),
        }
    }

    /// First event of the given kind.
    pub fn event(&self, kind: EventKind) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.kind == kind)
    }

    pub fn phases(&self) -> Vec<FlightPhase> {
        let mut phases: Vec<FlightPhase> = Vec::new();
        for s in self.trajectory.samples() {
            if phases.last() != Some(&s.phase) {
                phases.push(s.phase);
            }
        }
        phases
    }

    pub fn final_state(&self) -> Option<&State> {
        self.trajectory.last().map(|s| &s.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn sample(t: f64, z: f64, phase: FlightPhase) -> Sample {
        let mut state = State::at_rest(t, UnitQuaternion::identity());
        state.pos.z = z;
        Sample {
            state,
            phase,
            mass: 1.0,
            cg: 0.0,
            thrust: 0.0,
            mach: 0.0,
            dynamic_pressure: 0.0,
            alpha: 0.0,
            acceleration: Vector3::zeros(),
            kinetic_energy: 0.0,
            potential_energy: 0.0,
        }
    }

    fn trajectory() -> Trajectory {
        let mut t = Trajectory::default();
        t.push(sample(0.0, 0.0, FlightPhase::FreeFlight));
        t.push(sample(1.0, 10.0, FlightPhase::FreeFlight));
        t.push(sample(1.0, 20.0, FlightPhase::ParachuteDescent));
        t.push(sample(3.0, 0.0, FlightPhase::ParachuteDescent));
        t
    }

    #[test]
    fn interpolates_between_samples() {
        let s = trajectory().at(0.5).unwrap();
        assert!((s.altitude() - 5.0).abs() < 1e-12);
        assert_eq!(s.time, 0.5);
    }

    #[test]
    fn event_boundary_returns_post_event_state() {
        let t = trajectory();
        assert_eq!(t.at(1.0).unwrap().altitude(), 20.0);
        assert!((t.at(2.0).unwrap().altitude() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn outside_range_is_none() {
        assert!(trajectory().at(-0.1).is_none());
        assert!(trajectory().at(3.5).is_none());
        assert_eq!(trajectory().at(3.0).unwrap().altitude(), 0.0);
    }

    #[test]
    fn phase_sequence_is_deduplicated() {
        let mut f = Flight::new("T");
        f.trajectory = trajectory();
        assert_eq!(f.phases(), vec![FlightPhase::FreeFlight, FlightPhase::ParachuteDescent]);
        assert_eq!(f.trajectory.apogee().unwrap().altitude(), 20.0);
    }
}
