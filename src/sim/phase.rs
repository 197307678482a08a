use std::fmt;

use serde::Serialize;

use crate::sim::event::{Direction, EventKind};
use crate::vehicle::parachute::ParachuteTrigger;
use crate::vehicle::stage::Ignition;
use crate::vehicle::Rocket;

// ---------------------------------------------------------------------------
// Flight phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlightPhase {
    OnRail,
    Powered,
    FreeFlight,
    ParachuteDescent,
    Landed,
}

impl FlightPhase {
    pub fn is_terminal(self) -> bool {
        self == FlightPhase::Landed
    }

    pub fn name(self) -> &'static str {
        match self {
            FlightPhase::OnRail => "on-rail",
            FlightPhase::Powered => "powered",
            FlightPhase::FreeFlight => "free-flight",
            FlightPhase::ParachuteDescent => "parachute",
            FlightPhase::Landed => "landed",
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Deployment state of one parachute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Chute {
    Stowed,
    /// Triggered; fully open at `inflate_at`.
    Deploying { inflate_at: f64 },
    Inflated,
}

// ---------------------------------------------------------------------------
// Force configuration (constant between events)
// ---------------------------------------------------------------------------

/// Everything the equations of motion need besides the state itself.
/// Only event transitions change it, so the right-hand side stays smooth
/// across every integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub phase: FlightPhase,
    /// Lowest stage still attached.
    pub active_stage: usize,
    /// Ignition time of the active stage's motor.
    pub ignition_time: Option<f64>,
    pub burning: bool,
    /// Scheduled ignition of the next stage.
    pub next_ignition: Option<f64>,
    /// Apogee of the current ascent; cleared when a stage lights.
    pub apogee: Option<f64>,
    pub chutes: Vec<Chute>,
}

impl Configuration {
    /// On the rail with the first stage lit at `t0`.
    pub fn on_rail(rocket: &Rocket, t0: f64) -> Self {
        Self {
            phase: FlightPhase::OnRail,
            active_stage: 0,
            ignition_time: Some(t0),
            burning: true,
            next_ignition: None,
            apogee: None,
            chutes: vec![Chute::Stowed; rocket.parachutes.len()],
        }
    }

    /// Coasting at `t0` with the first stage burnt out at that instant.
    pub fn free_flight(rocket: &Rocket, t0: f64) -> Self {
        let burn = rocket.stages.first().map_or(0.0, |s| s.motor.burn_time());
        let next_ignition = match rocket.stages.get(1).map(|s| s.ignition) {
            Some(Ignition::AfterBurnout { delay }) => Some(t0 + delay),
            _ => None,
        };
        Self {
            phase: FlightPhase::FreeFlight,
            active_stage: 0,
            ignition_time: Some(t0 - burn),
            burning: false,
            next_ignition,
            apogee: None,
            chutes: vec![Chute::Stowed; rocket.parachutes.len()],
        }
    }

    /// Time since ignition of the active motor, held inside the burn while
    /// the motor is lit and past it once burnt out.
    pub fn motor_time(&self, rocket: &Rocket, t: f64) -> Option<f64> {
        let burn = rocket.stages.get(self.active_stage)?.motor.burn_time();
        self.ignition_time.map(|ti| {
            let elapsed = t - ti;
            if self.burning { elapsed.clamp(0.0, burn) } else { elapsed.max(burn) }
        })
    }

    pub fn burnout_time(&self, rocket: &Rocket) -> Option<f64> {
        if !self.burning {
            return None;
        }
        let stage = rocket.stages.get(self.active_stage)?;
        self.ignition_time.map(|ti| ti + stage.motor.burn_time())
    }

    /// Total drag area of the inflated parachutes, m^2.
    pub fn drag_area(&self, rocket: &Rocket) -> f64 {
        rocket
            .parachutes
            .iter()
            .zip(&self.chutes)
            .filter(|(_, c)| **c == Chute::Inflated)
            .map(|(p, _)| p.drag_area)
            .sum()
    }

    /// Apply the actions of a transition and move to its phase.
    pub fn apply(&mut self, transition: &Transition) {
        for action in &transition.actions {
            match *action {
                Action::Burnout => self.burning = false,
                Action::ScheduleIgnition { at } => self.next_ignition = Some(at),
                Action::CancelIgnition => self.next_ignition = None,
                Action::DropStage => self.active_stage += 1,
                Action::Ignite { at } => {
                    self.ignition_time = Some(at);
                    self.burning = true;
                    self.next_ignition = None;
                    self.apogee = None;
                }
                Action::MarkApogee { at } => self.apogee = Some(at),
                Action::ScheduleInflation { index, at } => self.chutes[index] = Chute::Deploying { inflate_at: at },
                Action::Inflate { index } => self.chutes[index] = Chute::Inflated,
            }
        }
        self.phase = transition.next;
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Side effect of a transition on the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Burnout,
    ScheduleIgnition { at: f64 },
    CancelIgnition,
    /// Release the lowest attached stage.
    DropStage,
    Ignite { at: f64 },
    MarkApogee { at: f64 },
    ScheduleInflation { index: usize, at: f64 },
    Inflate { index: usize },
}

/// Change applied to the state vector at the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    ZeroAngularVelocity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: FlightPhase,
    pub reset: Option<Reset>,
    pub actions: Vec<Action>,
}

impl Transition {
    fn stay(phase: FlightPhase) -> Self {
        Self { next: phase, reset: None, actions: vec![] }
    }
}

fn parachutes_armed(phase: FlightPhase) -> bool {
    matches!(phase, FlightPhase::FreeFlight | FlightPhase::ParachuteDescent)
}

fn deploy(phase: FlightPhase, index: usize, lag: f64, time: f64) -> Transition {
    if lag > 0.0 {
        return Transition {
            next: phase,
            reset: None,
            actions: vec![Action::ScheduleInflation { index, at: time + lag }],
        };
    }
    inflate(phase, index)
}

fn inflate(phase: FlightPhase, index: usize) -> Transition {
    let reset = (phase != FlightPhase::ParachuteDescent).then_some(Reset::ZeroAngularVelocity);
    Transition { next: FlightPhase::ParachuteDescent, reset, actions: vec![Action::Inflate { index }] }
}

/// Pure phase transition for `event` at `time`.
pub fn transition(config: &Configuration, event: EventKind, rocket: &Rocket, time: f64) -> Transition {
    use FlightPhase::*;
    let phase = config.phase;
    if phase.is_terminal() {
        return Transition::stay(phase);
    }

    match event {
        EventKind::RailDeparture => match phase {
            OnRail => Transition::stay(if config.burning { Powered } else { FreeFlight }),
            _ => Transition::stay(phase),
        },

        EventKind::Burnout { stage } => {
            let mut actions = vec![Action::Burnout];
            if let Some(Ignition::AfterBurnout { delay }) = rocket.stages.get(stage + 1).map(|s| s.ignition) {
                actions.push(Action::ScheduleIgnition { at: time + delay });
            }
            let next = if phase == Powered { FreeFlight } else { phase };
            Transition { next, reset: None, actions }
        }

        EventKind::Ignition { .. } => match phase {
            OnRail | FreeFlight => Transition {
                next: if phase == OnRail { OnRail } else { Powered },
                reset: None,
                actions: vec![Action::DropStage, Action::Ignite { at: time }],
            },
            _ => Transition { next: phase, reset: None, actions: vec![Action::CancelIgnition] },
        },

        EventKind::Apogee => Transition { next: phase, reset: None, actions: vec![Action::MarkApogee { at: time }] },

        EventKind::ParachuteTrigger { index } => match rocket.parachutes.get(index) {
            Some(p) if parachutes_armed(phase) => deploy(phase, index, p.lag, time),
            _ => Transition::stay(phase),
        },

        EventKind::ParachuteInflation { index } if parachutes_armed(phase) => inflate(phase, index),
        EventKind::ParachuteInflation { .. } => Transition::stay(phase),

        EventKind::GroundContact => Transition::stay(Landed),
    }
}

// ---------------------------------------------------------------------------
// Trigger arming
// ---------------------------------------------------------------------------

/// A boundary the detector watches for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Fires when the event's guard function crosses zero in `direction`.
    Crossing { kind: EventKind, direction: Direction },
    /// Fires at a known time; the integrator lands on it exactly.
    At { kind: EventKind, time: f64 },
}

impl Trigger {
    pub fn kind(&self) -> EventKind {
        match *self {
            Trigger::Crossing { kind, .. } | Trigger::At { kind, .. } => kind,
        }
    }
}

/// Triggers armed for the current phase and configuration.
pub fn armed_triggers(config: &Configuration, rocket: &Rocket) -> Vec<Trigger> {
    use FlightPhase::*;
    let phase = config.phase;
    let mut armed = Vec::new();
    if phase.is_terminal() {
        return armed;
    }

    if phase == OnRail {
        armed.push(Trigger::Crossing { kind: EventKind::RailDeparture, direction: Direction::Falling });
    }
    if let Some(time) = config.burnout_time(rocket) {
        armed.push(Trigger::At { kind: EventKind::Burnout { stage: config.active_stage }, time });
    }
    let upper = EventKind::Ignition { stage: config.active_stage + 1 };
    if let (Some(time), OnRail | FreeFlight) = (config.next_ignition, phase) {
        armed.push(Trigger::At { kind: upper, time });
    }
    let lights_at_apogee =
        rocket.stages.get(config.active_stage + 1).is_some_and(|s| s.ignition == Ignition::Apogee);
    if phase == FreeFlight && !config.burning && lights_at_apogee {
        armed.push(at_apogee(config, upper));
    }
    if phase != OnRail {
        if config.apogee.is_none() {
            armed.push(Trigger::Crossing { kind: EventKind::Apogee, direction: Direction::Falling });
        }
        armed.push(Trigger::Crossing { kind: EventKind::GroundContact, direction: Direction::Falling });
    }
    if parachutes_armed(phase) {
        for (index, (p, chute)) in rocket.parachutes.iter().zip(&config.chutes).enumerate() {
            match *chute {
                Chute::Stowed => {
                    let kind = EventKind::ParachuteTrigger { index };
                    armed.push(match &p.trigger {
                        ParachuteTrigger::Apogee => at_apogee(config, kind),
                        ParachuteTrigger::Altitude(_) => Trigger::Crossing { kind, direction: Direction::Falling },
                        ParachuteTrigger::Custom { direction, .. } => Trigger::Crossing { kind, direction: *direction },
                    });
                }
                Chute::Deploying { inflate_at } => {
                    armed.push(Trigger::At { kind: EventKind::ParachuteInflation { index }, time: inflate_at });
                }
                Chute::Inflated => {}
            }
        }
    }
    armed
}

/// Trigger for something that happens at apogee: the crossing while it is
/// still ahead, or right away once it has passed.
fn at_apogee(config: &Configuration, kind: EventKind) -> Trigger {
    match config.apogee {
        Some(time) => Trigger::At { kind, time },
        None => Trigger::Crossing { kind, direction: Direction::Falling },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::parachute::Parachute;
    use crate::vehicle::rocket::{presets, RocketBuilder};
    use crate::vehicle::stage::StageBuilder;
    use crate::vehicle::motor::SolidMotor;

    fn rocket(lag: f64) -> Rocket {
        RocketBuilder::new("T")
            .stage(
                StageBuilder::new("S")
                    .dry_mass(20.0)
                    .motor(SolidMotor::constant(1500.0, 4.0, 0.0).unwrap())
                    .build()
                    .unwrap(),
            )
            .parachute(Parachute::new("Main", 5.0, ParachuteTrigger::Apogee).lag(lag))
            .build()
            .unwrap()
    }

    fn step(config: &mut Configuration, event: EventKind, rocket: &Rocket, t: f64) -> Transition {
        let tr = transition(config, event, rocket, t);
        config.apply(&tr);
        tr
    }

    #[test]
    fn nominal_sequence() {
        let r = rocket(0.0);
        let mut c = Configuration::on_rail(&r, 0.0);
        step(&mut c, EventKind::RailDeparture, &r, 0.3);
        assert_eq!(c.phase, FlightPhase::Powered);
        step(&mut c, EventKind::Burnout { stage: 0 }, &r, 4.0);
        assert_eq!(c.phase, FlightPhase::FreeFlight);
        assert!(!c.burning);
        let tr = step(&mut c, EventKind::ParachuteTrigger { index: 0 }, &r, 20.0);
        assert_eq!(tr.reset, Some(Reset::ZeroAngularVelocity));
        assert_eq!(c.phase, FlightPhase::ParachuteDescent);
        assert_eq!(c.drag_area(&r), 5.0);
        step(&mut c, EventKind::GroundContact, &r, 80.0);
        assert!(c.phase.is_terminal());
        assert!(armed_triggers(&c, &r).is_empty());
    }

    #[test]
    fn departure_after_burnout_goes_ballistic() {
        let r = rocket(0.0);
        let mut c = Configuration::on_rail(&r, 0.0);
        step(&mut c, EventKind::Burnout { stage: 0 }, &r, 4.0);
        assert_eq!(c.phase, FlightPhase::OnRail);
        step(&mut c, EventKind::RailDeparture, &r, 4.5);
        assert_eq!(c.phase, FlightPhase::FreeFlight);
    }

    #[test]
    fn lagged_parachute_schedules_inflation() {
        let r = rocket(1.5);
        let mut c = Configuration::free_flight(&r, 0.0);
        let tr = step(&mut c, EventKind::ParachuteTrigger { index: 0 }, &r, 10.0);
        assert_eq!(tr.next, FlightPhase::FreeFlight);
        let armed = armed_triggers(&c, &r);
        assert!(armed.contains(&Trigger::At { kind: EventKind::ParachuteInflation { index: 0 }, time: 11.5 }));
        step(&mut c, EventKind::ParachuteInflation { index: 0 }, &r, 11.5);
        assert_eq!(c.phase, FlightPhase::ParachuteDescent);
    }

    #[test]
    fn parachutes_disarmed_while_powered() {
        let r = rocket(0.0);
        let mut c = Configuration::on_rail(&r, 0.0);
        c.phase = FlightPhase::Powered;
        assert!(!armed_triggers(&c, &r)
            .iter()
            .any(|t| matches!(t.kind(), EventKind::ParachuteTrigger { .. })));
        let tr = transition(&c, EventKind::ParachuteTrigger { index: 0 }, &r, 2.0);
        assert_eq!(tr.next, FlightPhase::Powered);
        assert!(tr.actions.is_empty());
    }

    #[test]
    fn staging_drops_and_relights() {
        let r = presets::pathfinder().unwrap();
        let mut c = Configuration::on_rail(&r, 0.0);
        step(&mut c, EventKind::RailDeparture, &r, 0.5);
        step(&mut c, EventKind::Burnout { stage: 0 }, &r, 10.8);
        assert_eq!(c.next_ignition, Some(11.8));
        step(&mut c, EventKind::Ignition { stage: 1 }, &r, 11.8);
        assert_eq!(c.phase, FlightPhase::Powered);
        assert_eq!(c.active_stage, 1);
        assert_eq!(c.burnout_time(&r), Some(11.8 + 12.2));
    }

    #[test]
    fn apogee_armed_once() {
        let r = rocket(0.0);
        let mut c = Configuration::free_flight(&r, 0.0);
        c.chutes[0] = Chute::Inflated;
        c.phase = FlightPhase::ParachuteDescent;
        assert!(armed_triggers(&c, &r).iter().any(|t| t.kind() == EventKind::Apogee));
        step(&mut c, EventKind::Apogee, &r, 5.0);
        assert!(!armed_triggers(&c, &r).iter().any(|t| t.kind() == EventKind::Apogee));
    }

    #[test]
    fn apogee_ignition_is_a_crossing_of_its_own() {
        let r = RocketBuilder::new("Two")
            .stage(StageBuilder::new("Booster").motor(SolidMotor::constant(1500.0, 4.0, 0.0).unwrap()).build().unwrap())
            .stage(
                StageBuilder::new("Sustainer")
                    .motor(SolidMotor::constant(800.0, 3.0, 0.0).unwrap())
                    .ignition(Ignition::Apogee)
                    .build()
                    .unwrap(),
            )
            .parachute(Parachute::new("Main", 5.0, ParachuteTrigger::Apogee))
            .build()
            .unwrap();
        let mut c = Configuration::free_flight(&r, 4.0);
        let ignition = EventKind::Ignition { stage: 1 };
        assert!(armed_triggers(&c, &r).contains(&Trigger::Crossing { kind: ignition, direction: Direction::Falling }));
        assert!(ignition.priority() < EventKind::ParachuteTrigger { index: 0 }.priority());

        let tr = transition(&c, EventKind::Apogee, &r, 20.0);
        assert_eq!(tr.actions, vec![Action::MarkApogee { at: 20.0 }]);
        assert_eq!(tr.next, FlightPhase::FreeFlight);

        step(&mut c, ignition, &r, 20.0);
        assert_eq!(c.phase, FlightPhase::Powered);
        assert_eq!(c.active_stage, 1);
        assert!(!armed_triggers(&c, &r).iter().any(|t| t.kind() == ignition));
    }

    #[test]
    fn relight_rearms_apogee() {
        let r = presets::pathfinder().unwrap();
        let mut c = Configuration::free_flight(&r, 10.8);
        step(&mut c, EventKind::Apogee, &r, 11.5);
        assert_eq!(c.apogee, Some(11.5));
        step(&mut c, EventKind::Ignition { stage: 1 }, &r, 11.8);
        assert_eq!(c.apogee, None);
        assert!(armed_triggers(&c, &r).iter().any(|t| t.kind() == EventKind::Apogee));
    }

    #[test]
    fn apogee_chute_fires_once_armed_after_a_powered_apogee() {
        let r = rocket(0.0);
        let mut c = Configuration::on_rail(&r, 0.0);
        step(&mut c, EventKind::RailDeparture, &r, 0.3);
        step(&mut c, EventKind::Apogee, &r, 3.0);
        assert_eq!(c.phase, FlightPhase::Powered);
        step(&mut c, EventKind::Burnout { stage: 0 }, &r, 4.0);
        let chute = EventKind::ParachuteTrigger { index: 0 };
        assert!(armed_triggers(&c, &r).contains(&Trigger::At { kind: chute, time: 3.0 }));
    }

    #[test]
    fn motor_time_held_within_burn() {
        let r = rocket(0.0);
        let mut c = Configuration::on_rail(&r, 0.0);
        assert_eq!(c.motor_time(&r, 4.0 + 1e-12), Some(4.0));
        c.burning = false;
        assert_eq!(c.motor_time(&r, 3.999), Some(4.0));
    }
}
