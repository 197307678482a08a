use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::dynamics::state::G0;
use crate::sim::event::{EventKind, EventRecord};
use crate::sim::integrator::StepStats;
use crate::sim::phase::FlightPhase;
use crate::sim::trajectory::{Flight, FlightStatus, Sample};

/// One line of the event log.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub name: String,
    pub kind: EventKind,
    pub time_s: f64,
    pub altitude_m: f64,
    pub speed_ms: f64,
    pub phase_before: FlightPhase,
    pub phase_after: FlightPhase,
}

impl From<&EventRecord> for EventSummary {
    fn from(e: &EventRecord) -> Self {
        Self {
            name: e.name.clone(),
            kind: e.kind,
            time_s: e.time,
            altitude_m: e.state.altitude(),
            speed_ms: e.state.speed(),
            phase_before: e.phase_before,
            phase_after: e.phase_after,
        }
    }
}

/// Summary statistics computed from a flight.
#[derive(Debug, Clone, Serialize)]
pub struct FlightSummary {
    pub rocket: String,
    pub status: FlightStatus,
    pub apogee_m: f64,
    pub apogee_time_s: f64,
    pub rail_exit_speed_ms: Option<f64>,
    pub max_speed_ms: f64,
    pub max_mach: f64,
    pub max_dynamic_pressure_pa: f64,
    pub max_accel_ms2: f64,
    pub max_accel_g: f64,
    pub impact_speed_ms: Option<f64>,
    /// East/North landing point relative to the pad, m.
    pub landing_point_m: Option<[f64; 2]>,
    pub flight_time_s: f64,
    pub events: Vec<EventSummary>,
    pub integration: StepStats,
}

impl FlightSummary {
    pub fn from_flight(flight: &Flight) -> Self {
        let traj = &flight.trajectory;
        let max = |key: fn(&Sample) -> f64| traj.max_by_key(key).map_or(0.0, key);
        let (apogee_m, apogee_time_s) = traj.apogee().map_or((0.0, 0.0), |s| (s.altitude(), s.time()));
        let max_accel = max(|s| s.acceleration.norm());
        let landing = flight.event(EventKind::GroundContact);

        FlightSummary {
            rocket: flight.rocket.clone(),
            status: flight.status,
            apogee_m,
            apogee_time_s,
            rail_exit_speed_ms: flight.event(EventKind::RailDeparture).map(|e| e.state.speed()),
            max_speed_ms: max(|s| s.speed()),
            max_mach: max(|s| s.mach),
            max_dynamic_pressure_pa: max(|s| s.dynamic_pressure),
            max_accel_ms2: max_accel,
            max_accel_g: max_accel / G0,
            impact_speed_ms: landing.map(|e| e.state.speed()),
            landing_point_m: landing.map(|e| [e.state.pos.x, e.state.pos.y]),
            flight_time_s: traj.duration(),
            events: flight.events.iter().map(EventSummary::from).collect(),
            integration: flight.stats,
        }
    }
}

/// Write flight summary as pretty-printed JSON.
pub fn write_summary<W: Write>(writer: &mut W, summary: &FlightSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)
}

/// Write flight summary JSON to a file.
pub fn write_summary_file(path: impl AsRef<Path>, summary: &FlightSummary) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::atmosphere::StandardAtmosphere;
    use crate::sim::config::SimConfig;
    use crate::sim::runner::FlightEngine;
    use crate::vehicle::presets;

    fn short_flight() -> Flight {
        let rocket = presets::calisto().unwrap();
        let env = StandardAtmosphere::new();
        let config = SimConfig { max_time: 5.0, ..SimConfig::default() };
        FlightEngine::new(&rocket, &env, config).run().unwrap()
    }

    #[test]
    fn summary_reports_rail_exit_and_peaks() {
        let s = FlightSummary::from_flight(&short_flight());
        assert_eq!(s.status, FlightStatus::TimeLimit);
        assert!(s.rail_exit_speed_ms.unwrap() > 15.0);
        assert!(s.max_speed_ms > s.rail_exit_speed_ms.unwrap());
        assert!(s.max_accel_g > 1.0);
        assert!(s.impact_speed_ms.is_none());
        assert!((s.flight_time_s - 5.0).abs() < 1e-12);
    }

    #[test]
    fn json_output_is_valid() {
        let summary = FlightSummary::from_flight(&short_flight());
        let mut buf = Vec::new();
        write_summary(&mut buf, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["rocket"], "Calisto");
        assert_eq!(value["status"], "TimeLimit");
        assert!(value["events"].as_array().unwrap().len() >= 2);
        assert!(value["apogee_m"].as_f64().unwrap() > 0.0);
    }
}
