use rocket_flight::io::csv;
use rocket_flight::io::json::{self, FlightSummary};
use rocket_flight::sim::{EventKind, FlightEngine, SimConfig};
use rocket_flight::vehicle::presets;
use rocket_flight::StandardAtmosphere;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let rocket = presets::pathfinder()?;
    let env = StandardAtmosphere::new().uniform_wind(4.0, 90f64.to_radians());
    let config = SimConfig { seed: 1, ..SimConfig::default() };

    println!("Simulating {} ...", rocket.name);
    let flight = FlightEngine::new(&rocket, &env, config)
        .run()
        .map_err(|f| anyhow::anyhow!("{} (t={:.3} s)", f.error, f.last_state.time))?;

    let summary = FlightSummary::from_flight(&flight);
    println!("Apogee: {:.1} km", summary.apogee_m / 1000.0);
    println!("Max speed: {:.1} m/s (Mach {:.2})", summary.max_speed_ms, summary.max_mach);
    println!("Flight time: {:.1} s", summary.flight_time_s);
    if let Some(e) = flight.event(EventKind::Ignition { stage: 1 }) {
        println!("Sustainer ignition at t={:.2} s, {:.0} m", e.time, e.state.altitude());
    }

    csv::write_trajectory_file("pathfinder_trajectory.csv", &flight.trajectory)?;
    json::write_summary_file("pathfinder_summary.json", &summary)?;

    println!("Exported: pathfinder_trajectory.csv, pathfinder_summary.json");
    Ok(())
}
