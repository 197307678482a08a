use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rocket_flight::dynamics::state::G0;
use rocket_flight::io::{csv, json::{self, FlightSummary}};
use rocket_flight::physics::atmosphere::isa;
use rocket_flight::sim::{EventKind, Flight, FlightEngine, SimConfig};
use rocket_flight::vehicle::{presets, Rocket};
use rocket_flight::StandardAtmosphere;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Single-stage high-power rocket with drogue and main chutes
    Calisto,
    /// Two-stage sounding rocket
    Pathfinder,
}

/// Simulate a rocket flight from the rail to landing.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, value_enum, default_value = "calisto")]
    preset: Preset,

    /// Rail length, m
    #[arg(long)]
    rail_length: Option<f64>,
    /// Rail inclination above the horizon, deg
    #[arg(long)]
    inclination: Option<f64>,
    /// Rail heading clockwise from North, deg
    #[arg(long)]
    heading: Option<f64>,

    /// Uniform wind speed, m/s
    #[arg(long, default_value_t = 0.0)]
    wind_speed: f64,
    /// Direction the wind blows toward, deg clockwise from North
    #[arg(long, default_value_t = 0.0)]
    wind_heading: f64,
    /// Launch site elevation, m
    #[arg(long, default_value_t = 0.0)]
    elevation: f64,

    /// JSON file with integrator and run settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sensor noise seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
    /// Maximum simulated time, s (overrides the config file)
    #[arg(long)]
    max_time: Option<f64>,

    /// Write the trajectory as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write the event log as CSV
    #[arg(long)]
    events: Option<PathBuf>,
    /// Write a JSON flight summary
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut rocket = match args.preset {
        Preset::Calisto => presets::calisto(),
        Preset::Pathfinder => presets::pathfinder(),
    }
    .context("building preset rocket")?;
    if let Some(len) = args.rail_length {
        rocket.rail.length = len;
    }
    if let Some(deg) = args.inclination {
        rocket.rail.inclination = deg.to_radians();
    }
    if let Some(deg) = args.heading {
        rocket.rail.heading = deg.to_radians();
    }

    let env = StandardAtmosphere::new()
        .elevation(args.elevation)
        .uniform_wind(args.wind_speed, args.wind_heading.to_radians());

    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            SimConfig::from_json(&text)?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(t) = args.max_time {
        config.max_time = t;
    }

    info!(rocket = %rocket.name, stages = rocket.stage_count(), "starting flight");
    let flight = FlightEngine::new(&rocket, &env, config)
        .run()
        .map_err(|f| anyhow::anyhow!("flight failed at t={:.3} s: {}", f.last_state.time, f.error))?;

    print_report(&rocket, &env, &flight);

    if let Some(path) = &args.csv {
        csv::write_trajectory_file(path, &flight.trajectory)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "trajectory written");
    }
    if let Some(path) = &args.events {
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        csv::write_events(&mut std::io::BufWriter::new(file), &flight.events)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "event log written");
    }
    if let Some(path) = &args.json {
        json::write_summary_file(path, &FlightSummary::from_flight(&flight))
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }
    Ok(())
}

fn print_report(rocket: &Rocket, env: &StandardAtmosphere, flight: &Flight) {
    let rule = "─".repeat(66);
    let summary = FlightSummary::from_flight(flight);

    println!();
    println!("====================================================================");
    println!("  {} ({} stage{})", rocket.name, rocket.stage_count(), if rocket.stage_count() == 1 { "" } else { "s" });
    println!("====================================================================");
    println!();
    println!("  Vehicle");
    println!("  {rule}");
    println!("  Liftoff mass:  {:>8.2} kg    Rail:        {:>8.2} m", rocket.liftoff_mass(), rocket.rail.length);
    println!(
        "  Inclination:   {:>8.1} deg   Heading:     {:>8.1} deg",
        rocket.rail.inclination.to_degrees(),
        rocket.rail.heading.to_degrees()
    );
    println!("  Parachutes:    {:>8}", rocket.parachutes.len());
    println!();

    println!("  Flight Events");
    println!("  {rule}");
    for e in &flight.events {
        println!(
            "  {:<24} t={:>7.2}s   alt={:>8.1}m   vel={:>7.1}m/s   {} -> {}",
            e.name,
            e.time,
            e.state.altitude(),
            e.state.speed(),
            e.phase_before,
            e.phase_after
        );
    }
    println!();

    println!("  Performance Summary");
    println!("  {rule}");
    println!("  Max altitude:  {:>8.0} m   ({:.2} km) at t={:.1}s", summary.apogee_m, summary.apogee_m / 1000.0, summary.apogee_time_s);
    if let Some(v) = summary.rail_exit_speed_ms {
        println!("  Rail exit:     {:>8.1} m/s", v);
    }
    println!("  Max speed:     {:>8.1} m/s (Mach {:.2})", summary.max_speed_ms, summary.max_mach);
    println!("  Max q:         {:>8.0} Pa", summary.max_dynamic_pressure_pa);
    println!("  Max accel:     {:>8.1} m/s^2 ({:.1} g)", summary.max_accel_ms2, summary.max_accel_ms2 / G0);
    if let (Some(v), Some([x, y])) = (summary.impact_speed_ms, summary.landing_point_m) {
        println!("  Impact:        {:>8.1} m/s at E {:.0} m, N {:.0} m", v, x, y);
    }
    println!("  Flight time:   {:>8.1} s   status: {:?}", summary.flight_time_s, summary.status);
    println!();

    println!("  Trajectory");
    println!("  {rule}");
    println!(
        "  {:>7}  {:>9}  {:>9}  {:>8}  {:>8}  {:>12}",
        "t (s)", "alt (m)", "vel (m/s)", "Mach", "mass(kg)", "phase"
    );
    println!("  {}", "─".repeat(62));

    let samples = flight.trajectory.samples();
    let interval = (samples.len() / 30).max(1);
    let event_times: Vec<f64> = flight.events.iter().map(|e| e.time).collect();
    for (i, s) in samples.iter().enumerate() {
        let at_event = event_times.contains(&s.time());
        if i % interval != 0 && !at_event && i + 1 != samples.len() {
            continue;
        }
        println!(
            "  {:>7.2}  {:>9.1}  {:>9.1}  {:>8.3}  {:>8.2}  {:>12}",
            s.time(),
            s.altitude(),
            s.speed(),
            s.mach,
            s.mass,
            s.phase
        );
    }

    println!();
    let stats = flight.stats;
    println!(
        "  Integration: {} accepted, {} rejected, {} evaluations",
        stats.accepted, stats.rejected, stats.evaluations
    );
    if let Some(apogee) = flight.event(EventKind::Apogee) {
        let atmo = isa(apogee.state.altitude() + env.elevation);
        println!("  Air density at apogee: {:.4} kg/m^3", atmo.density);
    }
    println!("====================================================================");
    println!();
}
