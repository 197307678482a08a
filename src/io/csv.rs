use std::io::{self, Write};
use std::path::Path;

use crate::sim::event::EventRecord;
use crate::sim::trajectory::Trajectory;

/// Write trajectory samples in CSV format.
///
/// Columns: time, phase, pos_x, pos_y, pos_z, vel_x, vel_y, vel_z,
///          quat_w, quat_x, quat_y, quat_z, omega_x, omega_y, omega_z,
///          mass, cg, thrust, mach, q_dyn, alpha_deg, acc_x, acc_y, acc_z,
///          pitch_deg, energy
pub fn write_trajectory<W: Write>(writer: &mut W, trajectory: &Trajectory) -> io::Result<()> {
    writeln!(
        writer,
        "time,phase,pos_x,pos_y,pos_z,vel_x,vel_y,vel_z,\
         quat_w,quat_x,quat_y,quat_z,omega_x,omega_y,omega_z,\
         mass,cg,thrust,mach,q_dyn,alpha_deg,acc_x,acc_y,acc_z,\
         pitch_deg,energy"
    )?;

    for sample in trajectory.samples() {
        let s = &sample.state;
        let q = &s.quat;
        let a = &sample.acceleration;
        writeln!(
            writer,
            "{:.6},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},\
             {:.8},{:.8},{:.8},{:.8},{:.6},{:.6},{:.6},\
             {:.4},{:.4},{:.2},{:.4},{:.2},{:.3},{:.4},{:.4},{:.4},\
             {:.2},{:.2}",
            s.time,
            sample.phase,
            s.pos.x, s.pos.y, s.pos.z,
            s.vel.x, s.vel.y, s.vel.z,
            q.w, q.i, q.j, q.k,
            s.omega.x, s.omega.y, s.omega.z,
            sample.mass,
            sample.cg,
            sample.thrust,
            sample.mach,
            sample.dynamic_pressure,
            sample.alpha.to_degrees(),
            a.x, a.y, a.z,
            s.pitch().to_degrees(),
            sample.total_energy(),
        )?;
    }

    Ok(())
}

/// Write the event log in CSV format.
pub fn write_events<W: Write>(writer: &mut W, events: &[EventRecord]) -> io::Result<()> {
    writeln!(writer, "time,event,phase_before,phase_after,altitude,speed")?;
    for e in events {
        writeln!(
            writer,
            "{:.6},{},{},{},{:.3},{:.3}",
            e.time,
            e.name,
            e.phase_before,
            e.phase_after,
            e.state.altitude(),
            e.state.speed(),
        )?;
    }
    Ok(())
}

/// Write trajectory to a CSV file at the given path.
pub fn write_trajectory_file(path: impl AsRef<Path>, trajectory: &Trajectory) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_trajectory(&mut file, trajectory)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::atmosphere::StandardAtmosphere;
    use crate::sim::config::SimConfig;
    use crate::sim::runner::FlightEngine;
    use crate::vehicle::presets;

    #[test]
    fn csv_output_has_header_and_rows() {
        let rocket = presets::calisto().unwrap();
        let env = StandardAtmosphere::new();
        let config = SimConfig { max_time: 1.0, ..SimConfig::default() };
        let flight = FlightEngine::new(&rocket, &env, config).run().unwrap();

        let mut buf = Vec::new();
        write_trajectory(&mut buf, &flight.trajectory).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("time,phase,"));
        assert_eq!(lines.len(), flight.trajectory.len() + 1);
        assert!(lines[1].starts_with("0.000000,on-rail,"));
        assert_eq!(lines[1].split(',').count(), lines[0].split(',').count());
    }

    #[test]
    fn event_log_lists_rail_departure() {
        let rocket = presets::calisto().unwrap();
        let env = StandardAtmosphere::new();
        let config = SimConfig { max_time: 1.0, ..SimConfig::default() };
        let flight = FlightEngine::new(&rocket, &env, config).run().unwrap();

        let mut buf = Vec::new();
        write_events(&mut buf, &flight.events).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("Rail departure,on-rail,powered"));
    }
}
