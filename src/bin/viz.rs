use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, VLine};

use rocket_flight::sim::{Flight, FlightEngine, Sample, SimConfig};
use rocket_flight::vehicle::presets;
use rocket_flight::StandardAtmosphere;

fn main() -> eframe::Result {
    tracing_subscriber::fmt().with_target(false).init();

    let preset = std::env::args().nth(1).unwrap_or_else(|| "calisto".into());
    let rocket = match preset.as_str() {
        "pathfinder" => presets::pathfinder(),
        _ => presets::calisto(),
    };
    let flight = rocket.map_err(|e| e.to_string()).and_then(|rocket| {
        let env = StandardAtmosphere::new();
        FlightEngine::new(&rocket, &env, SimConfig::default())
            .run()
            .map_err(|f| f.error.to_string())
    });
    let flight = match flight {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("flight failed: {msg}");
            std::process::exit(1);
        }
    };

    let app = FlightViz { flight };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native("Rocket Flight", options, Box::new(|_| Ok(Box::new(app))))
}

struct FlightViz {
    flight: Flight,
}

impl FlightViz {
    fn plot(&self, ui: &mut egui::Ui, id: &str, x_label: &str, size: egui::Vec2, f: impl Fn(&Sample) -> [f64; 2]) {
        let samples = self.flight.trajectory.samples();
        let step = (samples.len() / 2000).max(1);
        let points: PlotPoints = samples.iter().step_by(step).map(&f).collect();
        let event_times: Vec<f64> = self.flight.events.iter().map(|e| e.time).collect();
        let time_axis = x_label.starts_with("Time");
        Plot::new(id)
            .width(size.x)
            .height(size.y)
            .x_axis_label(x_label)
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(id, points));
                if time_axis {
                    for t in &event_times {
                        plot_ui.vline(VLine::new("event", *t));
                    }
                }
            });
    }
}

impl eframe::App for FlightViz {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            let traj = &self.flight.trajectory;
            ui.heading(format!("Rocket: {}", self.flight.rocket));
            let apogee = traj.apogee().map_or(0.0, |s| s.altitude());
            let max_mach = traj.max_by_key(|s| s.mach).map_or(0.0, |s| s.mach);
            ui.label(format!(
                "Apogee: {:.0} m  |  Max Mach {:.2}  |  Events: {}  |  Flight: {:.0} s  |  {:?}",
                apogee,
                max_mach,
                self.flight.events.len(),
                traj.duration(),
                self.flight.status,
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let half = egui::vec2(available.x / 2.0 - 8.0, available.y / 2.0 - 8.0);

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Altitude AGL (m)");
                    self.plot(ui, "Altitude", "Time (s)", half, |s| [s.time(), s.altitude()]);
                });
                ui.vertical(|ui| {
                    ui.label("Speed (m/s)");
                    self.plot(ui, "Speed", "Time (s)", half, |s| [s.time(), s.speed()]);
                });
            });
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Mach");
                    self.plot(ui, "Mach", "Time (s)", half, |s| [s.time(), s.mach]);
                });
                ui.vertical(|ui| {
                    ui.label("Ground track (m)");
                    self.plot(ui, "Track", "East (m)", half, |s| [s.state.pos.x, s.state.pos.y]);
                });
            });
        });
    }
}
