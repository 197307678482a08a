pub mod config;
pub mod event;
pub mod integrator;
pub mod noise;
pub mod phase;
pub mod runner;
pub mod trajectory;

pub use config::{AbsTolerance, SimConfig};
pub use event::{Direction, EventKind, EventRecord};
pub use integrator::{DormandPrince, OdeSystem, StepStats};
pub use phase::FlightPhase;
pub use runner::{run_all, CancelToken, FlightEngine, InitialCondition};
pub use trajectory::{Flight, FlightStatus, Sample, Trajectory};
