pub mod dynamics;
pub mod error;
pub mod io;
pub mod physics;
pub mod sim;
pub mod vehicle;

pub use error::{FlightError, FlightFailure};
pub use physics::{Environment, StandardAtmosphere};
pub use sim::{CancelToken, Flight, FlightEngine, FlightStatus, InitialCondition, SimConfig};
pub use vehicle::{presets, Rocket, RocketBuilder};
