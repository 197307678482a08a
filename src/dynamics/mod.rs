pub mod forces;
pub mod frames;
pub mod mass;
pub mod sixdof;
pub mod state;

pub use forces::{ForceModel, Loads};
pub use mass::{mass_properties, MassProperties};
pub use sixdof::{derivative, FlightModel};
pub use state::{Deriv, State, StateVector};
