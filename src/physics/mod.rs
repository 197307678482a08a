pub mod aerodynamics;
pub mod atmosphere;
pub mod curve;
pub mod gravity;

pub use aerodynamics::{AeroCoefficients, Aerodynamics, ConstantAero, TabulatedAero};
pub use atmosphere::{Atmo, Environment, StandardAtmosphere};
pub use curve::{Curve, Table};
pub use gravity::GravityModel;
