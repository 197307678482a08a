pub mod motor;
pub mod parachute;
pub mod rocket;
pub mod stage;

pub use motor::{Grain, Motor, SolidMotor};
pub use parachute::{NoiseSpec, Parachute, ParachuteTrigger, SensorReading};
pub use rocket::{presets, Rail, Rocket, RocketBuilder};
pub use stage::{Ignition, Stage, StageBuilder};
