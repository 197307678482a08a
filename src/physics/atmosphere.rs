use nalgebra::Vector3;

use crate::dynamics::state::G0;
use crate::physics::curve::Curve;
use crate::physics::gravity::GravityModel;

// ---------------------------------------------------------------------------
// ISA 1976 Standard Atmosphere (-5 km to 86 km)
// ---------------------------------------------------------------------------

const R_AIR: f64 = 287.052_87; // specific gas constant for dry air, J/(kg·K)
const GAMMA: f64 = 1.4; // ratio of specific heats

const T0: f64 = 288.15; // sea-level temperature, K
const P0: f64 = 101_325.0; // sea-level pressure, Pa
const LAPSE_TROPO: f64 = -0.0065; // K/m

/// Lowest altitude the model extends the troposphere down to.
const H_MIN: f64 = -5_000.0;

/// Atmospheric properties at a given altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmo {
    pub density: f64,     // kg/m^3
    pub pressure: f64,    // Pa
    pub temperature: f64, // K
    pub sound_speed: f64, // m/s
    pub wind: Vector3<f64>, // m/s, inertial ENU
}

impl Atmo {
    pub fn is_finite(&self) -> bool {
        self.density.is_finite()
            && self.pressure.is_finite()
            && self.temperature.is_finite()
            && self.sound_speed.is_finite()
            && self.wind.iter().all(|w| w.is_finite())
    }
}

/// Environment collaborator queried at every integrator stage.
///
/// Implementations must be pure functions of their inputs and defined
/// continuously over every altitude a trial step can reach, including
/// below ground.
pub trait Environment: Send + Sync {
    /// Air properties at `altitude` metres above sea level and simulation time `time`.
    fn atmosphere(&self, altitude: f64, time: f64) -> Atmo;

    fn gravity(&self) -> GravityModel {
        GravityModel::default()
    }

    /// Launch site elevation above sea level, m.
    fn elevation(&self) -> f64 {
        0.0
    }
}

/// ISA standard atmosphere with an altitude-dependent horizontal wind.
#[derive(Debug, Clone)]
pub struct StandardAtmosphere {
    pub elevation: f64,
    pub gravity: GravityModel,
    /// Eastward wind (m/s) as a function of altitude above ground.
    pub wind_east: Curve,
    /// Northward wind (m/s) as a function of altitude above ground.
    pub wind_north: Curve,
}

impl Default for StandardAtmosphere {
    fn default() -> Self {
        Self {
            elevation: 0.0,
            gravity: GravityModel::default(),
            wind_east: Curve::Constant(0.0),
            wind_north: Curve::Constant(0.0),
        }
    }
}

impl StandardAtmosphere {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elevation(mut self, v: f64) -> Self { self.elevation = v; self }
    pub fn gravity(mut self, v: GravityModel) -> Self { self.gravity = v; self }

    /// Uniform wind blowing *toward* `heading` (rad clockwise from North).
    pub fn uniform_wind(mut self, speed: f64, heading: f64) -> Self {
        self.wind_east = Curve::Constant(speed * heading.sin());
        self.wind_north = Curve::Constant(speed * heading.cos());
        self
    }

    pub fn wind_profile(mut self, east: Curve, north: Curve) -> Self {
        self.wind_east = east;
        self.wind_north = north;
        self
    }
}

impl Environment for StandardAtmosphere {
    fn atmosphere(&self, altitude: f64, _time: f64) -> Atmo {
        let agl = altitude - self.elevation;
        let wind = Vector3::new(self.wind_east.eval(agl), self.wind_north.eval(agl), 0.0);
        Atmo { wind, ..isa(altitude) }
    }

    fn gravity(&self) -> GravityModel {
        self.gravity
    }

    fn elevation(&self) -> f64 {
        self.elevation
    }
}

/// ISA 1976 standard atmosphere model, calm air.
///
/// Piecewise temperature profile with 7 layers from 0-86 km. The
/// troposphere gradient is continued below sea level down to -5 km so trial
/// states under the ground still see smooth air; near-vacuum above 86 km.
pub fn isa(altitude_m: f64) -> Atmo {
    let h = altitude_m.max(H_MIN);

    let (temperature, pressure) = if h < 11_000.0 {
        // Troposphere: lapse -6.5 K/km
        gradient_layer(h, 0.0, T0, LAPSE_TROPO, P0)
    } else if h < 20_000.0 {
        // Tropopause: isothermal 216.65 K
        isothermal_layer(h, 11_000.0, 216.65, 22_632.1)
    } else if h < 32_000.0 {
        // Stratosphere I: lapse +1.0 K/km
        gradient_layer(h, 20_000.0, 216.65, 0.001, 5_474.89)
    } else if h < 47_000.0 {
        // Stratosphere II: lapse +2.8 K/km
        gradient_layer(h, 32_000.0, 228.65, 0.0028, 868.019)
    } else if h < 51_000.0 {
        // Mesosphere I: isothermal 270.65 K
        isothermal_layer(h, 47_000.0, 270.65, 110.906)
    } else if h < 71_000.0 {
        // Mesosphere II: lapse -2.8 K/km
        gradient_layer(h, 51_000.0, 270.65, -0.0028, 66.9389)
    } else if h < 86_000.0 {
        // Mesosphere III: lapse -2.0 K/km
        gradient_layer(h, 71_000.0, 214.65, -0.002, 3.956_42)
    } else {
        // Above 86 km: exponential decay approximation
        let t = 186.87;
        let p = 0.3734 * (-0.000_15 * (h - 86_000.0)).exp();
        (t, p.max(0.0))
    };

    let density = if temperature > 0.0 {
        pressure / (R_AIR * temperature)
    } else {
        0.0
    };

    Atmo {
        density,
        pressure,
        temperature,
        sound_speed: (GAMMA * R_AIR * temperature).sqrt(),
        wind: Vector3::zeros(),
    }
}

/// Barometric altitude (m above sea level) a standard altimeter reports for
/// a static pressure reading. Troposphere formula, as flight computers use.
pub fn pressure_altitude(pressure: f64) -> f64 {
    let ratio = (pressure / P0).max(1e-12);
    (T0 / -LAPSE_TROPO) * (1.0 - ratio.powf(-LAPSE_TROPO * R_AIR / G0))
}

// ---------------------------------------------------------------------------
// Layer helpers
// ---------------------------------------------------------------------------

/// Gradient layer: T = T_base + lapse * (h - h_base)
fn gradient_layer(h: f64, h_base: f64, t_base: f64, lapse: f64, p_base: f64) -> (f64, f64) {
    let t = t_base + lapse * (h - h_base);
    let p = p_base * (t / t_base).powf(-G0 / (lapse * R_AIR));
    (t, p)
}

/// Isothermal layer: T = const, pressure decays exponentially
fn isothermal_layer(h: f64, h_base: f64, t: f64, p_base: f64) -> (f64, f64) {
    let p = p_base * ((-G0 / (R_AIR * t)) * (h - h_base)).exp();
    (t, p)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_standard_table() {
        // altitude, temperature K, pressure Pa, density kg/m^3
        let table = [
            (0.0, 288.15, 101_325.0, 1.2250),
            (5_000.0, 255.65, 54_048.0, 0.7364),
            (11_000.0, 216.65, 22_632.0, 0.3639),
            (25_000.0, 221.65, 2_511.0, 0.03947),
        ];
        for (h, t, p, rho) in table {
            let a = isa(h);
            assert!((a.temperature - t).abs() < 0.05, "T at {h}: {}", a.temperature);
            assert!((a.pressure / p - 1.0).abs() < 2e-3, "p at {h}: {}", a.pressure);
            assert!((a.density / rho - 1.0).abs() < 3e-3, "rho at {h}: {}", a.density);
        }
        assert!((isa(0.0).sound_speed - 340.29).abs() < 0.05);
    }

    #[test]
    fn layers_join_continuously() {
        for boundary in [11_000.0, 20_000.0, 32_000.0, 47_000.0, 51_000.0, 71_000.0] {
            let (lo, hi) = (isa(boundary - 1e-3), isa(boundary + 1e-3));
            assert!((lo.pressure / hi.pressure - 1.0).abs() < 1e-3, "pressure jump at {boundary}");
            assert!((lo.temperature - hi.temperature).abs() < 0.01, "temperature jump at {boundary}");
        }
    }

    #[test]
    fn trial_states_below_ground_see_denser_air() {
        let (below, at) = (isa(-10.0), isa(0.0));
        assert!(below.pressure > at.pressure && below.pressure - at.pressure < 200.0);
        assert!(below.density > at.density);
        assert!(isa(-1e6).is_finite());
    }

    #[test]
    fn thin_air_above_86km() {
        let a = isa(120_000.0);
        assert!(a.is_finite());
        assert!(a.density > 0.0 && a.density < 1e-5);
    }

    #[test]
    fn pressure_altitude_inverts_troposphere() {
        for h in [0.0, 250.0, 1_500.0, 8_000.0] {
            let p = isa(h).pressure;
            assert!((pressure_altitude(p) - h).abs() < 1e-6, "h={h}");
        }
    }

    #[test]
    fn wind_profile_is_evaluated_above_ground() {
        let env = StandardAtmosphere::new()
            .elevation(1_400.0)
            .wind_profile(Curve::table(&[(0.0, 2.0), (1_000.0, 12.0)]).unwrap(), Curve::Constant(0.0));
        let a = env.atmosphere(1_900.0, 0.0);
        assert!((a.wind.x - 7.0).abs() < 1e-9);
        assert_eq!(a.pressure, isa(1_900.0).pressure);
    }
}
