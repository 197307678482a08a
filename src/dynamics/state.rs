use nalgebra::{Quaternion, SVector, UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665; // standard gravity, m/s^2
pub const EARTH_RADIUS: f64 = 6_371_000.0; // mean Earth radius, m

/// Quaternion norm drift removed after every accepted step.
pub const QUAT_RENORM_TOL: f64 = 1e-12;
/// Quaternion norm drift treated as a broken integration.
pub const QUAT_FATAL_TOL: f64 = 1e-3;

/// Flat 13-element state used by the integrator:
/// `[x, y, z, vx, vy, vz, e0, e1, e2, e3, w1, w2, w3]`.
pub type StateVector = SVector<f64, 13>;

// ---------------------------------------------------------------------------
// 6DOF rigid-body state
// ---------------------------------------------------------------------------

/// Rigid-body state at a single instant.
///
/// Frame: launch-fixed East-North-Up, origin at the rail base, so `pos.z`
/// is the altitude above ground level. The quaternion rotates body vectors
/// into the inertial frame and is kept raw (not `UnitQuaternion`) so that
/// integration drift stays observable.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub time: f64,
    pub pos: Vector3<f64>,   // m, inertial ENU
    pub vel: Vector3<f64>,   // m/s, inertial
    pub quat: Quaternion<f64>, // body→inertial, scalar first (e0 = w)
    pub omega: Vector3<f64>, // rad/s, body frame
}

impl State {
    /// State at rest at the origin with the given attitude.
    pub fn at_rest(time: f64, attitude: UnitQuaternion<f64>) -> Self {
        Self {
            time,
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            quat: attitude.into_inner(),
            omega: Vector3::zeros(),
        }
    }

    pub fn to_vector(&self) -> StateVector {
        let q = &self.quat;
        StateVector::from_column_slice(&[
            self.pos.x, self.pos.y, self.pos.z,
            self.vel.x, self.vel.y, self.vel.z,
            q.w, q.i, q.j, q.k,
            self.omega.x, self.omega.y, self.omega.z,
        ])
    }

    pub fn from_vector(time: f64, y: &StateVector) -> Self {
        Self {
            time,
            pos: Vector3::new(y[0], y[1], y[2]),
            vel: Vector3::new(y[3], y[4], y[5]),
            quat: Quaternion::new(y[6], y[7], y[8], y[9]),
            omega: Vector3::new(y[10], y[11], y[12]),
        }
    }

    /// Normalized attitude. Falls back to identity for a degenerate quaternion.
    pub fn attitude(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::try_new(self.quat, f64::EPSILON).unwrap_or_else(UnitQuaternion::identity)
    }

    pub fn quat_norm(&self) -> f64 {
        self.quat.norm()
    }

    /// Rescale the quaternion to unit norm when its drift exceeds `tol`.
    /// Returns true when a correction was applied.
    pub fn renormalize(&mut self, tol: f64) -> bool {
        let norm = self.quat.norm();
        if (norm - 1.0).abs() > tol && norm > 0.0 {
            self.quat /= norm;
            true
        } else {
            false
        }
    }

    /// Rocket longitudinal axis (body +Z) in the inertial frame.
    pub fn body_z(&self) -> Vector3<f64> {
        self.attitude() * Vector3::z()
    }

    /// Altitude above ground level, m.
    pub fn altitude(&self) -> f64 {
        self.pos.z
    }

    pub fn speed(&self) -> f64 {
        self.vel.norm()
    }

    /// Pitch angle of the rocket axis above the local horizontal (rad).
    pub fn pitch(&self) -> f64 {
        self.body_z().z.clamp(-1.0, 1.0).asin()
    }
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Deriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
    pub dquat: Quaternion<f64>, // raw quaternion derivative, not unit
    pub domega: Vector3<f64>,   // angular acceleration, body frame
}

impl Deriv {
    pub fn to_vector(&self) -> StateVector {
        let q = &self.dquat;
        StateVector::from_column_slice(&[
            self.dpos.x, self.dpos.y, self.dpos.z,
            self.dvel.x, self.dvel.y, self.dvel.z,
            q.w, q.i, q.j, q.k,
            self.domega.x, self.domega.y, self.domega.z,
        ])
    }
}
