use std::fmt;

use nalgebra::Vector3;

use crate::physics::curve::Curve;

// ---------------------------------------------------------------------------
// Aerodynamic coefficient collaborator
// ---------------------------------------------------------------------------

/// Coefficients at one flight condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeroCoefficients {
    /// Drag coefficient along the air-relative velocity.
    pub cd: f64,
    /// Normal (lift) force coefficient at the current angle of attack.
    pub cl: f64,
    /// Centre-of-pressure station along the rocket axis, m from the tail datum.
    pub cp: f64,
    /// Pitch/yaw damping coefficient (per nondimensional rate ω·d/2V).
    pub cm_damping: f64,
}

impl AeroCoefficients {
    pub fn is_finite(&self) -> bool {
        self.cd.is_finite() && self.cl.is_finite() && self.cp.is_finite() && self.cm_damping.is_finite()
    }
}

/// Rocket aerodynamic model.
///
/// Lookups outside the tabulated Mach range hold the last value: trial
/// integrator states routinely wander outside the nominal envelope.
pub trait Aerodynamics: fmt::Debug + Send + Sync {
    fn coefficients(&self, mach: f64, alpha: f64) -> AeroCoefficients;
}

/// Same coefficients at every flight condition, with a linear normal force slope.
#[derive(Debug, Clone, Copy)]
pub struct ConstantAero {
    pub cd: f64,
    pub cn_alpha: f64, // per rad
    pub cp: f64,
    pub cm_damping: f64,
}

impl ConstantAero {
    /// No aerodynamic forces at all (vacuum or drag-free studies).
    pub fn none() -> Self {
        Self { cd: 0.0, cn_alpha: 0.0, cp: 0.0, cm_damping: 0.0 }
    }
}

impl Aerodynamics for ConstantAero {
    fn coefficients(&self, _mach: f64, alpha: f64) -> AeroCoefficients {
        AeroCoefficients {
            cd: self.cd,
            cl: self.cn_alpha * alpha.sin(),
            cp: self.cp,
            cm_damping: self.cm_damping,
        }
    }
}

/// Mach-dependent drag, normal-force slope and centre of pressure.
#[derive(Debug, Clone)]
pub struct TabulatedAero {
    pub cd: Curve,
    pub cn_alpha: Curve,
    pub cp: Curve,
    pub cm_damping: f64,
}

impl Aerodynamics for TabulatedAero {
    fn coefficients(&self, mach: f64, alpha: f64) -> AeroCoefficients {
        AeroCoefficients {
            cd: self.cd.eval(mach),
            cl: self.cn_alpha.eval(mach) * alpha.sin(),
            cp: self.cp.eval(mach),
            cm_damping: self.cm_damping,
        }
    }
}

// ---------------------------------------------------------------------------
// Force and moment from coefficients (body frame)
// ---------------------------------------------------------------------------

/// Aerodynamic force in body axes.
///
/// Drag acts against the air-relative velocity; the normal force acts
/// against its lateral component.
pub fn aero_force(v_air_body: &Vector3<f64>, q_dyn: f64, area: f64, coeffs: &AeroCoefficients) -> Vector3<f64> {
    let speed = v_air_body.norm();
    if speed < 1e-6 {
        return Vector3::zeros();
    }
    let drag = -v_air_body / speed * (q_dyn * area * coeffs.cd);

    let lateral = Vector3::new(v_air_body.x, v_air_body.y, 0.0);
    let lat_norm = lateral.norm();
    let normal = if lat_norm > 1e-9 {
        -lateral / lat_norm * (q_dyn * area * coeffs.cl.abs())
    } else {
        Vector3::zeros()
    };

    drag + normal
}

/// Restoring moment of the normal force applied at the centre of pressure.
///
/// `cg` and `coeffs.cp` are stations along the body axis; a CP aft of the CG
/// turns the nose into the air-relative velocity.
pub fn restoring_moment(
    v_air_body: &Vector3<f64>,
    q_dyn: f64,
    area: f64,
    cg: f64,
    coeffs: &AeroCoefficients,
) -> Vector3<f64> {
    let lateral = Vector3::new(v_air_body.x, v_air_body.y, 0.0);
    let lat_norm = lateral.norm();
    if lat_norm < 1e-9 {
        return Vector3::zeros();
    }
    let normal = -lateral / lat_norm * (q_dyn * area * coeffs.cl.abs());
    let arm = Vector3::new(0.0, 0.0, coeffs.cp - cg);
    arm.cross(&normal)
}

/// Pitch and yaw damping moment opposing transverse body rates.
pub fn damping_moment(
    omega: &Vector3<f64>,
    speed: f64,
    q_dyn: f64,
    area: f64,
    diameter: f64,
    coeffs: &AeroCoefficients,
) -> Vector3<f64> {
    if speed <= 1.0 {
        return Vector3::zeros();
    }
    let scale = q_dyn * area * diameter * coeffs.cm_damping * diameter / (2.0 * speed);
    Vector3::new(-omega.x * scale, -omega.y * scale, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coeffs() -> AeroCoefficients {
        ConstantAero { cd: 0.4, cn_alpha: 2.0, cp: 0.8, cm_damping: 1.0 }.coefficients(0.5, 0.1)
    }

    #[test]
    fn drag_opposes_airflow() {
        let v = Vector3::new(0.0, 0.0, 300.0);
        let f = aero_force(&v, 1000.0, 0.01, &coeffs());
        assert!(f.z < 0.0, "Drag should oppose upward velocity");
        assert!(f.x.abs() < 1e-12);
    }

    #[test]
    fn no_force_at_rest() {
        let f = aero_force(&Vector3::zeros(), 0.0, 0.01, &coeffs());
        assert!(f.norm() < 1e-12);
    }

    #[test]
    fn restoring_moment_zero_at_zero_aoa() {
        let v = Vector3::new(0.0, 0.0, 300.0);
        let m = restoring_moment(&v, 1000.0, 0.01, 1.2, &coeffs());
        assert!(m.norm() < 1e-12);
    }

    #[test]
    fn stable_rocket_weathercocks_into_airflow() {
        // Moving toward +x relative to the air with CP behind CG:
        // the moment about +y turns the nose toward +x.
        let v = Vector3::new(10.0, 0.0, 100.0);
        let m = restoring_moment(&v, 1000.0, 0.01, 1.2, &coeffs());
        assert!(m.y > 0.0, "got {m:?}");
    }

    #[test]
    fn damping_opposes_rates() {
        let m = damping_moment(&Vector3::new(1.0, -2.0, 5.0), 100.0, 1000.0, 0.01, 0.1, &coeffs());
        assert!(m.x < 0.0 && m.y > 0.0);
        assert_eq!(m.z, 0.0, "no roll damping");
    }

    #[test]
    fn tabulated_holds_last_mach_value() {
        let aero = TabulatedAero {
            cd: Curve::table(&[(0.0, 0.4), (1.0, 0.7), (2.0, 0.5)]).unwrap(),
            cn_alpha: Curve::Constant(2.0),
            cp: Curve::Constant(0.5),
            cm_damping: 0.0,
        };
        assert_eq!(aero.coefficients(8.0, 0.0).cd, 0.5);
        assert!((aero.coefficients(0.5, 0.0).cd - 0.55).abs() < 1e-12);
    }
}
