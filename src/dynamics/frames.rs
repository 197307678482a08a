//! Conversions between the inertial (launch-fixed ENU), body and wind frames.
//!
//! Body frame: +Z along the rocket axis toward the nose, X/Y transverse.
//! Wind frame quantities are expressed through the air-relative velocity
//! seen in body axes, from which the angle of attack follows.

use nalgebra::{UnitQuaternion, Vector3};

/// Rotate a body-frame vector into the inertial frame.
pub fn body_to_inertial(attitude: &UnitQuaternion<f64>, v_body: &Vector3<f64>) -> Vector3<f64> {
    attitude * v_body
}

/// Rotate an inertial-frame vector into the body frame.
pub fn inertial_to_body(attitude: &UnitQuaternion<f64>, v_inertial: &Vector3<f64>) -> Vector3<f64> {
    attitude.inverse_transform_vector(v_inertial)
}

/// Attitude of a rocket sitting on a rail.
///
/// `inclination` is the rail elevation above the horizon (π/2 = vertical),
/// `heading` the azimuth measured clockwise from North.
pub fn rail_attitude(inclination: f64, heading: f64) -> UnitQuaternion<f64> {
    let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -(std::f64::consts::FRAC_PI_2 - inclination));
    let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -heading);
    turn * tilt
}

/// Unit vector along a rail with the given inclination and heading.
pub fn rail_direction(inclination: f64, heading: f64) -> Vector3<f64> {
    Vector3::new(
        inclination.cos() * heading.sin(),
        inclination.cos() * heading.cos(),
        inclination.sin(),
    )
}

/// Air-relative velocity of the rocket expressed in body axes.
pub fn air_velocity_body(
    attitude: &UnitQuaternion<f64>,
    vel: &Vector3<f64>,
    wind: &Vector3<f64>,
) -> Vector3<f64> {
    inertial_to_body(attitude, &(vel - wind))
}

/// Total angle of attack (rad): angle between the body axis and the
/// air-relative velocity. Zero when the rocket is not moving through air.
pub fn angle_of_attack(v_air_body: &Vector3<f64>) -> f64 {
    let speed = v_air_body.norm();
    if speed < 1e-9 {
        return 0.0;
    }
    (v_air_body.z / speed).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn vertical_rail_is_identity() {
        let q = rail_attitude(FRAC_PI_2, 0.0);
        assert!(q.angle() < 1e-12);
    }

    #[test]
    fn rail_attitude_points_body_z_along_rail() {
        let incl = 80f64.to_radians();
        let heading = 90f64.to_radians();
        let q = rail_attitude(incl, heading);
        let axis = body_to_inertial(&q, &Vector3::z());
        let dir = rail_direction(incl, heading);
        assert_relative_eq!(axis, dir, epsilon = 1e-12);
        assert!(dir.x > 0.0, "heading 90 deg tilts toward East");
    }

    #[test]
    fn body_inertial_round_trip() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        let v = Vector3::new(1.0, -2.0, 3.0);
        let back = inertial_to_body(&q, &body_to_inertial(&q, &v));
        assert_relative_eq!(back, v, epsilon = 1e-12);
    }

    #[test]
    fn crosswind_creates_angle_of_attack() {
        let q = UnitQuaternion::identity();
        let vel = Vector3::new(0.0, 0.0, 100.0);
        let wind = Vector3::new(10.0, 0.0, 0.0);
        let v_air = air_velocity_body(&q, &vel, &wind);
        let alpha = angle_of_attack(&v_air);
        assert_relative_eq!(alpha, (10.0f64 / 100.0).atan(), epsilon = 1e-12);
    }

    #[test]
    fn no_angle_of_attack_at_rest() {
        assert_eq!(angle_of_attack(&Vector3::zeros()), 0.0);
    }
}
