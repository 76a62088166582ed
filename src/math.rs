//! Math types for acoustica
//!
//! Positions are `glam::DVec3` in meters. Orientations are ZYX Euler
//! triples; rotating a vector applies the z rotation first, then y, then x,
//! and derotating applies the exact inverse in reverse order.

pub use glam::DVec3;

use std::ops::{Add, AddAssign, Sub};

pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

/// ZYX Euler orientation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Euler {
    /// Rotation around the z axis (yaw)
    pub z: f64,
    /// Rotation around the y axis (pitch)
    pub y: f64,
    /// Rotation around the x axis (roll)
    pub x: f64,
}

impl Euler {
    pub const ZERO: Self = Self {
        z: 0.0,
        y: 0.0,
        x: 0.0,
    };

    pub fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }

    pub fn from_degrees(z: f64, y: f64, x: f64) -> Self {
        Self::new(z * DEG2RAD, y * DEG2RAD, x * DEG2RAD)
    }

    /// Rotate `v` into the frame described by this orientation.
    pub fn rotate(&self, v: DVec3) -> DVec3 {
        rot_x(rot_y(rot_z(v, self.z), self.y), self.x)
    }

    /// Inverse of [`Euler::rotate`].
    pub fn derotate(&self, v: DVec3) -> DVec3 {
        rot_z(rot_y(rot_x(v, -self.x), -self.y), -self.z)
    }

    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.z * s, self.y * s, self.x * s)
    }

    pub fn is_finite(&self) -> bool {
        self.z.is_finite() && self.y.is_finite() && self.x.is_finite()
    }
}

impl Add for Euler {
    type Output = Euler;

    fn add(self, rhs: Euler) -> Euler {
        Euler::new(self.z + rhs.z, self.y + rhs.y, self.x + rhs.x)
    }
}

impl AddAssign for Euler {
    fn add_assign(&mut self, rhs: Euler) {
        *self = *self + rhs;
    }
}

impl Sub for Euler {
    type Output = Euler;

    fn sub(self, rhs: Euler) -> Euler {
        Euler::new(self.z - rhs.z, self.y - rhs.y, self.x - rhs.x)
    }
}

pub(crate) fn rot_z(v: DVec3, a: f64) -> DVec3 {
    if a == 0.0 {
        return v;
    }
    let (s, c) = a.sin_cos();
    DVec3::new(c * v.x - s * v.y, c * v.y + s * v.x, v.z)
}

pub(crate) fn rot_y(v: DVec3, a: f64) -> DVec3 {
    if a == 0.0 {
        return v;
    }
    let (s, c) = a.sin_cos();
    DVec3::new(c * v.x + s * v.z, v.y, c * v.z - s * v.x)
}

pub(crate) fn rot_x(v: DVec3, a: f64) -> DVec3 {
    if a == 0.0 {
        return v;
    }
    let (s, c) = a.sin_cos();
    DVec3::new(v.x, c * v.y - s * v.z, c * v.z + s * v.y)
}

/// Azimuth in the xy plane, counter-clockwise from +x.
pub fn azimuth(v: DVec3) -> f64 {
    v.y.atan2(v.x)
}

/// Elevation above the xy plane.
pub fn elevation(v: DVec3) -> f64 {
    v.z.atan2(v.x.hypot(v.y))
}

/// Builds a cartesian vector from radius, azimuth and elevation (radians).
pub fn from_spherical(r: f64, az: f64, el: f64) -> DVec3 {
    let (sa, ca) = az.sin_cos();
    let (se, ce) = el.sin_cos();
    DVec3::new(r * ca * ce, r * sa * ce, r * se)
}

/// Unit vector of `v`, or zero when `v` has no length.
pub fn unit(v: DVec3) -> DVec3 {
    v.normalize_or_zero()
}

/// Position and orientation of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: DVec3,
    pub orientation: Euler,
}

impl Pose {
    pub fn new(position: DVec3, orientation: Euler) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            orientation: Euler::ZERO,
        }
    }

    /// Position of `p` in the local frame of this pose.
    pub fn relative(&self, p: DVec3) -> DVec3 {
        self.orientation.derotate(p - self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_rotate_derotate_roundtrip() {
        let o = Euler::new(0.3, -0.7, 1.1);
        let v = DVec3::new(1.0, 2.0, -3.0);
        assert!(close(o.derotate(o.rotate(v)), v));
        assert!(close(o.rotate(o.derotate(v)), v));
    }

    #[test]
    fn test_yaw_rotates_counter_clockwise() {
        let o = Euler::from_degrees(90.0, 0.0, 0.0);
        assert!(close(o.rotate(DVec3::X), DVec3::Y));
        assert!(close(o.derotate(DVec3::Y), DVec3::X));
    }

    #[test]
    fn test_composition_order_is_zyx() {
        let o = Euler::from_degrees(90.0, 90.0, 0.0);
        // z first maps x to y, y rotation leaves y untouched
        assert!(close(o.rotate(DVec3::X), DVec3::Y));
    }

    #[test]
    fn test_spherical() {
        let v = from_spherical(2.0, 90.0 * DEG2RAD, 0.0);
        assert!(close(v, DVec3::new(0.0, 2.0, 0.0)));
        assert!((azimuth(v) - 90.0 * DEG2RAD).abs() < 1e-12);
        assert!(elevation(DVec3::new(1.0, 0.0, 1.0)) - 45.0 * DEG2RAD < 1e-12);
    }

    #[test]
    fn test_pose_relative() {
        let pose = Pose::new(DVec3::new(1.0, 0.0, 0.0), Euler::from_degrees(90.0, 0.0, 0.0));
        let rel = pose.relative(DVec3::new(1.0, 1.0, 0.0));
        assert!(close(rel, DVec3::X));
    }
}
