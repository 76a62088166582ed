use crate::math::{DVec3, Euler};

/// An oriented box described by center, edge lengths and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shoebox {
    pub center: DVec3,
    pub size: DVec3,
    pub orientation: Euler,
}

impl Shoebox {
    pub fn new(center: DVec3, size: DVec3, orientation: Euler) -> Self {
        Self {
            center,
            size,
            orientation,
        }
    }

    /// Offset from the nearest point of the box to `p`, in box coordinates.
    ///
    /// The result is zero when `p` is inside the box, so its length is the
    /// distance from `p` to the box.
    pub fn nextpoint(&self, p: DVec3) -> DVec3 {
        let prel = self.orientation.derotate(p - self.center);
        let half = 0.5 * self.size;
        DVec3::new(
            axis_excess(prel.x, half.x),
            axis_excess(prel.y, half.y),
            axis_excess(prel.z, half.z),
        )
    }

    pub fn distance(&self, p: DVec3) -> f64 {
        self.nextpoint(p).length()
    }

    pub fn volume(&self) -> f64 {
        self.size.x * self.size.y * self.size.z
    }

    pub fn has_volume(&self) -> bool {
        self.volume() > 0.0
    }
}

fn axis_excess(x: f64, half: f64) -> f64 {
    if x > 0.0 {
        (x - half).max(0.0)
    } else {
        (x + half).min(0.0)
    }
}

/// Raised-cosine falloff from 1 at distance 0 to 0 at distance `falloff`.
///
/// A non-positive falloff yields a hard edge: 1 at distance 0, else 0.
pub fn raised_cosine(distance: f64, falloff: f64) -> f64 {
    if falloff <= 0.0 {
        return if distance > 0.0 { 0.0 } else { 1.0 };
    }
    0.5 + 0.5 * (std::f64::consts::PI * (distance / falloff).min(1.0)).cos()
}
