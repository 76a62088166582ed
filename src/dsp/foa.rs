use crate::math::{DVec3, Euler};
use glam::{Mat3, Vec3};

/// First-order ambisonic block with channels W, X, Y and Z.
#[derive(Debug, Clone, PartialEq)]
pub struct FoaChunk {
    pub w: Vec<f32>,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl FoaChunk {
    pub fn new(frames: usize) -> Self {
        Self {
            w: vec![0.0; frames],
            x: vec![0.0; frames],
            y: vec![0.0; frames],
            z: vec![0.0; frames],
        }
    }

    pub fn len(&self) -> usize {
        self.w.len()
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    pub fn channels(&self) -> [&[f32]; 4] {
        [&self.w, &self.x, &self.y, &self.z]
    }

    pub fn channels_mut(&mut self) -> [&mut Vec<f32>; 4] {
        [&mut self.w, &mut self.x, &mut self.y, &mut self.z]
    }

    pub fn clear(&mut self) {
        for ch in self.channels_mut() {
            ch.fill(0.0);
        }
    }

    pub fn copy_from(&mut self, other: &FoaChunk) {
        for (dst, src) in self.channels_mut().into_iter().zip(other.channels()) {
            dst.copy_from_slice(src);
        }
    }

    pub fn add_scaled(&mut self, other: &FoaChunk, gain: f32) {
        for (dst, src) in self.channels_mut().into_iter().zip(other.channels()) {
            super::mix_into(dst, src, gain);
        }
    }

    pub fn scale(&mut self, gain: f32) {
        for ch in self.channels_mut() {
            for v in ch.iter_mut() {
                *v *= gain;
            }
        }
    }

    /// Applies `rotation` to the directional components in place.
    pub fn rotate(&mut self, rotation: &FoaRotation) {
        for k in 0..self.w.len() {
            let v = rotation.matrix * Vec3::new(self.x[k], self.y[k], self.z[k]);
            self.x[k] = v.x;
            self.y[k] = v.y;
            self.z[k] = v.z;
        }
    }

    pub fn sanitize(&mut self) {
        for ch in self.channels_mut() {
            super::sanitize(ch);
        }
    }
}

/// Rotation of the first-order directional components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoaRotation {
    matrix: Mat3,
}

impl FoaRotation {
    /// Rotates the sound field from the object frame into the world frame.
    pub fn rotate(orientation: &Euler) -> Self {
        Self::from_fn(|v| orientation.rotate(v))
    }

    /// Rotates the sound field from the world frame into the object frame.
    pub fn derotate(orientation: &Euler) -> Self {
        Self::from_fn(|v| orientation.derotate(v))
    }

    fn from_fn(f: impl Fn(DVec3) -> DVec3) -> Self {
        Self {
            matrix: Mat3::from_cols(
                f(DVec3::X).as_vec3(),
                f(DVec3::Y).as_vec3(),
                f(DVec3::Z).as_vec3(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_moves_x_to_y() {
        let mut chunk = FoaChunk::new(2);
        chunk.x.fill(1.0);
        chunk.rotate(&FoaRotation::rotate(&Euler::from_degrees(90.0, 0.0, 0.0)));
        assert!(chunk.x[0].abs() < 1e-6);
        assert!((chunk.y[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_derotate_inverts_rotate() {
        let o = Euler::new(0.4, 0.2, -0.3);
        let mut chunk = FoaChunk::new(1);
        chunk.x[0] = 0.3;
        chunk.y[0] = -0.5;
        chunk.z[0] = 0.8;
        let original = chunk.clone();
        chunk.rotate(&FoaRotation::rotate(&o));
        chunk.rotate(&FoaRotation::derotate(&o));
        assert!((chunk.x[0] - original.x[0]).abs() < 1e-5);
        assert!((chunk.z[0] - original.z[0]).abs() < 1e-5);
    }

    #[test]
    fn test_add_scaled() {
        let mut a = FoaChunk::new(3);
        let mut b = FoaChunk::new(3);
        b.w.fill(2.0);
        a.add_scaled(&b, 0.5);
        assert_eq!(a.w, vec![1.0; 3]);
    }
}
