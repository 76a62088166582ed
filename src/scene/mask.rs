use super::DynamicObject;
use crate::geometry::{Shoebox, raised_cosine};
use crate::math::DVec3;

/// Box-shaped region that attenuates receivers depending on where they are.
///
/// An outer mask passes receivers inside the box and fades them out over
/// `falloff` meters outside of it. An inner mask does the opposite.
#[derive(Debug, Clone)]
pub struct Mask {
    pub object: DynamicObject,
    pub size: DVec3,
    pub falloff: f64,
    pub inner: bool,
    pub active: bool,
}

impl Mask {
    pub fn new(object: DynamicObject, size: DVec3) -> Self {
        Self {
            object,
            size,
            falloff: 1.0,
            inner: false,
            active: true,
        }
    }

    pub fn falloff(mut self, falloff: f64) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn inner(mut self, inner: bool) -> Self {
        self.inner = inner;
        self
    }

    pub fn shoebox(&self) -> Shoebox {
        Shoebox::new(self.object.position(), self.size, self.object.orientation())
    }

    /// Mask gain at world position `p`.
    pub fn gain(&self, p: DVec3) -> f64 {
        let g = raised_cosine(self.shoebox().distance(p), self.falloff);
        if self.inner { 1.0 - g } else { g }
    }

    pub fn is_active(&self) -> bool {
        self.active && self.object.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Euler;

    fn mask(inner: bool) -> Mask {
        Mask::new(
            DynamicObject::fixed("room", DVec3::ZERO, Euler::ZERO),
            DVec3::splat(2.0),
        )
        .falloff(2.0)
        .inner(inner)
    }

    #[test]
    fn test_outer_mask_gain() {
        let m = mask(false);
        assert_eq!(m.gain(DVec3::ZERO), 1.0);
        assert!((m.gain(DVec3::new(2.0, 0.0, 0.0)) - 0.5).abs() < 1e-12);
        assert!(m.gain(DVec3::new(4.0, 0.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_inner_mask_is_complement() {
        let m = mask(true);
        for x in [0.0, 1.5, 2.5, 10.0] {
            let p = DVec3::new(x, 0.0, 0.0);
            assert!((m.gain(p) + mask(false).gain(p) - 1.0).abs() < 1e-12);
        }
    }
}
