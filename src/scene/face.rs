//! Polygonal scene surfaces: reflectors and obstacles.

use super::DynamicObject;
use crate::geometry::Polygon;

/// Reflecting polygon. Sound arriving from the side its normal points to
/// creates image sources.
#[derive(Debug, Clone)]
pub struct Reflector {
    pub object: DynamicObject,
    /// Vertices in object coordinates; world coordinates follow the object
    pub polygon: Polygon,
    pub reflectivity: f64,
    pub damping: f64,
    pub active: bool,
    /// Keep image sources audible around the edges of the polygon
    pub edge_reflection: bool,
}

impl Reflector {
    pub fn new(object: DynamicObject, polygon: Polygon) -> Self {
        let mut reflector = Self {
            object,
            polygon,
            reflectivity: 1.0,
            damping: 0.0,
            active: true,
            edge_reflection: true,
        };
        reflector.update_polygon();
        reflector
    }

    pub fn reflectivity(mut self, reflectivity: f64) -> Self {
        self.reflectivity = reflectivity;
        self
    }

    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn edge_reflection(mut self, enabled: bool) -> Self {
        self.edge_reflection = enabled;
        self
    }

    pub fn geometry_update(&mut self, t: f64) {
        self.object.geometry_update(t);
        self.update_polygon();
    }

    fn update_polygon(&mut self) {
        self.polygon
            .apply_rot_loc(self.object.position(), self.object.orientation());
    }

    /// Whether image sources of this reflector are rendered.
    pub fn is_active(&self) -> bool {
        self.active && self.object.is_active()
    }

    /// Applies the reflection filter to `audio`; `state` carries the filter
    /// memory of one sound path.
    ///
    /// `y[n] = damping * y[n-1] + reflectivity * (1 - damping) * x[n]`
    pub fn apply_reflection_filter(&self, audio: &mut [f32], state: &mut f64) {
        let c1 = self.reflectivity * (1.0 - self.damping);
        for x in audio.iter_mut() {
            *state = crate::dsp::friendly_f64(*state * self.damping + *x as f64 * c1);
            *x = *state as f32;
        }
    }
}

/// Diffracting polygon between sources and receivers.
///
/// An inner obstacle blocks paths crossing the polygon itself; an outer one
/// is an infinite wall with the polygon as opening.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub object: DynamicObject,
    pub polygon: Polygon,
    pub inner: bool,
    /// Fraction of the unfiltered signal passing through
    pub transmission: f64,
    /// Overrides the polygon's aperture when positive
    pub manual_aperture: f64,
    pub active: bool,
}

impl Obstacle {
    pub fn new(object: DynamicObject, polygon: Polygon) -> Self {
        let mut obstacle = Self {
            object,
            polygon,
            inner: true,
            transmission: 0.0,
            manual_aperture: 0.0,
            active: true,
        };
        obstacle.update_polygon();
        obstacle
    }

    pub fn inner(mut self, inner: bool) -> Self {
        self.inner = inner;
        self
    }

    pub fn transmission(mut self, transmission: f64) -> Self {
        self.transmission = transmission;
        self
    }

    pub fn aperture(mut self, aperture: f64) -> Self {
        self.manual_aperture = aperture;
        self
    }

    pub fn geometry_update(&mut self, t: f64) {
        self.object.geometry_update(t);
        self.update_polygon();
    }

    fn update_polygon(&mut self) {
        self.polygon
            .apply_rot_loc(self.object.position(), self.object.orientation());
    }

    pub fn is_active(&self) -> bool {
        self.active && self.object.is_active()
    }

    /// Effective aperture used by the diffraction filter.
    pub fn effective_aperture(&self) -> f64 {
        if self.manual_aperture > 0.0 {
            self.manual_aperture
        } else {
            self.polygon.aperture()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{DVec3, Euler};

    #[test]
    fn test_reflector_follows_object() {
        let object = DynamicObject::fixed("wall", DVec3::new(3.0, 0.0, 0.0), Euler::ZERO);
        let reflector = Reflector::new(object, Polygon::rectangle(2.0, 2.0));
        // the rectangle spans y and z from its corner at the object position
        assert!((reflector.polygon.centroid() - DVec3::new(3.0, 1.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn test_reflection_filter_gain() {
        let object = DynamicObject::fixed("wall", DVec3::ZERO, Euler::ZERO);
        let reflector = Reflector::new(object, Polygon::rectangle(1.0, 1.0))
            .reflectivity(0.5)
            .damping(0.0);
        let mut audio = [1.0f32, 1.0, 1.0];
        let mut state = 0.0;
        reflector.apply_reflection_filter(&mut audio, &mut state);
        assert_eq!(audio, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_damping_is_low_pass() {
        let object = DynamicObject::fixed("wall", DVec3::ZERO, Euler::ZERO);
        let reflector = Reflector::new(object, Polygon::rectangle(1.0, 1.0)).damping(0.5);
        let mut audio = vec![1.0f32; 64];
        let mut state = 0.0;
        reflector.apply_reflection_filter(&mut audio, &mut state);
        assert_eq!(audio[0], 0.5);
        assert!((audio[63] - 1.0).abs() < 1e-6);
    }
}
