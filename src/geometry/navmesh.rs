use crate::geometry::Polygon;
use crate::math::DVec3;

/// Walkable ground made of polygons.
///
/// Objects attached to a navmesh are snapped onto the nearest face, where
/// nearness mostly ignores height so that objects follow slopes.
#[derive(Debug, Clone, PartialEq)]
pub struct NavMesh {
    faces: Vec<Polygon>,
    /// Maximum height an object may climb in one update, in meters
    pub max_step: f64,
    /// Height offset added after snapping
    pub zshift: f64,
}

impl NavMesh {
    pub fn new(faces: Vec<Polygon>) -> Self {
        Self {
            faces,
            max_step: 0.5,
            zshift: 0.0,
        }
    }

    pub fn max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn zshift(mut self, zshift: f64) -> Self {
        self.zshift = zshift;
        self
    }

    pub fn faces(&self) -> &[Polygon] {
        &self.faces
    }

    /// Returns `p` projected onto the nearest reachable face.
    pub fn update_pos(&self, p: DVec3) -> DVec3 {
        let Some(first) = self.faces.first() else {
            return p;
        };
        let mut best = first.nearest(p).point;
        let mut best_dist = ground_metric(best - p);
        for face in &self.faces[1..] {
            let candidate = face.nearest(p).point;
            let dist = ground_metric(candidate - p);
            if dist < best_dist && candidate.z - p.z <= self.max_step {
                best = candidate;
                best_dist = dist;
            }
        }
        best + DVec3::new(0.0, 0.0, self.zshift)
    }
}

fn ground_metric(d: DVec3) -> f64 {
    d.x * d.x + d.y * d.y + 1e-3 * d.z * d.z
}
