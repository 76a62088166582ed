//! Convex planar polygons used for reflectors, obstacles and navigation meshes.

use crate::error::{AcousticaError, Result};
use crate::math::{DVec3, Euler};

/// A planar polygon with cached world-space vertices, edges and normals.
///
/// Vertices are given in the object's local frame and transformed with
/// [`Polygon::apply_rot_loc`]. The face normal follows the right-hand rule
/// over the vertex order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    local_verts: Vec<DVec3>,
    verts: Vec<DVec3>,
    edges: Vec<DVec3>,
    edge_normals: Vec<DVec3>,
    normal: DVec3,
    area: f64,
    aperture: f64,
}

/// Result of a nearest-point query against a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    /// Nearest point on the (limited) polygon surface
    pub point: DVec3,
    /// True if the query point projects outside the polygon boundary
    pub outside: bool,
    /// Nearest point on the polygon boundary
    pub on_edge: DVec3,
}

impl Polygon {
    /// Creates a polygon from local vertices.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if fewer than three vertices are given.
    pub fn new(local_verts: Vec<DVec3>) -> Result<Self> {
        if local_verts.len() < 3 {
            return Err(AcousticaError::Configuration(
                "A polygon needs at least three vertices.".into(),
            ));
        }
        Ok(Self::build(local_verts))
    }

    /// Rectangle in the yz plane facing +x, with its lower left corner at the origin.
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::build(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(0.0, width, 0.0),
            DVec3::new(0.0, width, height),
            DVec3::new(0.0, 0.0, height),
        ])
    }

    fn build(local_verts: Vec<DVec3>) -> Self {
        let n = local_verts.len();
        let mut polygon = Self {
            verts: local_verts.clone(),
            local_verts,
            edges: vec![DVec3::ZERO; n],
            edge_normals: vec![DVec3::ZERO; n],
            normal: DVec3::ZERO,
            area: 0.0,
            aperture: 0.0,
        };
        polygon.update();
        polygon
    }

    /// Places the polygon: local vertices are rotated by `orientation`, then
    /// translated by `origin`.
    pub fn apply_rot_loc(&mut self, origin: DVec3, orientation: Euler) {
        for (vert, local) in self.verts.iter_mut().zip(&self.local_verts) {
            *vert = orientation.rotate(*local) + origin;
        }
        self.update();
    }

    fn update(&mut self) {
        let n = self.verts.len();
        let mut rot = DVec3::ZERO;
        for k in 0..n {
            let prev = self.verts[(k + n - 1) % n];
            let next = self.verts[(k + 1) % n];
            rot += prev.cross(self.verts[k]);
            self.edges[k] = next - self.verts[k];
        }
        self.area = 0.5 * rot.length();
        self.aperture = 2.0 * (self.area / std::f64::consts::PI).sqrt();
        self.normal = rot.normalize_or_zero();
        for (edge_normal, edge) in self.edge_normals.iter_mut().zip(&self.edges) {
            *edge_normal = edge.normalize_or_zero().cross(self.normal);
        }
    }

    pub fn verts(&self) -> &[DVec3] {
        &self.verts
    }

    pub fn local_verts(&self) -> &[DVec3] {
        &self.local_verts
    }

    pub fn edges(&self) -> &[DVec3] {
        &self.edges
    }

    /// Outward-pointing normals of each edge, lying in the polygon plane.
    pub fn edge_normals(&self) -> &[DVec3] {
        &self.edge_normals
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Diameter of a circle with the same area.
    pub fn aperture(&self) -> f64 {
        self.aperture
    }

    pub fn centroid(&self) -> DVec3 {
        self.verts.iter().copied().sum::<DVec3>() / self.verts.len() as f64
    }

    /// Orthogonal projection of `p` onto the infinite plane of the polygon.
    pub fn nearest_on_plane(&self, p: DVec3) -> DVec3 {
        p + self.normal * self.normal.dot(self.verts[0] - p)
    }

    /// Nearest point on the polygon boundary and the index of its edge.
    pub fn nearest_on_edge(&self, p: DVec3) -> (DVec3, usize) {
        let mut best = edge_nearest(self.verts[0], self.edges[0], p);
        let mut best_dist = best.distance_squared(p);
        let mut best_edge = 0;
        for k in 1..self.verts.len() {
            let candidate = edge_nearest(self.verts[k], self.edges[k], p);
            let dist = candidate.distance_squared(p);
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
                best_edge = k;
            }
        }
        (best, best_edge)
    }

    /// Nearest point on the limited polygon surface.
    pub fn nearest(&self, p: DVec3) -> NearestPoint {
        let (on_edge, k) = self.nearest_on_edge(p);
        let dp = on_edge - p;
        let outside = dp == DVec3::ZERO || self.edge_normals[k].dot(dp) < 0.0;
        let point = if outside {
            on_edge
        } else {
            self.nearest_on_plane(p)
        };
        NearestPoint {
            point,
            outside,
            on_edge,
        }
    }

    pub fn is_infront(&self, p: DVec3) -> bool {
        (p - self.nearest_on_plane(p)).dot(self.normal) > 0.0
    }

    pub fn is_behind(&self, p: DVec3) -> bool {
        (p - self.nearest_on_plane(p)).dot(self.normal) < 0.0
    }

    /// Intersection of the line through `p0` and `p1` with the polygon plane.
    ///
    /// Returns the intersection point and its relative position `w` along the
    /// segment (`0` at `p0`, `1` at `p1`), or `None` for a parallel line.
    pub fn intersection(&self, p0: DVec3, p1: DVec3) -> Option<(DVec3, f64)> {
        let on_plane = self.nearest_on_plane(p0);
        let d = on_plane.distance(p0);
        if d == 0.0 {
            return Some((p0, 0.0));
        }
        let segment = p1 - p0;
        let length = segment.length();
        let dir = segment.normalize_or_zero();
        let r = dir.dot((on_plane - p0).normalize_or_zero());
        if r == 0.0 || length == 0.0 {
            return None;
        }
        let t = d / r;
        Some((p0 + dir * t, t / length))
    }
}

fn edge_nearest(start: DVec3, edge: DVec3, p: DVec3) -> DVec3 {
    let l2 = edge.length_squared();
    if l2 == 0.0 {
        return start;
    }
    let t = ((p - start).dot(edge) / l2).clamp(0.0, 1.0);
    start + edge * t
}
