use crate::geometry::{EulerTrack, NavMesh, PositionTrack};
use crate::math::{DVec3, Euler, Pose};
use std::sync::Arc;

/// Number of soloed objects in the scene.
///
/// Computed once per block and passed to every activity update; when it is
/// non-zero, only soloed objects stay active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoloState {
    pub solo_count: usize,
}

impl SoloState {
    pub fn from_flags<'a>(objects: impl IntoIterator<Item = &'a DynamicObject>) -> Self {
        Self {
            solo_count: objects.into_iter().filter(|o| o.solo).count(),
        }
    }

    pub fn allows(&self, solo: bool) -> bool {
        self.solo_count == 0 || solo
    }
}

/// Pose-bearing scene object driven by trajectories.
#[derive(Debug, Clone)]
pub struct DynamicObject {
    pub name: String,
    pub location: PositionTrack,
    pub orientation: EulerTrack,
    /// Scene time at which track time zero is reached
    pub start_time: f64,
    /// End of the activity window; values not after `start_time` mean forever
    pub end_time: f64,
    /// Offset added to the interpolated location
    pub dlocation: DVec3,
    /// Offset added to the interpolated orientation
    pub dorientation: Euler,
    pub navmesh: Option<Arc<NavMesh>>,
    pub mute: bool,
    pub solo: bool,

    pose: Pose,
    previous: Pose,
    active: bool,
}

impl DynamicObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: PositionTrack::new(),
            orientation: EulerTrack::new(),
            start_time: 0.0,
            end_time: 0.0,
            dlocation: DVec3::ZERO,
            dorientation: Euler::ZERO,
            navmesh: None,
            mute: false,
            solo: false,
            pose: Pose::default(),
            previous: Pose::default(),
            active: true,
        }
    }

    /// Object resting at `position` with `orientation`.
    pub fn fixed(name: impl Into<String>, position: DVec3, orientation: Euler) -> Self {
        let mut object = Self::new(name);
        object.location = PositionTrack::constant(position);
        object.orientation = EulerTrack::constant(orientation);
        object.pose = Pose::new(position, orientation);
        object.previous = object.pose;
        object
    }

    /// Recomputes the pose for scene time `t`, keeping the previous one.
    pub fn geometry_update(&mut self, t: f64) {
        self.previous = self.pose;
        let local_time = t - self.start_time;
        let raw = self.location.position(local_time);
        let mut position = raw + self.dlocation;
        if let Some(navmesh) = &self.navmesh {
            position = navmesh.update_pos(position);
            self.dlocation = position - raw;
        }
        let orientation = self.orientation.interp(local_time) + self.dorientation;
        self.pose = Pose::new(position, orientation);
    }

    /// Whether `t` lies inside the activity window.
    pub fn is_within_time(&self, t: f64) -> bool {
        t >= self.start_time && (t <= self.end_time || self.end_time <= self.start_time)
    }

    pub fn process_active(&mut self, t: f64, solo: &SoloState) {
        self.active = self.is_within_time(t) && !self.mute && solo.allows(self.solo);
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn previous_pose(&self) -> Pose {
        self.previous
    }

    pub fn position(&self) -> DVec3 {
        self.pose.position
    }

    pub fn orientation(&self) -> Euler {
        self.pose.orientation
    }

    /// Position change since the last update.
    pub fn velocity_step(&self) -> DVec3 {
        self.pose.position - self.previous.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    #[test]
    fn test_geometry_update_follows_track() {
        let mut object = DynamicObject::new("walker");
        object.location =
            PositionTrack::load([(0.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))]).unwrap();
        object.start_time = 2.0;
        object.geometry_update(5.0);
        assert_eq!(object.position(), DVec3::new(3.0, 0.0, 0.0));
        object.geometry_update(6.0);
        assert_eq!(object.previous_pose().position, DVec3::new(3.0, 0.0, 0.0));
        assert_eq!(object.velocity_step(), DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_navmesh_offset_persists() {
        let ground = Polygon::new(vec![
            DVec3::new(-50.0, -50.0, 0.0),
            DVec3::new(50.0, -50.0, 0.0),
            DVec3::new(50.0, 50.0, 0.0),
            DVec3::new(-50.0, 50.0, 0.0),
        ])
        .unwrap();
        let mut object = DynamicObject::fixed("walker", DVec3::new(1.0, 1.0, 3.0), Euler::ZERO);
        object.navmesh = Some(Arc::new(NavMesh::new(vec![ground])));
        object.geometry_update(0.0);
        assert_eq!(object.position(), DVec3::new(1.0, 1.0, 0.0));
        assert_eq!(object.dlocation, DVec3::new(0.0, 0.0, -3.0));
        object.geometry_update(1.0);
        assert_eq!(object.position(), DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_process_active_with_solo() {
        let mut a = DynamicObject::new("a");
        let mut b = DynamicObject::new("b");
        b.solo = true;
        let solo = SoloState::from_flags([&a, &b]);
        assert_eq!(solo.solo_count, 1);
        a.process_active(0.0, &solo);
        b.process_active(0.0, &solo);
        assert!(!a.is_active());
        assert!(b.is_active());

        let none = SoloState::default();
        a.mute = true;
        a.process_active(0.0, &none);
        assert!(!a.is_active());
    }

    #[test]
    fn test_time_window() {
        let mut object = DynamicObject::new("timed");
        object.start_time = 1.0;
        object.end_time = 2.0;
        assert!(!object.is_within_time(0.5));
        assert!(object.is_within_time(1.5));
        assert!(!object.is_within_time(2.5));
        object.end_time = 0.0;
        assert!(object.is_within_time(100.0));
    }
}
