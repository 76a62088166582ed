//! Time-keyed trajectories.
//!
//! A [`Track`] is an ordered list of `(time, value)` keyframes. Queries between
//! keyframes interpolate linearly; queries before the first or after the last
//! keyframe clamp to that endpoint. An empty track yields the default value.

use crate::error::{AcousticaError, Result};
use crate::math::{DVec3, Euler, azimuth, elevation, from_spherical};

/// Values that can be stored in a [`Track`].
pub trait Keyframe: Copy + Default {
    fn lerp(a: Self, b: Self, w: f64) -> Self;
}

impl Keyframe for DVec3 {
    fn lerp(a: Self, b: Self, w: f64) -> Self {
        a * (1.0 - w) + b * w
    }
}

impl Keyframe for Euler {
    fn lerp(a: Self, b: Self, w: f64) -> Self {
        a.scale(1.0 - w) + b.scale(w)
    }
}

/// Interpolation between position keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Straight line between keyframes
    #[default]
    Cartesian,
    /// Radius, azimuth and elevation are interpolated independently
    Spherical,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track<T: Keyframe> {
    keys: Vec<(f64, T)>,
    loop_period: f64,
    mode: InterpolationMode,
}

pub type PositionTrack = Track<DVec3>;
pub type EulerTrack = Track<Euler>;

impl<T: Keyframe> Track<T> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            loop_period: 0.0,
            mode: InterpolationMode::Cartesian,
        }
    }

    /// Track holding a single constant value.
    pub fn constant(value: T) -> Self {
        let mut track = Self::new();
        track.insert(0.0, value);
        track
    }

    /// Builds a track from keyframes in any order; later duplicates win.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-finite key times.
    pub fn load(keys: impl IntoIterator<Item = (f64, T)>) -> Result<Self> {
        let mut track = Self::new();
        for (t, value) in keys {
            if !t.is_finite() {
                return Err(AcousticaError::config(format!(
                    "Invalid track time {}",
                    t
                )));
            }
            track.insert(t, value);
        }
        Ok(track)
    }

    /// Inserts or replaces the keyframe at time `t`.
    pub fn insert(&mut self, t: f64, value: T) {
        let idx = self.keys.partition_point(|(k, _)| *k < t);
        match self.keys.get_mut(idx) {
            Some(entry) if entry.0 == t => entry.1 = value,
            _ => self.keys.insert(idx, (t, value)),
        }
    }

    pub fn keys(&self) -> &[(f64, T)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Repeats the track with the given period; zero disables looping.
    pub fn set_loop(&mut self, period: f64) {
        self.loop_period = period.max(0.0);
    }

    pub fn loop_period(&self) -> f64 {
        self.loop_period
    }

    /// Time between first and last keyframe.
    pub fn duration(&self) -> f64 {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => last.0 - first.0,
            _ => 0.0,
        }
    }

    pub fn shift_time(&mut self, dt: f64) {
        for key in &mut self.keys {
            key.0 += dt;
        }
    }

    /// Value at time `t`.
    pub fn interp(&self, t: f64) -> T {
        self.interp_with(t, T::lerp)
    }

    fn interp_with(&self, mut t: f64, lerp: impl Fn(T, T, f64) -> T) -> T {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return T::default();
        };
        if self.loop_period > 0.0 {
            t = t.rem_euclid(self.loop_period);
        }
        let idx = self.keys.partition_point(|(k, _)| *k < t);
        if idx == self.keys.len() {
            return last.1;
        }
        if idx == 0 {
            return first.1;
        }
        let (t2, v2) = self.keys[idx];
        if t2 == t {
            return v2;
        }
        let (t1, v1) = self.keys[idx - 1];
        lerp(v1, v2, (t - t1) / (t2 - t1))
    }

    /// Re-samples the track at a fixed interval `dt` between its endpoints.
    pub fn resample(&mut self, dt: f64) {
        if dt <= 0.0 || self.keys.len() < 2 {
            return;
        }
        let t0 = self.keys[0].0;
        let steps = (self.duration() / dt).floor() as usize;
        let keys: Vec<(f64, T)> = (0..=steps)
            .map(|k| {
                let t = t0 + k as f64 * dt;
                (t, self.interp(t))
            })
            .collect();
        self.keys = keys;
    }
}

impl<T> Track<T>
where
    T: Keyframe + std::ops::Add<Output = T>,
{
    /// Moving-average smoothing with an `n`-point Hann window.
    pub fn smooth(&mut self, n: usize)
    where
        T: ScaleBy,
    {
        let n_in = self.keys.len();
        if n == 0 || n_in == 0 {
            return;
        }
        let window: Vec<f64> = (0..n)
            .map(|k| {
                0.5 - 0.5 * (2.0 * std::f64::consts::PI * (k + 1) as f64 / (n + 1) as f64).cos()
            })
            .collect();
        let wsum: f64 = window.iter().sum();
        let half = n / 2;
        let smoothed: Vec<(f64, T)> = (0..n_in)
            .map(|k| {
                let mut acc = T::default();
                for (kw, w) in window.iter().enumerate() {
                    let idx = ((k + kw).max(half) - half).min(n_in - 1);
                    acc = acc + self.keys[idx].1.scale_by(w / wsum);
                }
                (self.keys[k].0, acc)
            })
            .collect();
        self.keys = smoothed;
    }
}

/// Uniform scaling of keyframe values.
pub trait ScaleBy {
    fn scale_by(self, s: f64) -> Self;
}

impl ScaleBy for DVec3 {
    fn scale_by(self, s: f64) -> Self {
        self * s
    }
}

impl ScaleBy for Euler {
    fn scale_by(self, s: f64) -> Self {
        self.scale(s)
    }
}

impl Track<DVec3> {
    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Position at time `t`, honoring the interpolation mode.
    pub fn position(&self, t: f64) -> DVec3 {
        match self.mode {
            InterpolationMode::Cartesian => self.interp(t),
            InterpolationMode::Spherical => self.interp_with(t, spherical_lerp),
        }
    }

    /// Mean of all keyframe positions.
    pub fn center(&self) -> DVec3 {
        if self.keys.is_empty() {
            return DVec3::ZERO;
        }
        self.keys.iter().map(|(_, p)| *p).sum::<DVec3>() / self.keys.len() as f64
    }

    pub fn translate(&mut self, offset: DVec3) {
        for key in &mut self.keys {
            key.1 += offset;
        }
    }

    /// Total path length along the keyframes.
    pub fn length(&self) -> f64 {
        self.keys
            .windows(2)
            .map(|w| w[0].1.distance(w[1].1))
            .sum()
    }

    /// Path length travelled until time `t`.
    pub fn distance_at(&self, t: f64) -> f64 {
        let mut dist = 0.0;
        for w in self.keys.windows(2) {
            let (t1, p1) = w[0];
            let (t2, p2) = w[1];
            if t >= t2 {
                dist += p1.distance(p2);
            } else {
                if t > t1 {
                    dist += p1.distance(p2) * (t - t1) / (t2 - t1);
                }
                break;
            }
        }
        dist
    }

    /// Time at which the path length `dist` is reached, clamped to the track.
    pub fn time_at_distance(&self, dist: f64) -> f64 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if dist <= 0.0 {
            return first.0;
        }
        let mut travelled = 0.0;
        for w in self.keys.windows(2) {
            let (t1, p1) = w[0];
            let (t2, p2) = w[1];
            let seg = p1.distance(p2);
            if travelled + seg >= dist && seg > 0.0 {
                return t1 + (t2 - t1) * (dist - travelled) / seg;
            }
            travelled += seg;
        }
        self.keys.last().map(|k| k.0).unwrap_or(first.0)
    }

    /// Re-times the keyframes so that the object moves at constant speed `v`.
    pub fn set_velocity_const(&mut self, v: f64) {
        if v == 0.0 || self.keys.is_empty() {
            return;
        }
        let mut t = self.keys[0].0;
        let mut prev = self.keys[0].1;
        for key in &mut self.keys {
            t += prev.distance(key.1) / v;
            prev = key.1;
            key.0 = t;
        }
    }
}

fn spherical_lerp(a: DVec3, b: DVec3, w: f64) -> DVec3 {
    let ra = a.length();
    let rb = b.length();
    let aza = azimuth(a);
    let mut azb = azimuth(b);
    // shortest way around the circle
    let tau = 2.0 * std::f64::consts::PI;
    while azb - aza > std::f64::consts::PI {
        azb -= tau;
    }
    while azb - aza < -std::f64::consts::PI {
        azb += tau;
    }
    let ela = elevation(a);
    let elb = elevation(b);
    from_spherical(
        ra + (rb - ra) * w,
        aza + (azb - aza) * w,
        ela + (elb - ela) * w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> PositionTrack {
        Track::load([(0.0, DVec3::ZERO), (2.0, DVec3::new(4.0, 0.0, 0.0))]).unwrap()
    }

    #[test]
    fn test_empty_and_single_key() {
        let empty = PositionTrack::new();
        assert_eq!(empty.interp(3.0), DVec3::ZERO);
        let single = PositionTrack::constant(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(single.interp(-10.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(single.interp(10.0), DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_interp_and_clamp() {
        let track = line();
        assert_eq!(track.interp(-1.0), DVec3::ZERO);
        assert_eq!(track.interp(1.0), DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(track.interp(5.0), DVec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_load_sorts_keys() {
        let track = Track::load([(2.0, DVec3::X), (0.0, DVec3::ZERO), (1.0, DVec3::Y)]).unwrap();
        let times: Vec<f64> = track.keys().iter().map(|k| k.0).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert!(Track::load([(f64::NAN, DVec3::X)]).is_err());
    }

    #[test]
    fn test_loop() {
        let mut track = line();
        track.set_loop(2.0);
        assert_eq!(track.interp(3.0), DVec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_spherical_mode_keeps_radius() {
        let mut track = Track::load([(0.0, DVec3::X), (1.0, DVec3::Y)]).unwrap();
        track.set_mode(InterpolationMode::Spherical);
        let p = track.position(0.5);
        assert!((p.length() - 1.0).abs() < 1e-12);
        assert!((azimuth(p) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_length_and_distance() {
        let track = line();
        assert_eq!(track.length(), 4.0);
        assert_eq!(track.distance_at(1.0), 2.0);
        assert_eq!(track.time_at_distance(3.0), 1.5);
    }

    #[test]
    fn test_resample_and_shift() {
        let mut track = line();
        track.resample(0.5);
        assert_eq!(track.len(), 5);
        assert_eq!(track.interp(0.5), DVec3::new(1.0, 0.0, 0.0));
        track.shift_time(1.0);
        assert_eq!(track.keys()[0].0, 1.0);
    }

    #[test]
    fn test_smooth_preserves_constant() {
        let mut track = Track::load((0..10).map(|k| (k as f64, DVec3::splat(2.0)))).unwrap();
        track.smooth(5);
        for (_, p) in track.keys() {
            assert!((*p - DVec3::splat(2.0)).length() < 1e-12);
        }
    }

    #[test]
    fn test_euler_track() {
        let track =
            EulerTrack::load([(0.0, Euler::ZERO), (1.0, Euler::new(1.0, 0.0, 0.0))]).unwrap();
        assert!((track.interp(0.25).z - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_const() {
        let mut track =
            Track::load([(0.0, DVec3::ZERO), (10.0, DVec3::new(2.0, 0.0, 0.0))]).unwrap();
        track.set_velocity_const(1.0);
        assert_eq!(track.keys()[1].0, 2.0);
    }
}
