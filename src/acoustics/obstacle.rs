use crate::math::DVec3;
use crate::scene::Obstacle;

/// Two-stage low-pass state of one obstacle on one sound path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiffractionState {
    pub a1: f64,
    s1: f64,
    s2: f64,
}

/// Applies the diffraction of `obstacle` to the path `p_src` to `p_rec`.
///
/// The diffraction point is the polygon edge point nearest to where the path
/// crosses the obstacle plane. While the path is blocked the filter pole is
/// ramped toward the cutoff of the first zero of a circular aperture,
/// otherwise it ramps back to an open filter. `transmission` mixes the
/// unfiltered signal back in.
///
/// Returns the apparent source position: the diffraction point extended by
/// its distance to the source, or `p_src` when the path is
/// clear.
pub fn diffract(
    obstacle: &Obstacle,
    p_src: DVec3,
    p_rec: DVec3,
    audio: &mut [f32],
    speed_of_sound: f64,
    sample_rate: f64,
    state: &mut DiffractionState,
) -> DVec3 {
    let polygon = &obstacle.polygon;
    let crossing = polygon
        .intersection(p_src, p_rec)
        .filter(|(_, w)| *w > 0.0 && *w < 1.0)
        .map(|(p_is, _)| polygon.nearest(p_is))
        .filter(|nearest| nearest.outside != obstacle.inner)
        .map(|nearest| nearest.on_edge);

    let dt = 1.0 / audio.len().max(1) as f64;
    let mut da1 = -state.a1 * dt;
    let mut p_eff = p_src;
    if let Some(p_is) = crossing {
        let to_src = p_src - p_is;
        let d_is_src = to_src.length();
        let to_src = if d_is_src > 0.0 { to_src / d_is_src } else { to_src };
        let from_rec = (p_is - p_rec).normalize_or_zero();
        let cos_theta = to_src.dot(from_rec).max(0.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt().max(1e-7);
        let f0 = 3.8317 * speed_of_sound
            / (2.0 * std::f64::consts::PI * obstacle.effective_aperture() * sin_theta);
        da1 = ((-std::f64::consts::PI * f0 / sample_rate).exp() - state.a1) * dt;
        p_eff = p_is + from_rec * d_is_src;
    }

    let drywet = obstacle.transmission as f32;
    for x in audio.iter_mut() {
        state.a1 += da1;
        let b0 = 1.0 - state.a1;
        state.s1 = crate::dsp::friendly_f64(state.s1 * state.a1 + *x as f64 * b0);
        state.s2 = crate::dsp::friendly_f64(state.s2 * state.a1 + state.s1 * b0);
        *x = drywet * *x + (1.0 - drywet) * state.s2 as f32;
    }
    p_eff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::math::Euler;
    use crate::scene::DynamicObject;

    fn panel(inner: bool) -> Obstacle {
        Obstacle::new(
            DynamicObject::fixed("panel", DVec3::new(0.0, -1.0, -1.0), Euler::ZERO),
            Polygon::rectangle(2.0, 2.0),
        )
        .inner(inner)
    }

    fn run(obstacle: &Obstacle, p_src: DVec3, p_rec: DVec3) -> (DVec3, f32, DiffractionState) {
        let mut state = DiffractionState::default();
        let mut p = p_src;
        let mut audio = vec![1.0f32; 64];
        for _ in 0..20 {
            audio.fill(1.0);
            p = diffract(obstacle, p_src, p_rec, &mut audio, 340.0, 48000.0, &mut state);
        }
        (p, audio[63], state)
    }

    #[test]
    fn test_clear_path_is_transparent() {
        let (p, y, state) = run(
            &panel(true),
            DVec3::new(1.0, 5.0, 0.0),
            DVec3::new(-1.0, 5.0, 0.0),
        );
        assert_eq!(p, DVec3::new(1.0, 5.0, 0.0));
        assert_eq!(state.a1, 0.0);
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_blocked_path_moves_pole() {
        let obstacle = panel(true);
        let (p, y, state) = run(&obstacle, DVec3::new(1.0, 0.2, 0.0), DVec3::new(-1.0, 0.2, 0.0));
        assert!(state.a1 > 0.9 && state.a1 < 1.0);
        // apparent position lies beyond the nearest edge
        assert!(p.y > 1.0);
        // dc still passes the low-pass
        assert!(y > 0.5);
    }

    #[test]
    fn test_outer_obstacle_moves_source() {
        // outer wall with a 2 m opening; the path passes the wall beside it
        let obstacle = panel(false);
        let p_src = DVec3::new(1.0, 3.0, 0.0);
        let p_rec = DVec3::new(-1.0, 3.0, 0.0);
        let (p, _, state) = run(&obstacle, p_src, p_rec);
        assert!(state.a1 > 0.0);
        assert!(p.y < 3.0);
        let edge = DVec3::new(0.0, 1.0, 0.0);
        assert!((p.distance(edge) - edge.distance(p_src)).abs() < 1e-9);
    }
}
