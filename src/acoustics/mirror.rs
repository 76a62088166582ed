use super::SourceRef;
use crate::math::{DVec3, Euler, unit};
use crate::scene::{Reflector, ReflectorId, SoundId, SoundSource};

/// One image source: the reflection of `parent` on `reflector`.
#[derive(Debug, Clone)]
pub struct MirrorSource {
    pub parent: SourceRef,
    pub reflector: ReflectorId,
    pub order: u32,
    /// Sound at the root of the reflection chain
    pub root: SoundId,
    /// Reflectors from this image back to the root, nearest first
    chain: Vec<ReflectorId>,
    position: DVec3,
    orientation: Euler,
    p_cut: DVec3,
    visible: bool,
}

impl MirrorSource {
    /// Image position of the last update.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn orientation(&self) -> Euler {
        self.orientation
    }

    /// False when the parent lies behind the reflector.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn chain(&self) -> &[ReflectorId] {
        &self.chain
    }
}

/// Image sources of all sounds up to a maximum reflection order.
///
/// Mirrors are stored by ascending order, so every parent is updated before
/// its children.
#[derive(Debug, Clone, Default)]
pub struct MirrorModel {
    mirrors: Vec<MirrorSource>,
}

impl MirrorModel {
    /// Generates the image source tree.
    ///
    /// Order 1 mirrors every sound on every reflector; each further order
    /// mirrors the previous order's images on every reflector except the
    /// one that produced them.
    pub fn new(num_sounds: usize, num_reflectors: usize, max_order: u32) -> Self {
        let mut mirrors = Vec::new();
        if max_order == 0 || num_reflectors == 0 {
            return Self { mirrors };
        }
        for sound in 0..num_sounds {
            for reflector in 0..num_reflectors {
                mirrors.push(MirrorSource {
                    parent: SourceRef::Primary(SoundId(sound)),
                    reflector: ReflectorId(reflector),
                    order: 1,
                    root: SoundId(sound),
                    chain: vec![ReflectorId(reflector)],
                    position: DVec3::ZERO,
                    orientation: Euler::ZERO,
                    p_cut: DVec3::ZERO,
                    visible: false,
                });
            }
        }
        let mut previous = 0..mirrors.len();
        for order in 2..=max_order {
            let start = mirrors.len();
            for parent in previous.clone() {
                for reflector in (0..num_reflectors).map(ReflectorId) {
                    if mirrors[parent].reflector == reflector {
                        continue;
                    }
                    let mut chain = Vec::with_capacity(order as usize);
                    chain.push(reflector);
                    chain.extend_from_slice(&mirrors[parent].chain);
                    let root = mirrors[parent].root;
                    mirrors.push(MirrorSource {
                        parent: SourceRef::Image(parent),
                        reflector,
                        order,
                        root,
                        chain,
                        position: DVec3::ZERO,
                        orientation: Euler::ZERO,
                        p_cut: DVec3::ZERO,
                        visible: false,
                    });
                }
            }
            previous = start..mirrors.len();
        }
        Self { mirrors }
    }

    pub fn mirrors(&self) -> &[MirrorSource] {
        &self.mirrors
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Recomputes image positions and visibility from the current geometry.
    pub fn update(&mut self, sounds: &[SoundSource], reflectors: &[Reflector]) {
        for k in 0..self.mirrors.len() {
            let (parent_position, parent_orientation, parent_visible) =
                match self.mirrors[k].parent {
                    SourceRef::Primary(id) => {
                        let sound = &sounds[id.0];
                        (sound.physical_position(), sound.orientation(), true)
                    }
                    SourceRef::Image(i) => {
                        let parent = &self.mirrors[i];
                        (parent.position, parent.orientation, parent.visible)
                    }
                };
            let polygon = &reflectors[self.mirrors[k].reflector.0].polygon;
            let p_cut = polygon.nearest_on_plane(parent_position);
            let p_img = 2.0 * p_cut - parent_position;
            let mirror = &mut self.mirrors[k];
            mirror.p_cut = p_cut;
            mirror.position = p_img;
            mirror.orientation = parent_orientation;
            mirror.visible = parent_visible && (p_img - p_cut).dot(polygon.normal()) <= 0.0;
        }
    }

    /// Position of the physical sound behind `path`.
    pub fn physical_position(&self, path: SourceRef, sounds: &[SoundSource]) -> DVec3 {
        let root = match path {
            SourceRef::Primary(id) => id,
            SourceRef::Image(i) => self.mirrors[i].root,
        };
        sounds[root.0].physical_position()
    }

    /// Apparent position and gain of image `index` for a receiver at `p_rec`.
    ///
    /// The gain is zero when the receiver is behind the reflector. Otherwise
    /// the reflection point is clamped to the polygon and the gain falls off
    /// as `cos^2.7` of the angle between the image ray and the clamped ray.
    /// With edge reflection the apparent position is moved onto the clamped
    /// ray.
    pub fn effective_position(
        &self,
        index: usize,
        reflectors: &[Reflector],
        p_rec: DVec3,
    ) -> (DVec3, f64) {
        let mirror = &self.mirrors[index];
        let reflector = &reflectors[mirror.reflector.0];
        let polygon = &reflector.polygon;
        let pcut_rec = polygon.nearest_on_plane(p_rec);
        if (p_rec - pcut_rec).dot(polygon.normal()) < 0.0 {
            return (mirror.position, 0.0);
        }
        let len_receiver = pcut_rec.distance(p_rec);
        let len_src = mirror.p_cut.distance(mirror.position);
        let ratio = len_receiver / (len_receiver + len_src).max(1e-6);
        let p_is = polygon.nearest(pcut_rec + (mirror.p_cut - pcut_rec) * ratio).point;
        let cos = unit(p_rec - p_is).dot(unit(p_is - mirror.position));
        let gain = crate::dsp::friendly_f64(cos.max(0.0).powf(2.7));
        if reflector.edge_reflection {
            let len_img = p_is.distance(mirror.position);
            (p_is + unit(p_is - p_rec) * len_img, gain)
        } else {
            (mirror.position, gain)
        }
    }

    /// Runs the reflection filter of every reflector in the chain of image
    /// `index`; `states` holds one filter state per reflection.
    pub fn apply_reflection_filter(
        &self,
        index: usize,
        reflectors: &[Reflector],
        audio: &mut [f32],
        states: &mut [f64],
    ) {
        for (reflector, state) in self.mirrors[index].chain.iter().zip(states.iter_mut()) {
            reflectors[reflector.0].apply_reflection_filter(audio, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::scene::{DynamicObject, SoundDesc};

    fn wall(x: f64) -> Reflector {
        Reflector::new(
            DynamicObject::fixed("wall", DVec3::new(x, -50.0, -50.0), Euler::ZERO),
            Polygon::rectangle(100.0, 100.0),
        )
    }

    fn sound_at(p: DVec3) -> SoundSource {
        let mut sound =
            SoundSource::new("src.0".into(), 0, &SoundDesc::new("0"), 100.0, 8, Vec::new());
        sound.update_from(&DynamicObject::fixed("src", p, Euler::ZERO));
        sound
    }

    #[test]
    fn test_mirror_count_law() {
        // S * R * (R - 1)^(k - 1) images of order k
        let model = MirrorModel::new(2, 3, 3);
        assert_eq!(model.len(), 2 * 3 + 2 * 3 * 2 + 2 * 3 * 4);
        for order in 1..=3 {
            let count = model.mirrors().iter().filter(|m| m.order == order).count();
            assert_eq!(count, 2 * 3 * 2usize.pow(order - 1));
        }
        for m in model.mirrors() {
            if let SourceRef::Image(parent) = m.parent {
                assert_ne!(model.mirrors()[parent].reflector, m.reflector);
                assert_eq!(model.mirrors()[parent].order + 1, m.order);
            }
            assert_eq!(m.chain().len(), m.order as usize);
        }
        assert!(MirrorModel::new(2, 3, 0).is_empty());
    }

    #[test]
    fn test_image_position_and_visibility() {
        let reflectors = vec![wall(0.0)];
        let mut model = MirrorModel::new(1, 1, 1);
        model.update(&[sound_at(DVec3::new(2.0, 1.0, 0.0))], &reflectors);
        let m = &model.mirrors()[0];
        assert!((m.position() - DVec3::new(-2.0, 1.0, 0.0)).length() < 1e-12);
        assert!(m.is_visible());

        model.update(&[sound_at(DVec3::new(-2.0, 1.0, 0.0))], &reflectors);
        assert!(!model.mirrors()[0].is_visible());
    }

    #[test]
    fn test_second_order_between_parallel_walls() {
        let mut far = wall(10.0);
        far.polygon = Polygon::new(vec![
            DVec3::new(0.0, -50.0, -50.0),
            DVec3::new(0.0, -50.0, 50.0),
            DVec3::new(0.0, 50.0, 50.0),
            DVec3::new(0.0, 50.0, -50.0),
        ])
        .unwrap();
        far.object = DynamicObject::fixed("far", DVec3::new(10.0, 0.0, 0.0), Euler::ZERO);
        far.geometry_update(0.0);
        let reflectors = vec![wall(0.0), far];
        let mut model = MirrorModel::new(1, 2, 2);
        model.update(&[sound_at(DVec3::new(3.0, 0.0, 0.0))], &reflectors);
        // first order: x = -3 and x = 17; second order: 23 and -17
        let xs: Vec<f64> = model.mirrors().iter().map(|m| m.position().x).collect();
        assert_eq!(xs.len(), 4);
        for (x, expected) in xs.iter().zip([-3.0, 17.0, 23.0, -17.0]) {
            assert!((x - expected).abs() < 1e-9, "{} != {}", x, expected);
        }
        assert!(model.mirrors().iter().all(|m| m.is_visible()));
    }

    #[test]
    fn test_effective_position() {
        let reflectors = vec![wall(0.0)];
        let mut model = MirrorModel::new(1, 1, 1);
        model.update(&[sound_at(DVec3::new(2.0, 0.0, 0.0))], &reflectors);

        let (p, gain) = model.effective_position(0, &reflectors, DVec3::new(4.0, 0.0, 0.0));
        assert!((p - DVec3::new(-2.0, 0.0, 0.0)).length() < 1e-9);
        assert!((gain - 1.0).abs() < 1e-9);

        let (_, gain) = model.effective_position(0, &reflectors, DVec3::new(-4.0, 0.0, 0.0));
        assert_eq!(gain, 0.0);
    }

    #[test]
    fn test_reflection_point_clamped_to_polygon() {
        let small = Reflector::new(
            DynamicObject::fixed("panel", DVec3::new(0.0, -0.5, -0.5), Euler::ZERO),
            Polygon::rectangle(1.0, 1.0),
        );
        let reflectors = vec![small];
        let mut model = MirrorModel::new(1, 1, 1);
        model.update(&[sound_at(DVec3::new(1.0, 0.8, 0.0))], &reflectors);
        let (p, gain) = model.effective_position(0, &reflectors, DVec3::new(1.0, 0.8, 0.0));
        assert!(gain > 0.5 && gain < 0.7);
        // moved onto the ray through the panel edge
        assert!(p.y < 0.5);
    }
}
