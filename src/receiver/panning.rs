//! Amplitude panning onto speaker layouts.

use super::speaker::SpeakerArray;
use super::{EncoderContext, EncoderState, ReceiverEncoder, ramp_weighted};
use crate::dsp::FoaChunk;
use crate::error::Result;
use crate::math::{DVec3, unit};

struct Weights(Vec<f32>);

/// Index of the speaker closest to `dir` and, if there are two or more
/// speakers, the runner-up.
fn two_nearest(units: &[DVec3], dir: DVec3) -> (usize, Option<usize>) {
    let mut first = (0usize, f64::INFINITY);
    let mut second: Option<(usize, f64)> = None;
    for (k, u) in units.iter().enumerate() {
        let d = u.distance_squared(dir);
        if d < first.1 {
            if first.1.is_finite() {
                second = Some(first);
            }
            first = (k, d);
        } else if second.is_none_or(|(_, d2)| d < d2) {
            second = Some((k, d));
        }
    }
    (first.0, second.map(|(k, _)| k))
}

fn ramp_all(current: &mut [f32], target: &[f32], chunk: &[f32], output: &mut [Vec<f32>]) {
    for ((w, t), out) in current.iter_mut().zip(target).zip(output.iter_mut()) {
        ramp_weighted(w, *t, chunk, out);
    }
}

/// Nearest speaker panning: every source plays on the single speaker whose
/// direction is closest to the source direction.
pub struct NearestSpeaker {
    array: SpeakerArray,
    target: Vec<f32>,
}

impl NearestSpeaker {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        let layout = ctx.require_speakers("nsp")?;
        let array = SpeakerArray::new(layout, ctx.sample_rate, ctx.block_size, ctx.speed_of_sound)?;
        Ok(Self {
            target: vec![0.0; array.len()],
            array,
        })
    }
}

impl ReceiverEncoder for NearestSpeaker {
    fn type_name(&self) -> &'static str {
        "nsp"
    }

    fn num_channels(&self) -> usize {
        self.array.len()
    }

    fn channel_label(&self, channel: usize) -> String {
        self.array.label(channel)
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(Weights(vec![0.0; self.array.len()]))
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(Weights(weights)) = state.downcast_mut::<Weights>() else {
            return;
        };
        let (nearest, _) = two_nearest(self.array.unit_vectors(), unit(prel));
        self.target.fill(0.0);
        self.target[nearest] = 1.0;
        ramp_all(weights, &self.target, chunk, output);
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        _output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        self.array.add_diffuse(chunk);
    }

    fn postproc(&mut self, output: &mut [Vec<f32>]) {
        self.array.postproc(output);
    }
}

/// Two-dimensional vector base amplitude panning between the two speakers
/// nearest to the source direction. Gains are normalized to unit energy.
pub struct Vbap2d {
    array: SpeakerArray,
    target: Vec<f32>,
}

impl Vbap2d {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        let layout = ctx.require_speakers("vbap")?;
        layout.require(2, "2D-VBAP")?;
        let array = SpeakerArray::new(layout, ctx.sample_rate, ctx.block_size, ctx.speed_of_sound)?;
        Ok(Self {
            target: vec![0.0; array.len()],
            array,
        })
    }

    /// Panning gains of the speaker pair with unit vectors `l1`, `l2` for direction `dir`.
    fn pair_gains(l1: DVec3, l2: DVec3, dir: DVec3) -> (f64, f64) {
        let mut det = l1.x * l2.y - l2.x * l1.y;
        if det != 0.0 {
            det = 1.0 / det;
        }
        let g1 = dir.x * det * l2.y - dir.y * det * l2.x;
        let g2 = -dir.x * det * l1.y + dir.y * det * l1.x;
        let norm = (g1 * g1 + g2 * g2).sqrt();
        let w = if norm > 0.0 { 1.0 / norm } else { norm };
        (w * g1, w * g2)
    }
}

impl ReceiverEncoder for Vbap2d {
    fn type_name(&self) -> &'static str {
        "vbap"
    }

    fn num_channels(&self) -> usize {
        self.array.len()
    }

    fn channel_label(&self, channel: usize) -> String {
        self.array.label(channel)
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(Weights(vec![0.0; self.array.len()]))
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(Weights(weights)) = state.downcast_mut::<Weights>() else {
            return;
        };
        let dir = unit(prel);
        let units = self.array.unit_vectors();
        let (k1, k2) = two_nearest(units, dir);
        self.target.fill(0.0);
        match k2 {
            Some(k2) => {
                let (g1, g2) = Self::pair_gains(units[k1], units[k2], dir);
                self.target[k1] = g1 as f32;
                self.target[k2] = g2 as f32;
            }
            None => self.target[k1] = 1.0,
        }
        ramp_all(weights, &self.target, chunk, output);
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        _output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        self.array.add_diffuse(chunk);
    }

    fn postproc(&mut self, output: &mut [Vec<f32>]) {
        self.array.postproc(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::from_spherical;
    use crate::receiver::SpeakerLayout;
    use crate::scene::Attributes;

    fn context<'a>(attrs: &'a Attributes, layout: &'a SpeakerLayout) -> EncoderContext<'a> {
        EncoderContext {
            attributes: attrs,
            speakers: Some(layout),
            sample_rate: 48000.0,
            block_size: 4,
            speed_of_sound: 340.0,
        }
    }

    fn settle(enc: &mut dyn ReceiverEncoder, prel: DVec3) -> Vec<f32> {
        let mut state = enc.create_state(48000.0, 4);
        let chunk = [1.0f32; 4];
        let n = enc.num_channels();
        let mut first = vec![vec![0.0f32; 4]; n];
        enc.add_point_source(prel, 0.0, &chunk, &mut first, &mut state);
        let mut out = vec![vec![0.0f32; 4]; n];
        enc.add_point_source(prel, 0.0, &chunk, &mut out, &mut state);
        out.iter().map(|c| c[3]).collect()
    }

    #[test]
    fn test_two_nearest() {
        let units = [DVec3::X, DVec3::Y, -DVec3::X, -DVec3::Y];
        let dir = from_spherical(1.0, 0.3, 0.0);
        assert_eq!(two_nearest(&units, dir), (0, Some(1)));
        assert_eq!(two_nearest(&units[..1], dir), (0, None));
    }

    #[test]
    fn test_nearest_speaker_picks_one() {
        let attrs = Attributes::new();
        let layout = SpeakerLayout::ring(4, 1.0);
        let mut enc = NearestSpeaker::new(&context(&attrs, &layout)).unwrap();
        let out = settle(&mut enc, DVec3::new(-2.0, 0.3, 0.0));
        assert_eq!(out, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_vbap_between_speakers() {
        let attrs = Attributes::new();
        let layout = SpeakerLayout::ring(4, 1.0);
        let mut enc = Vbap2d::new(&context(&attrs, &layout)).unwrap();
        let out = settle(&mut enc, from_spherical(3.0, std::f64::consts::FRAC_PI_4, 0.0));
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0] - expected).abs() < 1e-5);
        assert!((out[1] - expected).abs() < 1e-5);
        assert_eq!(out[2], 0.0);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_vbap_symmetric_pair() {
        let attrs = Attributes::new();
        let layout = SpeakerLayout::ring(6, 1.0);
        let mut enc = Vbap2d::new(&context(&attrs, &layout)).unwrap();
        let out = settle(&mut enc, DVec3::new(0.0, -1.0, 0.0));
        // speaker 4 sits at 240 degrees, speaker 5 at 300 degrees
        let dir = from_spherical(1.0, -std::f64::consts::FRAC_PI_2, 0.0);
        let (g1, g2) = Vbap2d::pair_gains(
            layout.speakers[4].unit_vector(),
            layout.speakers[5].unit_vector(),
            dir,
        );
        assert!((g1 - g2).abs() < 1e-9);
        assert!((out[4] - g1 as f32).abs() < 1e-5);
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn test_vbap_needs_two_speakers() {
        let attrs = Attributes::new();
        let layout = SpeakerLayout::ring(1, 1.0);
        assert!(Vbap2d::new(&context(&attrs, &layout)).is_err());
    }
}
