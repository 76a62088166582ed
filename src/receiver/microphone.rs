//! Simulated microphones.
//!
//! Directional pattern losses are modelled as a one-pole low-pass whose
//! coefficient grows with the angle between the source and the microphone
//! axis: sound from the front passes unfiltered, sound from the back is
//! attenuated at high frequencies down to `fmin`.

use super::{EncoderContext, EncoderState, ReceiverEncoder};
use crate::dsp::{DelayLine, FoaChunk, friendly_f64};
use crate::error::Result;
use crate::math::{DVec3, rot_z, unit};

const EPS: f64 = 1e-7;

/// Directional filter shared by the microphone models.
#[derive(Debug, Clone, Copy)]
struct DirectionalFilter {
    wpow: f64,
    wmin: f64,
}

impl DirectionalFilter {
    /// # Arguments
    /// * `f6db` - Frequency in Hz at which a source at 90 degrees is attenuated by 6 dB
    /// * `fmin` - Cutoff frequency in Hz for a source at 180 degrees
    fn new(f6db: f64, fmin: f64, sample_rate: f64) -> Self {
        let pi = std::f64::consts::PI;
        Self {
            wpow: (-pi * f6db / sample_rate).exp().ln() / 0.5f64.ln(),
            wmin: (-pi * fmin / sample_rate).exp(),
        }
    }

    /// Filter coefficient for a unit direction `dir` and microphone axis `axis`.
    fn coefficient(&self, dir: DVec3, axis: DVec3) -> f64 {
        let w = (0.5 - 0.5 * dir.dot(axis)).powf(self.wpow);
        let w = w.min(self.wmin);
        if w > EPS { w } else { EPS }
    }
}

struct Channel {
    line: DelayLine,
    coefficient: f64,
    state: f64,
}

impl Channel {
    fn new(max_distance: f64, sample_rate: f64, speed_of_sound: f64) -> Self {
        let samples = (2.0 * max_distance * sample_rate / speed_of_sound).ceil() as usize + 2;
        Self {
            line: DelayLine::new(samples, sample_rate, speed_of_sound),
            coefficient: 0.0,
            state: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, distance: f64, dw: f64, x: f32) -> f32 {
        let v = self.line.get_dist_push(distance, x) as f64;
        self.state = friendly_f64(v * (1.0 - self.coefficient) + self.state * self.coefficient);
        self.coefficient += dw;
        self.state as f32
    }
}

struct PairState {
    left: Channel,
    right: Channel,
    itd: f64,
}

/// ORTF stereo pair: two cardioid-like microphones spaced `distance` meters
/// apart and opened by `angle`, with interaural time differences.
///
/// Attributes: `distance` (0.17 m), `angle` (110 degrees), `f6db` (1000 Hz),
/// `fmin` (60 Hz).
pub struct OrtfPair {
    distance: f64,
    dir_l: DVec3,
    dir_r: DVec3,
    filter: DirectionalFilter,
    speed_of_sound: f64,
}

impl OrtfPair {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        let distance = ctx.attributes.get_or("distance", 0.17)?;
        let angle = ctx.attributes.get_deg("angle", 110.0)?;
        let f6db = ctx.attributes.get_or("f6db", 1000.0)?;
        let fmin = ctx.attributes.get_or("fmin", 60.0)?;
        Ok(Self {
            distance,
            dir_l: rot_z(DVec3::X, 0.5 * angle),
            dir_r: rot_z(DVec3::X, -0.5 * angle),
            filter: DirectionalFilter::new(f6db, fmin, ctx.sample_rate),
            speed_of_sound: ctx.speed_of_sound,
        })
    }
}

impl ReceiverEncoder for OrtfPair {
    fn type_name(&self) -> &'static str {
        "ortf"
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn channel_label(&self, channel: usize) -> String {
        if channel == 0 { "l" } else { "r" }.to_string()
    }

    fn create_state(&self, sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(PairState {
            left: Channel::new(self.distance, sample_rate, self.speed_of_sound),
            right: Channel::new(self.distance, sample_rate, self.speed_of_sound),
            itd: 0.0,
        })
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(state) = state.downcast_mut::<PairState>() else {
            return;
        };
        let [out_l, out_r, ..] = output else {
            return;
        };
        let dir = unit(prel);
        let dt = 1.0 / chunk.len().max(1) as f64;
        let dwl = (self.filter.coefficient(dir, self.dir_l) - state.left.coefficient) * dt;
        let dwr = (self.filter.coefficient(dir, self.dir_r) - state.right.coefficient) * dt;
        let ditd = (self.distance * (0.5 * dir.y + 0.5) - state.itd) * dt;
        for (k, x) in chunk.iter().enumerate() {
            out_l[k] += state.left.tick(self.distance - state.itd, dwl, *x);
            out_r[k] += state.right.tick(state.itd, dwr, *x);
            state.itd += ditd;
        }
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        for (out, dir) in output.iter_mut().zip([self.dir_l, self.dir_r]) {
            let (dx, dy) = (dir.x as f32, dir.y as f32);
            for (k, o) in out.iter_mut().enumerate().take(chunk.len()) {
                *o += chunk.w[k] + dx * chunk.x[k] + dy * chunk.y[k];
            }
        }
    }
}

/// Single cardioid microphone facing the receiver's x axis.
///
/// Attribute `filtered` selects the directional low-pass model (with `f6db`
/// and `fmin`); otherwise a broadband `0.5 + 0.5 cos(az)` gain is applied.
pub struct CardioidMic {
    filter: Option<DirectionalFilter>,
}

struct CardioidState {
    gain: f64,
    state: f64,
}

impl CardioidMic {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        let filter = if ctx.attributes.get_bool("filtered", false)? {
            Some(DirectionalFilter::new(
                ctx.attributes.get_or("f6db", 1000.0)?,
                ctx.attributes.get_or("fmin", 60.0)?,
                ctx.sample_rate,
            ))
        } else {
            None
        };
        Ok(Self { filter })
    }
}

impl ReceiverEncoder for CardioidMic {
    fn type_name(&self) -> &'static str {
        "cardioid"
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn channel_label(&self, _channel: usize) -> String {
        "0".to_string()
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(CardioidState {
            gain: 0.0,
            state: 0.0,
        })
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(state) = state.downcast_mut::<CardioidState>() else {
            return;
        };
        let Some(out) = output.first_mut() else {
            return;
        };
        let dt = 1.0 / chunk.len().max(1) as f64;
        match self.filter {
            Some(filter) => {
                // `gain` holds the filter coefficient in this mode
                let dw = (filter.coefficient(unit(prel), DVec3::X) - state.gain) * dt;
                for (o, x) in out.iter_mut().zip(chunk) {
                    state.state =
                        friendly_f64(*x as f64 * (1.0 - state.gain) + state.state * state.gain);
                    state.gain += dw;
                    *o += state.state as f32;
                }
            }
            None => {
                let az = prel.y.atan2(prel.x);
                let dg = (0.5 * az.cos() + 0.5 - state.gain) * dt;
                for (o, x) in out.iter_mut().zip(chunk) {
                    state.gain += dg;
                    *o += state.gain as f32 * x;
                }
            }
        }
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        if let Some(out) = output.first_mut() {
            crate::dsp::mix_into(out, &chunk.w, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Attributes;

    fn context(attrs: &Attributes) -> EncoderContext<'_> {
        EncoderContext {
            attributes: attrs,
            speakers: None,
            sample_rate: 48000.0,
            block_size: 64,
            speed_of_sound: 340.0,
        }
    }

    fn render(enc: &mut dyn ReceiverEncoder, prel: DVec3, blocks: usize) -> Vec<Vec<f32>> {
        let mut state = enc.create_state(48000.0, 64);
        let chunk = [1.0f32; 64];
        let mut out = Vec::new();
        for _ in 0..blocks {
            out = vec![vec![0.0f32; 64]; enc.num_channels()];
            enc.add_point_source(prel, 0.0, &chunk, &mut out, &mut state);
        }
        out
    }

    #[test]
    fn test_cardioid_front_and_back() {
        let attrs = Attributes::new();
        let mut mic = CardioidMic::new(&context(&attrs)).unwrap();
        let front = render(&mut mic, DVec3::new(2.0, 0.0, 0.0), 2);
        assert!((front[0][63] - 1.0).abs() < 1e-6);
        let back = render(&mut mic, DVec3::new(-2.0, 0.0, 0.0), 2);
        assert!(back[0][63].abs() < 1e-6);
        let side = render(&mut mic, DVec3::new(0.0, 2.0, 0.0), 2);
        assert!((side[0][63] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_filtered_cardioid_passes_dc_from_front() {
        let attrs = Attributes::new().with("filtered", true);
        let mut mic = CardioidMic::new(&context(&attrs)).unwrap();
        let out = render(&mut mic, DVec3::X, 4);
        assert!((out[0][63] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_ortf_interaural_delay() {
        let attrs = Attributes::new();
        let mut pair = OrtfPair::new(&context(&attrs)).unwrap();
        assert_eq!(pair.channel_label(1), "r");
        let mut state = pair.create_state(48000.0, 64);
        // settle the delays for a source on the left
        let silence = [0.0f32; 64];
        let mut out = vec![vec![0.0f32; 64]; 2];
        let left = DVec3::new(0.0, 3.0, 0.0);
        pair.add_point_source(left, 0.0, &silence, &mut out, &mut state);
        let mut impulse = [0.0f32; 64];
        impulse[0] = 1.0;
        let mut out = vec![vec![0.0f32; 64]; 2];
        pair.add_point_source(left, 0.0, &impulse, &mut out, &mut state);
        let onset = |ch: &[f32]| ch.iter().position(|x| x.abs() > 1e-4);
        let l = onset(&out[0]).unwrap();
        let r = onset(&out[1]).unwrap();
        // 0.17 m at 340 m/s is 24 samples at 48 kHz
        assert_eq!(l, 0);
        assert!((r as i64 - 24).abs() <= 1);
    }

    #[test]
    fn test_directional_filter_limits() {
        let filter = DirectionalFilter::new(1000.0, 60.0, 48000.0);
        assert_eq!(filter.coefficient(DVec3::X, DVec3::X), EPS);
        let back = filter.coefficient(-DVec3::X, DVec3::X);
        assert!((back - filter.wmin).abs() < 1e-12);
    }
}
