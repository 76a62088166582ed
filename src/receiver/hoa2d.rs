use super::speaker::{SpeakerArray, SpeakerLayout};
use super::{EncoderContext, EncoderState, ReceiverEncoder};
use crate::dsp::FoaChunk;
use crate::error::Result;
use crate::math::{DVec3, azimuth};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Horizontal higher-order ambisonics, decoded to a speaker ring.
///
/// Sources are encoded into circular harmonics up to `order`, which defaults
/// to (and is limited by) `(N - 1) / 2` for `N` speakers. Regular rings are
/// decoded with an inverse FFT over the speaker index; irregular rings fall
/// back to a Fourier sum evaluated at the actual speaker azimuths.
///
/// Attributes:
/// * `order` - Ambisonic order, zero selects the maximum
/// * `maxre` - Apply max-rE order weights
/// * `rotation` - Rotation of the decoded field in degrees
pub struct Hoa2d {
    array: SpeakerArray,
    order: usize,
    /// Per-order weight including rotation and max-rE
    order_gain: Vec<Complex<f32>>,
    /// Encoded circular harmonics, one block per order
    encoded: Vec<Vec<Complex<f32>>>,
    decode: Decode,
}

enum Decode {
    Fft {
        fft: Arc<dyn Fft<f32>>,
        /// `e^{i m a0}` for a ring starting at azimuth `a0`
        offset: Vec<Complex<f32>>,
        frames: Vec<Complex<f32>>,
        scratch: Vec<Complex<f32>>,
    },
    /// Cosine and sine of `m * az` per speaker, order-major
    Direct(Vec<(Vec<f32>, Vec<f32>)>),
}

impl Decode {
    fn new(layout: &SpeakerLayout, order: usize, block_size: usize) -> Self {
        let n = layout.len();
        match regular_ring_offset(layout) {
            Some(a0) => {
                let fft = FftPlanner::<f32>::new().plan_fft_inverse(n);
                let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
                Self::Fft {
                    fft,
                    offset: (0..=order)
                        .map(|m| Complex::from_polar(1.0, (m as f64 * a0) as f32))
                        .collect(),
                    frames: vec![Complex::default(); n * block_size],
                    scratch,
                }
            }
            None => Self::direct(layout, order),
        }
    }

    fn direct(layout: &SpeakerLayout, order: usize) -> Self {
        Self::Direct(
            (0..=order)
                .map(|m| {
                    layout
                        .speakers
                        .iter()
                        .map(|s| {
                            let a = m as f64 * s.az;
                            (a.cos() as f32, a.sin() as f32)
                        })
                        .unzip()
                })
                .collect(),
        )
    }
}

/// Azimuth of the first speaker when the speakers are equally spaced in
/// ascending order around the full circle.
fn regular_ring_offset(layout: &SpeakerLayout) -> Option<f64> {
    let n = layout.len();
    let a0 = layout.speakers.first()?.az;
    let step = 2.0 * PI / n as f64;
    layout
        .speakers
        .iter()
        .enumerate()
        .all(|(k, s)| {
            let d = (s.az - a0 - k as f64 * step).rem_euclid(2.0 * PI);
            d.min(2.0 * PI - d) < 1e-6
        })
        .then_some(a0)
}

struct State {
    weights: Vec<Complex<f32>>,
}

impl Hoa2d {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        let layout = ctx.require_speakers("hoa2d")?;
        layout.require(3, "HOA decoding")?;
        let array = SpeakerArray::new(layout, ctx.sample_rate, ctx.block_size, ctx.speed_of_sound)?;
        let max_order = (layout.len() - 1) / 2;
        let requested: usize = ctx.attributes.get_or("order", 0usize)?;
        let order = if requested > 0 {
            requested.min(max_order)
        } else {
            max_order
        };
        let maxre = ctx.attributes.get_bool("maxre", false)?;
        let rotation = ctx.attributes.get_deg("rotation", 0.0)?;
        let order_gain: Vec<Complex<f32>> = (0..=order)
            .map(|m| {
                let weight = if maxre {
                    (m as f64 * PI / (2.0 * order as f64 + 2.0)).cos()
                } else {
                    1.0
                };
                Complex::from_polar(weight as f32, (-(m as f64) * rotation) as f32)
            })
            .collect();
        let decode = Decode::new(layout, order, ctx.block_size);
        log::debug!(
            "hoa2d receiver: {} speakers, order {}, maxre {}, fft decode {}",
            layout.len(),
            order,
            maxre,
            matches!(decode, Decode::Fft { .. })
        );
        Ok(Self {
            array,
            order,
            order_gain,
            encoded: vec![vec![Complex::default(); ctx.block_size]; order + 1],
            decode,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn decode_into(&mut self, output: &mut [Vec<f32>]) {
        let n = self.array.len();
        let scale = 1.0 / n as f32;
        match &mut self.decode {
            Decode::Fft {
                fft,
                offset,
                frames,
                scratch,
            } => {
                frames.fill(Complex::default());
                for (t, frame) in frames.chunks_exact_mut(n).enumerate() {
                    frame[0] = self.encoded[0][t] * scale;
                    for m in 1..=self.order {
                        let bin = self.encoded[m][t] * offset[m] * scale;
                        frame[m] = bin;
                        frame[n - m] = bin.conj();
                    }
                }
                fft.process_with_scratch(frames, scratch);
                for (t, frame) in frames.chunks_exact(n).enumerate() {
                    for (channel, x) in output.iter_mut().zip(frame) {
                        if let Some(sample) = channel.get_mut(t) {
                            *sample += x.re;
                        }
                    }
                }
            }
            Decode::Direct(decoder) => {
                for (k, channel) in output.iter_mut().enumerate().take(n) {
                    for (m, (cos, sin)) in decoder.iter().enumerate() {
                        let w = if m == 0 { scale } else { 2.0 * scale };
                        let (c, s) = (w * cos[k], w * sin[k]);
                        for (sample, e) in channel.iter_mut().zip(&self.encoded[m]) {
                            *sample += c * e.re - s * e.im;
                        }
                    }
                }
            }
        }
    }
}

impl ReceiverEncoder for Hoa2d {
    fn type_name(&self) -> &'static str {
        "hoa2d"
    }

    fn num_channels(&self) -> usize {
        self.array.len()
    }

    fn channel_label(&self, channel: usize) -> String {
        self.array.label(channel)
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(State {
            weights: vec![Complex::default(); self.order + 1],
        })
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        _output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(state) = state.downcast_mut::<State>() else {
            return;
        };
        let az = azimuth(prel);
        let inc = 1.0 / chunk.len().max(1) as f32;
        for m in 0..=self.order {
            let target =
                self.order_gain[m] * Complex::from_polar(1.0, (-(m as f64) * az) as f32);
            let dw = (target - state.weights[m]) * inc;
            let w = &mut state.weights[m];
            for (enc, x) in self.encoded[m].iter_mut().zip(chunk) {
                *w += dw;
                *enc += *w * *x;
            }
            *w = target;
        }
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
        self.decode_into(output);
        for buf in self.encoded.iter_mut() {
            buf.fill(Complex::default());
        }
        self.array.postproc(output);
    }
}
