use super::{EncoderContext, EncoderState, ReceiverEncoder, ramp_weighted};
use crate::dsp::{FoaChunk, mix_into};
use crate::error::Result;
use crate::math::{DVec3, azimuth, elevation};

/// First-order ambisonic encoder, horizontal-only (`amb1h0v`, channels
/// W, X, Y) or periphonic (`amb1h1v`, channels W, X, Y, Z).
///
/// W carries the signal attenuated by 3 dB.
pub struct FirstOrderAmbisonic {
    vertical: bool,
    diffuse_gain: f32,
}

struct State {
    weights: [f32; 4],
}

const LABELS: [&str; 4] = ["0w", "1x", "1y", "1z"];

impl FirstOrderAmbisonic {
    pub fn horizontal(ctx: &EncoderContext) -> Result<Self> {
        Self::new(ctx, false)
    }

    pub fn periphonic(ctx: &EncoderContext) -> Result<Self> {
        Self::new(ctx, true)
    }

    fn new(ctx: &EncoderContext, vertical: bool) -> Result<Self> {
        Ok(Self {
            vertical,
            diffuse_gain: ctx.attributes.get_or("diffusegain", 1.0f32)?,
        })
    }

    fn target_weights(&self, prel: DVec3) -> [f32; 4] {
        let az = azimuth(prel);
        let el = if self.vertical { elevation(prel) } else { 0.0 };
        [
            std::f32::consts::FRAC_1_SQRT_2,
            (az.cos() * el.cos()) as f32,
            (az.sin() * el.cos()) as f32,
            el.sin() as f32,
        ]
    }
}

impl ReceiverEncoder for FirstOrderAmbisonic {
    fn type_name(&self) -> &'static str {
        if self.vertical { "amb1h1v" } else { "amb1h0v" }
    }

    fn num_channels(&self) -> usize {
        if self.vertical { 4 } else { 3 }
    }

    fn channel_label(&self, channel: usize) -> String {
        LABELS.get(channel).copied().unwrap_or_default().to_string()
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(State { weights: [0.0; 4] })
    }

    fn add_point_source(
        &mut self,
        prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    ) {
        let Some(state) = state.downcast_mut::<State>() else {
            return;
        };
        let target = self.target_weights(prel);
        for (k, out) in output.iter_mut().enumerate().take(self.num_channels()) {
            ramp_weighted(&mut state.weights[k], target[k], chunk, out);
        }
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        for (out, src) in output.iter_mut().zip(chunk.channels()).take(self.num_channels()) {
            mix_into(out, src, self.diffuse_gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Attributes;

    fn encoder(vertical: bool) -> FirstOrderAmbisonic {
        let attrs = Attributes::new();
        let ctx = EncoderContext {
            attributes: &attrs,
            speakers: None,
            sample_rate: 48000.0,
            block_size: 8,
            speed_of_sound: 340.0,
        };
        FirstOrderAmbisonic::new(&ctx, vertical).unwrap()
    }

    #[test]
    fn test_settled_weights_for_source_on_left() {
        let mut enc = encoder(false);
        let mut state = enc.create_state(48000.0, 8);
        let chunk = [1.0f32; 8];
        let mut out = vec![vec![0.0f32; 8]; 3];
        // first block ramps in from silence
        enc.add_point_source(DVec3::new(0.0, 2.0, 0.0), 0.0, &chunk, &mut out, &mut state);
        let mut out = vec![vec![0.0f32; 8]; 3];
        enc.add_point_source(DVec3::new(0.0, 2.0, 0.0), 0.0, &chunk, &mut out, &mut state);
        assert!((out[0][3] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(out[1][3].abs() < 1e-6);
        assert!((out[2][3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_weights_ramp_within_block() {
        let mut enc = encoder(false);
        let mut state = enc.create_state(48000.0, 8);
        let chunk = [1.0f32; 8];
        let mut out = vec![vec![0.0f32; 8]; 3];
        enc.add_point_source(DVec3::X, 0.0, &chunk, &mut out, &mut state);
        let step = 1.0 / 8.0;
        for k in 1..8 {
            assert!(((out[1][k] - out[1][k - 1]) - step).abs() < 1e-6);
        }
    }

    #[test]
    fn test_periphonic_channels() {
        let enc = encoder(true);
        assert_eq!(enc.num_channels(), 4);
        assert_eq!(enc.channel_label(3), "1z");
        let w = enc.target_weights(DVec3::new(0.0, 0.0, 1.0));
        assert!((w[3] - 1.0).abs() < 1e-6);
    }
}
