use super::{EncoderContext, EncoderState, ReceiverEncoder};
use crate::dsp::{FoaChunk, mix_into};
use crate::error::Result;
use crate::math::DVec3;

/// Single omnidirectional channel.
pub struct Omni {
    diffuse_gain: f32,
}

impl Omni {
    pub fn new(ctx: &EncoderContext) -> Result<Self> {
        Ok(Self {
            diffuse_gain: ctx.attributes.get_or("diffusegain", 1.0f32)?,
        })
    }
}

impl ReceiverEncoder for Omni {
    fn type_name(&self) -> &'static str {
        "omni"
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn channel_label(&self, _channel: usize) -> String {
        "0".to_string()
    }

    fn create_state(&self, _sample_rate: f64, _block_size: usize) -> EncoderState {
        Box::new(())
    }

    fn add_point_source(
        &mut self,
        _prel: DVec3,
        _width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        if let Some(out) = output.first_mut() {
            mix_into(out, chunk, 1.0);
        }
    }

    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        output: &mut [Vec<f32>],
        _state: &mut EncoderState,
    ) {
        if let Some(out) = output.first_mut() {
            mix_into(out, &chunk.w, self.diffuse_gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Attributes;

    #[test]
    fn test_omni_passes_signal() {
        let attrs = Attributes::new();
        let ctx = EncoderContext {
            attributes: &attrs,
            speakers: None,
            sample_rate: 48000.0,
            block_size: 4,
            speed_of_sound: 340.0,
        };
        let mut omni = Omni::new(&ctx).unwrap();
        let mut state = omni.create_state(48000.0, 4);
        let mut out = vec![vec![0.0f32; 4]];
        omni.add_point_source(DVec3::X, 0.0, &[1.0, 2.0, 3.0, 4.0], &mut out, &mut state);
        let mut foa = FoaChunk::new(4);
        foa.w.fill(1.0);
        omni.add_diffuse_source(&foa, &mut out, &mut state);
        assert_eq!(out[0], vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(omni.channel_label(0), "0");
    }
}
