//! Receiver encoders.
//!
//! A receiver encoder turns point-source contributions (a relative position
//! plus a mono chunk) and diffuse first-order ambisonic chunks into the
//! receiver's output channels. Encoders are selected by a type tag through the
//! [`EncoderRegistry`] when the scene is prepared.
//!
//! Every encoder keeps one state object per (source, receiver) pair, created
//! with [`ReceiverEncoder::create_state`] and owned by the propagation model of
//! that pair. Per-pair weights are ramped linearly across each block so that
//! direction changes never produce steps.

mod ambisonic;
mod hoa2d;
mod microphone;
mod omni;
mod panning;
mod registry;
mod speaker;

pub use ambisonic::FirstOrderAmbisonic;
pub use hoa2d::Hoa2d;
pub use microphone::{CardioidMic, OrtfPair};
pub use omni::Omni;
pub use panning::{NearestSpeaker, Vbap2d};
pub use registry::{EncoderContext, EncoderFactory, EncoderRegistry};
pub use speaker::{Speaker, SpeakerLayout};

use crate::dsp::FoaChunk;
use crate::math::DVec3;
use std::any::Any;

/// Per (source, receiver) pair state of an encoder.
pub type EncoderState = Box<dyn Any + Send>;

pub trait ReceiverEncoder: Send {
    /// Short name of the algorithm, as registered.
    fn type_name(&self) -> &'static str;

    fn num_channels(&self) -> usize;

    /// Label of `channel`, appended to the receiver name in port names.
    fn channel_label(&self, channel: usize) -> String;

    fn create_state(&self, sample_rate: f64, block_size: usize) -> EncoderState;

    /// Accumulates a directional contribution.
    ///
    /// # Arguments
    /// * `prel` - Source position relative to the receiver, in receiver coordinates
    /// * `width` - Angular source width in radians
    /// * `chunk` - Mono signal of this block
    /// * `output` - Receiver channel buffers
    /// * `state` - State of this source/receiver pair
    fn add_point_source(
        &mut self,
        prel: DVec3,
        width: f64,
        chunk: &[f32],
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    );

    /// Accumulates a diffuse field already rotated into receiver coordinates.
    fn add_diffuse_source(
        &mut self,
        chunk: &FoaChunk,
        output: &mut [Vec<f32>],
        state: &mut EncoderState,
    );

    /// Finalizes the block once all contributions were added.
    fn postproc(&mut self, _output: &mut [Vec<f32>]) {}
}

/// Ramps `current` toward `target` over `chunk`, adding `weight * x` to `out`.
#[inline]
pub(crate) fn ramp_weighted(current: &mut f32, target: f32, chunk: &[f32], out: &mut [f32]) {
    let dw = (target - *current) / chunk.len().max(1) as f32;
    for (o, x) in out.iter_mut().zip(chunk) {
        *current += dw;
        *o += *current * x;
    }
    *current = target;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_weighted_is_linear() {
        let mut w = 0.0f32;
        let chunk = [1.0f32; 4];
        let mut out = [0.0f32; 4];
        ramp_weighted(&mut w, 1.0, &chunk, &mut out);
        assert_eq!(out, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(w, 1.0);
    }
}
