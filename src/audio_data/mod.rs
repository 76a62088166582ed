//! Decoded sample clips played by the `clip` source plugin.
//!
//! Decoding from disk is left to the application; a clip is built from
//! interleaved `f32` samples that were already decoded.

mod resampler;

use crate::error::{AcousticaError, Result};
pub use resampler::ClipResampler;
use std::sync::Arc;
use std::time::Duration;

/// Immutable, cheaply clonable block of interleaved samples.
#[derive(Debug, Clone)]
pub struct AudioClip {
    inner: Arc<ClipInner>,
}

#[derive(Debug)]
struct ClipInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    frames: usize,
}

impl AudioClip {
    /// Wraps decoded interleaved samples.
    ///
    /// # Errors
    ///
    /// Returns an audio format error for a zero sample rate or channel
    /// count, or when the sample count is not a multiple of `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AcousticaError::AudioFormat(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(AcousticaError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AcousticaError::AudioFormat(format!(
                "{} samples do not form whole frames of {} channels",
                samples.len(),
                channels
            )));
        }
        let frames = samples.len() / channels as usize;
        Ok(Self {
            inner: Arc::new(ClipInner {
                samples,
                sample_rate,
                channels,
                frames,
            }),
        })
    }

    /// Single channel clip.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, 1)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn frames(&self) -> usize {
        self.inner.frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.inner.frames as f64 / self.inner.sample_rate as f64)
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames == 0
    }

    /// Sample of `channel` at `frame`; zero outside the clip.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.inner.channels as usize;
        if frame >= self.inner.frames || channel >= channels {
            return 0.0;
        }
        self.inner.samples[frame * channels + channel]
    }

    /// De-interleaved copy of one channel (0-indexed).
    pub fn channel_samples(&self, channel: usize) -> Result<Vec<f32>> {
        let channels = self.inner.channels as usize;
        if channel >= channels {
            return Err(AcousticaError::AudioFormat(format!(
                "Channel {} out of range (clip has {})",
                channel, channels
            )));
        }
        Ok(self
            .inner
            .samples
            .chunks_exact(channels)
            .map(|frame| frame[channel])
            .collect())
    }

    /// Downmix to one channel by averaging.
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }
        let channels = self.inner.channels as usize;
        let scale = 1.0 / channels as f32;
        let samples = self
            .inner
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect();
        Self {
            inner: Arc::new(ClipInner {
                samples,
                sample_rate: self.inner.sample_rate,
                channels: 1,
                frames: self.inner.frames,
            }),
        }
    }

    /// Converts the clip to `target_rate` with an FFT resampler.
    pub fn resample(&self, target_rate: u32) -> Result<Self> {
        if target_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }
        log::debug!(
            "resampling clip of {} frames from {} Hz to {} Hz",
            self.inner.frames,
            self.inner.sample_rate,
            target_rate
        );
        let resampler =
            ClipResampler::new(self.inner.sample_rate, target_rate, self.inner.channels)?;
        let samples = resampler.process_interleaved(&self.inner.samples)?;
        Self::new(samples, target_rate, self.inner.channels)
    }
}
