use crate::error::{AcousticaError, Result};
use rubato::{FftFixedIn, Resampler};

const CHUNK_SIZE: usize = 1024;

/// Offline sample rate converter for whole clips.
///
/// The output is trimmed to `round(frames * ratio)` frames with the
/// resampler's own latency removed, so clips stay aligned with the transport.
pub struct ClipResampler {
    source_rate: u32,
    target_rate: u32,
    channels: u16,
}

impl ClipResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: u16) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AcousticaError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(AcousticaError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            source_rate,
            target_rate,
            channels,
        })
    }

    pub fn ratio(&self) -> f64 {
        self.target_rate as f64 / self.source_rate as f64
    }

    /// Resamples de-interleaved channels of equal length.
    pub fn process_channels(&self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if self.source_rate == self.target_rate || input.is_empty() {
            return Ok(input.to_vec());
        }
        let frames = input.first().map_or(0, Vec::len);
        let expected = (frames as f64 * self.ratio()).round() as usize;
        let mut resampler = FftFixedIn::<f32>::new(
            self.source_rate as usize,
            self.target_rate as usize,
            CHUNK_SIZE,
            2,
            input.len(),
        )
        .map_err(|e| AcousticaError::AudioFormat(format!("Failed to create resampler: {}", e)))?;
        let delay = resampler.output_delay();
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); input.len()];

        let mut pos = 0;
        // feed silence after the clip until the latency is flushed
        while output[0].len() < expected + delay {
            let mut chunk = vec![vec![0.0f32; CHUNK_SIZE]; input.len()];
            if pos < frames {
                let n = (frames - pos).min(CHUNK_SIZE);
                for (dst, src) in chunk.iter_mut().zip(input) {
                    dst[..n].copy_from_slice(&src[pos..pos + n]);
                }
            }
            pos += CHUNK_SIZE;
            let produced = resampler
                .process(&chunk, None)
                .map_err(|e| AcousticaError::AudioFormat(format!("Resampling error: {}", e)))?;
            for (dst, src) in output.iter_mut().zip(produced) {
                dst.extend_from_slice(&src);
            }
        }
        for channel in output.iter_mut() {
            channel.drain(..delay);
            channel.truncate(expected);
        }
        Ok(output)
    }

    pub fn process_interleaved(&self, samples: &[f32]) -> Result<Vec<f32>> {
        let channels = self.channels as usize;
        let split: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                samples
                    .chunks_exact(channels)
                    .map(|frame| frame[ch])
                    .collect()
            })
            .collect();
        let resampled = self.process_channels(&split)?;
        let frames = resampled.first().map_or(0, Vec::len);
        let mut interleaved = Vec::with_capacity(frames * channels);
        for k in 0..frames {
            for channel in &resampled {
                interleaved.push(channel[k]);
            }
        }
        Ok(interleaved)
    }
}
