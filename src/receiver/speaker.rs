//! Loudspeaker layouts shared by the speaker-based receiver encoders.

use crate::dsp::{DelayLine, FoaChunk};
use crate::error::{AcousticaError, Result};
use crate::math::{DEG2RAD, DVec3, from_spherical};

/// One loudspeaker of a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Speaker {
    /// Azimuth in radians
    pub az: f64,
    /// Elevation in radians
    pub el: f64,
    /// Distance from the receiver center in meters
    pub r: f64,
    /// Linear gain applied after rendering
    pub gain: f64,
    /// Extra delay in seconds
    pub delay: f64,
    /// Appended to the channel index in port names
    pub label: String,
}

impl Speaker {
    pub fn new(az_deg: f64, el_deg: f64, r: f64) -> Self {
        Self {
            az: az_deg * DEG2RAD,
            el: el_deg * DEG2RAD,
            r,
            gain: 1.0,
            delay: 0.0,
            label: String::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn gain_db(mut self, gain_db: f64) -> Self {
        self.gain = 10f64.powf(gain_db / 20.0);
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn position(&self) -> DVec3 {
        from_spherical(self.r, self.az, self.el)
    }

    pub fn unit_vector(&self) -> DVec3 {
        from_spherical(1.0, self.az, self.el)
    }
}

/// Ordered list of loudspeakers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerLayout {
    pub speakers: Vec<Speaker>,
    /// Gain of the first-order components in the diffuse decoder
    pub xyz_gain: f64,
}

impl SpeakerLayout {
    pub fn new(speakers: Vec<Speaker>) -> Self {
        Self {
            speakers,
            xyz_gain: 1.0,
        }
    }

    /// Regular horizontal ring with the first speaker at azimuth zero.
    pub fn ring(count: usize, radius: f64) -> Self {
        let step = 360.0 / count.max(1) as f64;
        Self::new(
            (0..count)
                .map(|k| Speaker::new(k as f64 * step, 0.0, radius))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Requires at least `min` speakers.
    pub fn require(&self, min: usize, what: &str) -> Result<()> {
        if self.speakers.len() < min {
            return Err(AcousticaError::Encoder(format!(
                "At least {} loudspeakers are required for {}.",
                min, what
            )));
        }
        Ok(())
    }

    /// Mean azimuth of the layout, from the sum of the horizontal unit vectors.
    pub fn mean_rotation(&self) -> f64 {
        let sum: DVec3 = self.speakers.iter().map(|s| s.unit_vector()).sum();
        sum.y.atan2(sum.x)
    }
}

/// Rendering state of a layout: diffuse-field decoder and per-speaker
/// delay and gain compensation.
pub(crate) struct SpeakerArray {
    pub(crate) layout: SpeakerLayout,
    unit_vectors: Vec<DVec3>,
    decoder: Vec<[f32; 4]>,
    compensation_gain: Vec<f32>,
    compensation_delay: Vec<DelayLine>,
    compensation_samples: Vec<f64>,
    diffuse: FoaChunk,
}

impl SpeakerArray {
    pub(crate) fn new(
        layout: &SpeakerLayout,
        sample_rate: f64,
        block_size: usize,
        speed_of_sound: f64,
    ) -> Result<Self> {
        layout.require(1, "a speaker based receiver")?;
        let n = layout.len() as f64;
        let rmax = layout
            .speakers
            .iter()
            .map(|s| s.r)
            .fold(0.0f64, f64::max);
        let mut decoder = Vec::with_capacity(layout.len());
        let mut compensation_gain = Vec::with_capacity(layout.len());
        let mut compensation_delay = Vec::with_capacity(layout.len());
        let mut compensation_samples = Vec::with_capacity(layout.len());
        let unit_vectors: Vec<DVec3> = layout.speakers.iter().map(|s| s.unit_vector()).collect();
        for (speaker, unit) in layout.speakers.iter().zip(&unit_vectors) {
            if !(speaker.r > 0.0) {
                return Err(AcousticaError::Encoder(format!(
                    "Invalid loudspeaker distance {}",
                    speaker.r
                )));
            }
            let g = 1.0 / n;
            let gxyz = g * layout.xyz_gain;
            decoder.push([
                (std::f64::consts::SQRT_2 * g) as f32,
                (unit.x * gxyz) as f32,
                (unit.y * gxyz) as f32,
                (unit.z * gxyz) as f32,
            ]);
            compensation_gain.push((speaker.gain * speaker.r / rmax) as f32);
            let samples = sample_rate * ((rmax - speaker.r) / speed_of_sound + speaker.delay);
            let samples = samples.max(0.0).round();
            compensation_samples.push(samples);
            compensation_delay.push(DelayLine::new(
                samples as usize,
                sample_rate,
                speed_of_sound,
            ));
        }
        Ok(Self {
            layout: layout.clone(),
            unit_vectors,
            decoder,
            compensation_gain,
            compensation_delay,
            compensation_samples,
            diffuse: FoaChunk::new(block_size),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.layout.len()
    }

    pub(crate) fn unit_vectors(&self) -> &[DVec3] {
        &self.unit_vectors
    }

    pub(crate) fn label(&self, channel: usize) -> String {
        match self.layout.speakers.get(channel) {
            Some(speaker) => format!("{}{}", channel, speaker.label),
            None => channel.to_string(),
        }
    }

    /// Accumulates a diffuse field; it is decoded in [`SpeakerArray::postproc`].
    pub(crate) fn add_diffuse(&mut self, chunk: &FoaChunk) {
        self.diffuse.add_scaled(chunk, 1.0);
    }

    /// Decodes the accumulated diffuse field and applies gain and delay
    /// compensation to every speaker.
    pub(crate) fn postproc(&mut self, output: &mut [Vec<f32>]) {
        for (k, channel) in output.iter_mut().enumerate().take(self.decoder.len()) {
            let [dw, dx, dy, dz] = self.decoder[k];
            for (t, sample) in channel.iter_mut().enumerate() {
                *sample += dw * self.diffuse.w[t]
                    + dx * self.diffuse.x[t]
                    + dy * self.diffuse.y[t]
                    + dz * self.diffuse.z[t];
            }
            let gain = self.compensation_gain[k];
            let delay = self.compensation_samples[k];
            let line = &mut self.compensation_delay[k];
            for sample in channel.iter_mut() {
                line.push(*sample);
                *sample = gain * line.get(delay);
            }
        }
        self.diffuse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_layout() {
        let ring = SpeakerLayout::ring(4, 2.0);
        assert_eq!(ring.len(), 4);
        assert!((ring.speakers[1].unit_vector() - DVec3::Y).length() < 1e-12);
        assert!(ring.require(5, "testing").is_err());
    }

    #[test]
    fn test_distance_compensation() {
        let layout = SpeakerLayout::new(vec![
            Speaker::new(0.0, 0.0, 3.4),
            Speaker::new(90.0, 0.0, 1.7),
        ]);
        let mut array = SpeakerArray::new(&layout, 1000.0, 8, 340.0).unwrap();
        let mut output = vec![vec![0.0f32; 8], vec![0.0f32; 8]];
        output[0][0] = 1.0;
        output[1][0] = 1.0;
        array.postproc(&mut output);
        // the far speaker is untouched
        assert_eq!(output[0][0], 1.0);
        // the near one is delayed by 5 samples and attenuated by half
        assert_eq!(output[1][0], 0.0);
        assert!((output[1][5] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_diffuse_decode_is_cleared() {
        let layout = SpeakerLayout::ring(2, 1.0);
        let mut array = SpeakerArray::new(&layout, 48000.0, 4, 340.0).unwrap();
        let mut foa = FoaChunk::new(4);
        foa.w.fill(1.0);
        array.add_diffuse(&foa);
        let mut output = vec![vec![0.0f32; 4]; 2];
        array.postproc(&mut output);
        let expected = std::f32::consts::SQRT_2 / 2.0;
        assert!((output[0][2] - expected).abs() < 1e-6);
        let mut silent = vec![vec![0.0f32; 4]; 2];
        array.postproc(&mut silent);
        assert!(silent.iter().flatten().all(|x| *x == 0.0));
    }

    #[test]
    fn test_labels() {
        let layout = SpeakerLayout::new(vec![Speaker::new(0.0, 0.0, 1.0).label("_front")]);
        let array = SpeakerArray::new(&layout, 48000.0, 4, 340.0).unwrap();
        assert_eq!(array.label(0), "0_front");
    }
}
