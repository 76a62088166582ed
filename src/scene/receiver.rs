use super::{Attributes, DynamicObject, GainModel};
use crate::dsp::{FoaChunk, friendly_f64};
use crate::geometry::Shoebox;
use crate::math::{DVec3, Euler};
use crate::receiver::{EncoderState, ReceiverEncoder, SpeakerLayout};

/// Region outside of which a receiver fades out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center: DVec3,
    pub size: DVec3,
    pub orientation: Euler,
    pub falloff: f64,
}

impl BoundingBox {
    pub fn new(center: DVec3, size: DVec3) -> Self {
        Self {
            center,
            size,
            orientation: Euler::ZERO,
            falloff: 1.0,
        }
    }

    pub fn falloff(mut self, falloff: f64) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn shoebox(&self) -> Shoebox {
        Shoebox::new(self.center, self.size, self.orientation)
    }
}

/// Rendering options of a receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSettings {
    /// Box in which no distance law is applied; zero size for a point receiver
    pub volumetric: DVec3,
    /// Average distance assumed inside a volumetric receiver; non-positive
    /// values select `0.5 * volume^(1/3)`
    pub avgdist: f64,
    /// Raised-cosine ramp length at the volume boundary, or negative for
    /// the sound's distance law
    pub falloff: f64,
    pub render_point: bool,
    pub render_diffuse: bool,
    pub render_image: bool,
    pub ism_min: u32,
    pub ism_max: u32,
    /// Take part in the scene-wide masks
    pub use_global_mask: bool,
    /// Linear gain of diffuse fields
    pub diffuse_gain: f64,
    /// Seconds subtracted from every propagation delay
    pub delaycomp: f64,
    /// Silence point sources while the transport is stopped
    pub mute_on_stop: bool,
    /// Linear gain applied when the outputs are copied to the output ports
    pub gain: f64,
    pub bounding_box: Option<BoundingBox>,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            volumetric: DVec3::ZERO,
            avgdist: 0.0,
            falloff: -1.0,
            render_point: true,
            render_diffuse: true,
            render_image: true,
            ism_min: 0,
            ism_max: u32::MAX,
            use_global_mask: true,
            diffuse_gain: 1.0,
            delaycomp: 0.0,
            mute_on_stop: false,
            gain: 1.0,
            bounding_box: None,
        }
    }
}

impl ReceiverSettings {
    pub fn volumetric(mut self, size: DVec3, falloff: f64) -> Self {
        self.volumetric = size;
        self.falloff = falloff;
        self
    }

    pub fn avgdist(mut self, avgdist: f64) -> Self {
        self.avgdist = avgdist;
        self
    }

    pub fn render(mut self, point: bool, diffuse: bool, image: bool) -> Self {
        self.render_point = point;
        self.render_diffuse = diffuse;
        self.render_image = image;
        self
    }

    pub fn ism_range(mut self, min: u32, max: u32) -> Self {
        self.ism_min = min;
        self.ism_max = max;
        self
    }

    pub fn use_global_mask(mut self, enabled: bool) -> Self {
        self.use_global_mask = enabled;
        self
    }

    pub fn diffuse_gain_db(mut self, gain_db: f64) -> Self {
        self.diffuse_gain = 10f64.powf(gain_db / 20.0);
        self
    }

    pub fn delaycomp(mut self, seconds: f64) -> Self {
        self.delaycomp = seconds;
        self
    }

    pub fn mute_on_stop(mut self, enabled: bool) -> Self {
        self.mute_on_stop = enabled;
        self
    }

    pub fn gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    pub fn renders_order(&self, order: u32) -> bool {
        if order > 0 && !self.render_image {
            return false;
        }
        self.ism_min <= order && order <= self.ism_max
    }
}

/// Declaration of a receiver.
#[derive(Debug, Clone)]
pub struct ReceiverDesc {
    pub object: DynamicObject,
    /// Encoder type tag, e.g. `"omni"` or `"hoa2d"`
    pub encoder: String,
    /// Encoder specific attributes
    pub attributes: Attributes,
    pub speakers: Option<SpeakerLayout>,
    pub settings: ReceiverSettings,
}

impl ReceiverDesc {
    pub fn new(object: DynamicObject, encoder: impl Into<String>) -> Self {
        Self {
            object,
            encoder: encoder.into(),
            attributes: Attributes::new(),
            speakers: None,
            settings: ReceiverSettings::default(),
        }
    }

    pub fn attribute(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.attributes.set(key, value);
        self
    }

    pub fn speakers(mut self, layout: SpeakerLayout) -> Self {
        self.speakers = Some(layout);
        self
    }

    pub fn settings(mut self, settings: ReceiverSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Geometry of a source as seen by a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefPoint {
    /// Source position in receiver coordinates
    pub prel: DVec3,
    pub distance: f64,
    /// Distance law gain
    pub gain: f64,
}

/// Runtime receiver: an encoder, its output buffers and the mask gain ramp.
pub struct Receiver {
    pub object: DynamicObject,
    pub settings: ReceiverSettings,
    avgdist: f64,
    encoder: Box<dyn ReceiverEncoder>,
    outputs: Vec<Vec<f32>>,
    gain: f32,
    next_gain: f32,
    gain_zero: bool,
}

impl Receiver {
    pub(crate) fn new(
        desc: &ReceiverDesc,
        encoder: Box<dyn ReceiverEncoder>,
        block_size: usize,
    ) -> Self {
        let settings = desc.settings.clone();
        let avgdist = if settings.avgdist > 0.0 {
            settings.avgdist
        } else {
            let v = settings.volumetric;
            0.5 * (v.x * v.y * v.z).abs().cbrt()
        };
        Self {
            object: desc.object.clone(),
            outputs: vec![vec![0.0; block_size]; encoder.num_channels()],
            encoder,
            settings,
            avgdist,
            gain: 1.0,
            next_gain: 1.0,
            gain_zero: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn type_name(&self) -> &'static str {
        self.encoder.type_name()
    }

    pub fn position(&self) -> DVec3 {
        self.object.position()
    }

    pub fn orientation(&self) -> Euler {
        self.object.orientation()
    }

    pub fn is_active(&self) -> bool {
        self.object.is_active()
    }

    pub fn num_channels(&self) -> usize {
        self.outputs.len()
    }

    /// Output port names, `"<receiver>.<label>"`.
    pub fn port_names(&self) -> Vec<String> {
        (0..self.num_channels())
            .map(|k| format!("{}.{}", self.object.name, self.encoder.channel_label(k)))
            .collect()
    }

    pub fn outputs(&self) -> &[Vec<f32>] {
        &self.outputs
    }

    pub fn avgdist(&self) -> f64 {
        self.avgdist
    }

    /// Relative position, distance and distance-law gain of a source.
    ///
    /// # Arguments
    /// * `physical` - Position of the physical (primary) source
    /// * `effective` - Position the sound appears to come from
    /// * `is_image` - Whether the path is a reflection
    /// * `gain_model` - Distance law of the source
    pub fn update_refpoint(
        &self,
        physical: DVec3,
        effective: DVec3,
        is_image: bool,
        gain_model: GainModel,
    ) -> RefPoint {
        let pose = self.object.pose();
        let volumetric = self.settings.volumetric;
        if volumetric.x * volumetric.y * volumetric.z > 0.0 {
            let prel = pose.relative(physical);
            let distance = prel.length();
            let d = Shoebox::new(DVec3::ZERO, volumetric, Euler::ZERO)
                .nextpoint(prel)
                .length();
            let gain = if self.settings.falloff > 0.0 {
                crate::geometry::raised_cosine(d, self.settings.falloff) / self.avgdist.max(0.1)
            } else {
                match gain_model {
                    GainModel::InverseDistance => 1.0 / (d + self.avgdist).max(1.0),
                    GainModel::Unity => 1.0 / self.avgdist.max(1.0),
                }
            };
            return RefPoint {
                prel,
                distance,
                gain: friendly_f64(gain),
            };
        }
        let prel = pose.relative(effective);
        let distance = prel.length();
        let mut gain = match gain_model {
            GainModel::InverseDistance => 1.0 / distance.max(0.1),
            GainModel::Unity => 1.0,
        };
        if is_image && physical.distance(pose.position) > distance {
            gain = 0.0;
        }
        RefPoint {
            prel,
            distance,
            gain: friendly_f64(gain),
        }
    }

    pub fn create_state(&self, sample_rate: f64, block_size: usize) -> EncoderState {
        self.encoder.create_state(sample_rate, block_size)
    }

    pub fn add_point_source(
        &mut self,
        prel: DVec3,
        width: f64,
        chunk: &[f32],
        state: &mut EncoderState,
    ) {
        self.encoder
            .add_point_source(prel, width, chunk, &mut self.outputs, state);
    }

    pub fn add_diffuse_source(&mut self, chunk: &FoaChunk, state: &mut EncoderState) {
        self.encoder.add_diffuse_source(chunk, &mut self.outputs, state);
    }

    pub fn postproc(&mut self) {
        self.encoder.postproc(&mut self.outputs);
    }

    pub fn clear_output(&mut self) {
        for channel in self.outputs.iter_mut() {
            channel.fill(0.0);
        }
    }

    /// Target of the mask gain ramp applied by [`Receiver::apply_gain`].
    pub fn set_next_gain(&mut self, gain: f32) {
        self.next_gain = gain;
        self.gain_zero = gain == 0.0 && self.gain == 0.0;
    }

    /// True when the receiver is fully masked and stays so for this block.
    pub fn is_gain_zero(&self) -> bool {
        self.gain_zero
    }

    /// Ramps the output gain toward the value set by [`Receiver::set_next_gain`].
    pub fn apply_gain(&mut self) {
        let n = self.outputs.first().map_or(0, Vec::len);
        let dg = (self.next_gain - self.gain) / n.max(1) as f32;
        for k in 0..n {
            let g = self.gain + dg * (k + 1) as f32;
            for channel in self.outputs.iter_mut() {
                channel[k] *= g;
            }
        }
        self.gain = self.next_gain;
    }
}
