use super::DynamicObject;
use crate::dsp::FoaChunk;
use crate::geometry::Shoebox;
use crate::math::DVec3;

/// Box-shaped region filled with a first-order ambisonic sound field.
///
/// The field is fed through four input ports (`.0w .1x .1y .1z`) and is
/// audible at full level inside the box, fading out over `falloff` meters.
#[derive(Debug, Clone)]
pub struct DiffuseField {
    pub object: DynamicObject,
    pub size: DVec3,
    pub falloff: f64,
    /// Linear input gain
    pub gain: f64,
    pub active: bool,
    pub(crate) audio: FoaChunk,
}

impl DiffuseField {
    pub fn new(object: DynamicObject, size: DVec3) -> Self {
        Self {
            object,
            size,
            falloff: 1.0,
            gain: 1.0,
            active: true,
            audio: FoaChunk::new(0),
        }
    }

    pub fn falloff(mut self, falloff: f64) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn gain_db(mut self, gain_db: f64) -> Self {
        self.gain = 10f64.powf(gain_db / 20.0);
        self
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    /// Box at the current pose.
    pub fn shoebox(&self) -> Shoebox {
        Shoebox::new(self.object.position(), self.size, self.object.orientation())
    }

    pub fn is_active(&self) -> bool {
        self.active && self.object.is_active()
    }

    pub fn audio(&self) -> &FoaChunk {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut FoaChunk {
        &mut self.audio
    }

    pub(crate) fn allocate(&mut self, block_size: usize) {
        self.audio = FoaChunk::new(block_size);
    }

    /// Port suffixes of the four components, in input order.
    pub const CHANNEL_LABELS: [&'static str; 4] = ["0w", "1x", "1y", "1z"];
}
