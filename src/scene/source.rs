use super::{Attributes, DynamicObject};
use crate::error::{AcousticaError, Result};
use crate::math::{DVec3, Euler, unit};
use crate::plugins::SourcePlugin;

/// Distance law applied by receivers to point sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainModel {
    /// `1 / max(0.1, d)`
    #[default]
    InverseDistance,
    Unity,
}

impl GainModel {
    /// Parses the conventional tags `"1/r"` and `"1"`.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "1/r" => Ok(Self::InverseDistance),
            "1" => Ok(Self::Unity),
            other => Err(AcousticaError::config(format!(
                "Invalid gain model {} (valid gain models: \"1/r\", \"1\")",
                other
            ))),
        }
    }
}

/// Radiation pattern of a sound, evaluated in the sound's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directivity {
    #[default]
    Omni,
    /// `0.5 + 0.5 cos(theta)` around the sound's x axis
    Cardioid,
}

impl Directivity {
    /// Gain toward `dir`, a direction in source coordinates.
    pub fn gain(&self, dir: DVec3) -> f64 {
        match self {
            Self::Omni => 1.0,
            Self::Cardioid => 0.5 + 0.5 * unit(dir).x,
        }
    }
}

/// Acoustic rendering settings of one sound.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    /// Render the direct path; image sources are rendered either way
    pub direct: bool,
    pub gain_model: GainModel,
    /// Physical size in meters, mapped to a source width by encoders
    pub size: f64,
    /// Delay line length in meters; `None` takes the render default
    pub max_distance: Option<f64>,
    pub air_absorption: bool,
    pub delayline: bool,
    /// Lowest image source order rendered (0 is the direct path)
    pub ism_min: u32,
    pub ism_max: u32,
    pub directivity: Directivity,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            direct: true,
            gain_model: GainModel::InverseDistance,
            size: 0.0,
            max_distance: None,
            air_absorption: true,
            delayline: true,
            ism_min: 0,
            ism_max: u32::MAX,
            directivity: Directivity::Omni,
        }
    }
}

impl SourceSettings {
    pub fn gain_model(mut self, model: GainModel) -> Self {
        self.gain_model = model;
        self
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn max_distance(mut self, distance: f64) -> Self {
        self.max_distance = Some(distance);
        self
    }

    pub fn air_absorption(mut self, enabled: bool) -> Self {
        self.air_absorption = enabled;
        self
    }

    pub fn delayline(mut self, enabled: bool) -> Self {
        self.delayline = enabled;
        self
    }

    pub fn direct(mut self, enabled: bool) -> Self {
        self.direct = enabled;
        self
    }

    pub fn ism_range(mut self, min: u32, max: u32) -> Self {
        self.ism_min = min;
        self.ism_max = max;
        self
    }

    pub fn directivity(mut self, directivity: Directivity) -> Self {
        self.directivity = directivity;
        self
    }

    /// Whether image source order `order` is inside the configured range.
    pub fn renders_order(&self, order: u32) -> bool {
        if order == 0 && !self.direct {
            return false;
        }
        self.ism_min <= order && order <= self.ism_max
    }
}

/// Signal-chain module attached to a sound, instantiated by tag.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDesc {
    pub tag: String,
    pub attributes: Attributes,
}

impl PluginDesc {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.attributes.set(key, value);
        self
    }
}

/// Declaration of one sound of a source object.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundDesc {
    pub name: String,
    /// Position relative to the owning object, in object coordinates
    pub offset: DVec3,
    /// Linear input gain
    pub gain: f64,
    pub settings: SourceSettings,
    pub plugins: Vec<PluginDesc>,
}

impl SoundDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: DVec3::ZERO,
            gain: 1.0,
            settings: SourceSettings::default(),
            plugins: Vec::new(),
        }
    }

    pub fn offset(mut self, offset: DVec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn gain_db(mut self, gain_db: f64) -> Self {
        self.gain = 10f64.powf(gain_db / 20.0);
        self
    }

    pub fn settings(mut self, settings: SourceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn plugin(mut self, plugin: PluginDesc) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// Moving object carrying one or more sounds.
#[derive(Debug, Clone)]
pub struct SourceObject {
    pub object: DynamicObject,
    pub sounds: Vec<SoundDesc>,
}

impl SourceObject {
    pub fn new(object: DynamicObject) -> Self {
        Self {
            object,
            sounds: Vec::new(),
        }
    }

    pub fn sound(mut self, sound: SoundDesc) -> Self {
        self.sounds.push(sound);
        self
    }
}

/// Runtime sound: one input port, one block of audio, a plugin chain and a
/// pose derived from its object each block.
pub struct SoundSource {
    /// Port name, `"<object>.<sound>"`
    pub name: String,
    /// Index of the owning object in [`super::Scene::source_objects`]
    pub object: usize,
    pub offset: DVec3,
    pub gain: f32,
    pub settings: SourceSettings,
    /// Resolved delay line length in meters
    pub max_distance: f64,
    pub(crate) audio: Vec<f32>,
    pub(crate) plugins: Vec<Box<dyn SourcePlugin>>,
    position: DVec3,
    orientation: Euler,
    active: bool,
}

impl SoundSource {
    pub(crate) fn new(
        name: String,
        object: usize,
        desc: &SoundDesc,
        max_distance: f64,
        block_size: usize,
        plugins: Vec<Box<dyn SourcePlugin>>,
    ) -> Self {
        Self {
            name,
            object,
            offset: desc.offset,
            gain: desc.gain as f32,
            settings: desc.settings.clone(),
            max_distance,
            audio: vec![0.0; block_size],
            plugins,
            position: DVec3::ZERO,
            orientation: Euler::ZERO,
            active: true,
        }
    }

    /// Places the sound on its object.
    pub(crate) fn update_from(&mut self, object: &DynamicObject) {
        let orientation = object.orientation();
        self.position = object.position() + orientation.rotate(self.offset);
        self.orientation = orientation;
        self.active = object.is_active();
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Position of the physical sound, used for image source visibility.
    pub fn physical_position(&self) -> DVec3 {
        self.position
    }

    pub fn orientation(&self) -> Euler {
        self.orientation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut [f32] {
        &mut self.audio
    }

    /// Directivity gain toward `receiver`, a world position.
    pub fn directivity_gain(&self, receiver: DVec3) -> f64 {
        match self.settings.directivity {
            Directivity::Omni => 1.0,
            d => d.gain(self.orientation.derotate(receiver - self.position)),
        }
    }
}
