//! Signal-chain modules applied to a sound's input before propagation.
//!
//! Plugins are instantiated by tag through a [`PluginRegistry`] when the scene
//! is prepared and run in declaration order on every block, after the input
//! port has been copied into the sound's buffer.

use crate::audio_data::AudioClip;
use crate::dsp::OnePole;
use crate::error::{AcousticaError, Result};
use crate::render::Transport;
use crate::scene::Attributes;
use std::collections::{BTreeMap, HashMap};

pub trait SourcePlugin: Send {
    fn type_name(&self) -> &'static str;

    /// Processes one block in place.
    fn process(&mut self, chunk: &mut [f32], transport: &Transport);
}

/// Everything a plugin factory may query.
pub struct PluginContext<'a> {
    pub attributes: &'a Attributes,
    /// Clips of the scene, already at the render sample rate
    pub clips: &'a BTreeMap<String, AudioClip>,
    pub sample_rate: f64,
    pub block_size: usize,
}

pub type PluginFactory = fn(&PluginContext) -> Result<Box<dyn SourcePlugin>>;

/// Table of source plugins keyed by type tag.
#[derive(Clone)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with `gain`, `clip` and `lowpass`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("gain", |ctx| Ok(Box::new(GainPlugin::new(ctx)?)));
        registry.register("clip", |ctx| Ok(Box::new(ClipPlayer::new(ctx)?)));
        registry.register("lowpass", |ctx| Ok(Box::new(LowPassPlugin::new(ctx)?)));
        registry
    }

    pub fn register(&mut self, tag: &str, factory: PluginFactory) {
        self.factories.insert(tag.to_string(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Instantiates the plugin registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown tags, or the factory's own error.
    pub fn create(&self, tag: &str, ctx: &PluginContext) -> Result<Box<dyn SourcePlugin>> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| AcousticaError::config(format!("Unknown source plugin \"{}\"", tag)))?;
        factory(ctx)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Constant gain, attribute `gain` in dB.
pub struct GainPlugin {
    gain: f32,
}

impl GainPlugin {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        Ok(Self {
            gain: ctx.attributes.get_db("gain", 0.0)? as f32,
        })
    }
}

impl SourcePlugin for GainPlugin {
    fn type_name(&self) -> &'static str {
        "gain"
    }

    fn process(&mut self, chunk: &mut [f32], _transport: &Transport) {
        for x in chunk.iter_mut() {
            *x *= self.gain;
        }
    }
}

/// One-pole low-pass, attribute `fc` in Hz.
pub struct LowPassPlugin {
    filter: OnePole,
}

impl LowPassPlugin {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        let fc: f64 = ctx.attributes.get_or("fc", 1000.0)?;
        if !(fc > 0.0) {
            return Err(AcousticaError::Plugin(format!(
                "Low-pass cutoff must be positive, got {}",
                fc
            )));
        }
        Ok(Self {
            filter: OnePole::with_cutoff(fc, ctx.sample_rate),
        })
    }
}

impl SourcePlugin for LowPassPlugin {
    fn type_name(&self) -> &'static str {
        "lowpass"
    }

    fn process(&mut self, chunk: &mut [f32], _transport: &Transport) {
        self.filter.process(chunk);
    }
}

/// Mixes one channel of a clip into the block while the transport rolls.
///
/// Playback is locked to the session time: the clip starts at `start`
/// seconds and is repeated `loop` times (0 repeats forever).
pub struct ClipPlayer {
    data: Vec<f32>,
    start: u64,
    loops: u64,
    gain: f32,
}

impl ClipPlayer {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        let attrs = ctx.attributes;
        let name = attrs
            .get_str("clip")
            .ok_or_else(|| {
                AcousticaError::Plugin("Clip player requires a \"clip\" attribute".into())
            })?;
        let clip = ctx
            .clips
            .get(name)
            .ok_or_else(|| AcousticaError::Plugin(format!("No clip named \"{}\"", name)))?;
        if clip.sample_rate() as f64 != ctx.sample_rate {
            return Err(AcousticaError::Plugin(format!(
                "Clip \"{}\" runs at {} Hz, expected {} Hz",
                name,
                clip.sample_rate(),
                ctx.sample_rate
            )));
        }
        let start: f64 = attrs.get_or("start", 0.0)?;
        Ok(Self {
            data: clip.channel_samples(attrs.get_or("channel", 0usize)?)?,
            start: (start.max(0.0) * ctx.sample_rate).round() as u64,
            loops: attrs.get_or("loop", 1u64)?,
            gain: attrs.get_db("gain", 0.0)? as f32,
        })
    }

    fn sample_at(&self, t: u64) -> f32 {
        let len = self.data.len() as u64;
        if len == 0 || t < self.start {
            return 0.0;
        }
        let pos = t - self.start;
        if self.loops > 0 && pos >= len * self.loops {
            return 0.0;
        }
        self.data[(pos % len) as usize]
    }
}

impl SourcePlugin for ClipPlayer {
    fn type_name(&self) -> &'static str {
        "clip"
    }

    fn process(&mut self, chunk: &mut [f32], transport: &Transport) {
        if !transport.rolling {
            return;
        }
        for (k, x) in chunk.iter_mut().enumerate() {
            *x += self.gain * self.sample_at(transport.session_time_samples + k as u64);
        }
    }
}
