use super::{
    CardioidMic, FirstOrderAmbisonic, Hoa2d, NearestSpeaker, Omni, OrtfPair, ReceiverEncoder,
    SpeakerLayout, Vbap2d,
};
use crate::error::{AcousticaError, Result};
use crate::scene::Attributes;
use std::collections::HashMap;

/// Everything an encoder factory may query.
pub struct EncoderContext<'a> {
    pub attributes: &'a Attributes,
    pub speakers: Option<&'a SpeakerLayout>,
    pub sample_rate: f64,
    pub block_size: usize,
    pub speed_of_sound: f64,
}

impl EncoderContext<'_> {
    /// The speaker layout, required by loudspeaker based encoders.
    pub fn require_speakers(&self, what: &str) -> Result<&SpeakerLayout> {
        self.speakers.ok_or_else(|| {
            AcousticaError::Encoder(format!("Receiver type {} requires a speaker layout", what))
        })
    }
}

pub type EncoderFactory = fn(&EncoderContext) -> Result<Box<dyn ReceiverEncoder>>;

/// Table of receiver encoders keyed by type tag.
#[derive(Clone)]
pub struct EncoderRegistry {
    factories: HashMap<String, EncoderFactory>,
}

impl EncoderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in encoder.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("omni", |ctx| Ok(Box::new(Omni::new(ctx)?)));
        registry.register("amb1h0v", |ctx| {
            Ok(Box::new(FirstOrderAmbisonic::horizontal(ctx)?))
        });
        registry.register("amb1h1v", |ctx| {
            Ok(Box::new(FirstOrderAmbisonic::periphonic(ctx)?))
        });
        registry.register("hoa2d", |ctx| Ok(Box::new(Hoa2d::new(ctx)?)));
        registry.register("nsp", |ctx| Ok(Box::new(NearestSpeaker::new(ctx)?)));
        registry.register("vbap", |ctx| Ok(Box::new(Vbap2d::new(ctx)?)));
        registry.register("ortf", |ctx| Ok(Box::new(OrtfPair::new(ctx)?)));
        registry.register("cardioid", |ctx| Ok(Box::new(CardioidMic::new(ctx)?)));
        registry
    }

    /// Adds or replaces the factory for `tag`.
    pub fn register(&mut self, tag: &str, factory: EncoderFactory) {
        self.factories.insert(tag.to_string(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Instantiates the encoder registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown tags, or the factory's own error.
    pub fn create(&self, tag: &str, ctx: &EncoderContext) -> Result<Box<dyn ReceiverEncoder>> {
        let factory = self.factories.get(tag).ok_or_else(|| {
            AcousticaError::config(format!("Unknown receiver type \"{}\"", tag))
        })?;
        factory(ctx)
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(
        attributes: &'a Attributes,
        speakers: Option<&'a SpeakerLayout>,
    ) -> EncoderContext<'a> {
        EncoderContext {
            attributes,
            speakers,
            sample_rate: 48000.0,
            block_size: 64,
            speed_of_sound: 340.0,
        }
    }

    #[test]
    fn test_builtin_tags() {
        let registry = EncoderRegistry::with_builtin();
        assert_eq!(
            registry.tags(),
            vec!["amb1h0v", "amb1h1v", "cardioid", "hoa2d", "nsp", "omni", "ortf", "vbap"]
        );
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let registry = EncoderRegistry::with_builtin();
        let attrs = Attributes::new();
        let err = registry.create("wfs", &context(&attrs, None)).err().unwrap();
        assert!(matches!(err, AcousticaError::Configuration(_)));
    }

    #[test]
    fn test_speaker_encoder_needs_layout() {
        let registry = EncoderRegistry::with_builtin();
        let attrs = Attributes::new();
        assert!(registry.create("nsp", &context(&attrs, None)).is_err());
        let layout = SpeakerLayout::ring(8, 1.0);
        let enc = registry.create("hoa2d", &context(&attrs, Some(&layout))).unwrap();
        assert_eq!(enc.num_channels(), 8);
        assert_eq!(enc.type_name(), "hoa2d");
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = EncoderRegistry::new();
        registry.register("mono", |ctx| Ok(Box::new(Omni::new(ctx)?)));
        let attrs = Attributes::new();
        let enc = registry.create("mono", &context(&attrs, None)).unwrap();
        assert_eq!(enc.num_channels(), 1);
    }
}
