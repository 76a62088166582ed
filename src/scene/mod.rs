//! Scene graph.
//!
//! A [`SceneDesc`] is the declarative tree handed to the render core. When
//! the core is prepared it is turned into a runtime [`Scene`]: encoders and
//! plugins are instantiated, buffers are allocated and clips are converted
//! to the render sample rate. Nodes live in owning vectors and refer to each
//! other through typed indices.

mod attributes;
mod diffuse;
mod face;
mod mask;
mod object;
mod receiver;
mod source;

pub use attributes::Attributes;
pub use diffuse::DiffuseField;
pub use face::{Obstacle, Reflector};
pub use mask::Mask;
pub use object::{DynamicObject, SoloState};
pub use receiver::{BoundingBox, Receiver, ReceiverDesc, ReceiverSettings, RefPoint};
pub use source::{
    Directivity, GainModel, PluginDesc, SoundDesc, SoundSource, SourceObject, SourceSettings,
};

use crate::audio_data::AudioClip;
use crate::config::RenderConfig;
use crate::error::{AcousticaError, Result};
use crate::plugins::{PluginContext, PluginRegistry};
use crate::receiver::{EncoderContext, EncoderRegistry};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

index_id!(
    /// Index of a sound in [`Scene::sounds`]
    SoundId
);
index_id!(
    /// Index of a reflector in [`Scene::reflectors`]
    ReflectorId
);
index_id!(
    /// Index of a receiver in [`Scene::receivers`]
    ReceiverId
);
index_id!(
    /// Index of a diffuse field in [`Scene::diffuse_fields`]
    DiffuseId
);

/// Declarative description of a scene.
#[derive(Debug, Clone)]
pub struct SceneDesc {
    pub name: String,
    /// Scene-wide switch; an inactive scene renders silence
    pub active: bool,
    pub sources: Vec<SourceObject>,
    pub diffuse_fields: Vec<DiffuseField>,
    pub reflectors: Vec<Reflector>,
    pub obstacles: Vec<Obstacle>,
    pub masks: Vec<Mask>,
    pub receivers: Vec<ReceiverDesc>,
    /// Decoded clips available to `clip` plugins
    pub clips: BTreeMap<String, AudioClip>,
}

impl SceneDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            sources: Vec::new(),
            diffuse_fields: Vec::new(),
            reflectors: Vec::new(),
            obstacles: Vec::new(),
            masks: Vec::new(),
            receivers: Vec::new(),
            clips: BTreeMap::new(),
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn source(mut self, source: SourceObject) -> Self {
        self.sources.push(source);
        self
    }

    pub fn diffuse_field(mut self, field: DiffuseField) -> Self {
        self.diffuse_fields.push(field);
        self
    }

    pub fn reflector(mut self, reflector: Reflector) -> Self {
        self.reflectors.push(reflector);
        self
    }

    pub fn obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn mask(mut self, mask: Mask) -> Self {
        self.masks.push(mask);
        self
    }

    pub fn receiver(mut self, receiver: ReceiverDesc) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn add_clip(&mut self, name: impl Into<String>, clip: AudioClip) {
        self.clips.insert(name.into(), clip);
    }
}

/// Runtime scene graph owned by the prepared render core.
pub struct Scene {
    pub name: String,
    pub active: bool,
    pub source_objects: Vec<DynamicObject>,
    pub sounds: Vec<SoundSource>,
    pub diffuse_fields: Vec<DiffuseField>,
    pub reflectors: Vec<Reflector>,
    pub obstacles: Vec<Obstacle>,
    pub masks: Vec<Mask>,
    pub receivers: Vec<Receiver>,
}

impl Scene {
    /// Instantiates `desc` for the given render parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid render parameters, unknown
    /// encoder or plugin tags, or duplicate port names. Encoder, plugin and
    /// clip errors are passed through.
    pub fn build(
        desc: &SceneDesc,
        config: &RenderConfig,
        encoders: &EncoderRegistry,
        plugins: &PluginRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let fs = config.sample_rate as f64;
        let block_size = config.block_size;

        let mut clips = BTreeMap::new();
        for (name, clip) in &desc.clips {
            debug!(
                "clip \"{}\": {} frames at {} Hz",
                name,
                clip.frames(),
                clip.sample_rate()
            );
            clips.insert(name.clone(), clip.resample(config.sample_rate)?);
        }

        let mut source_objects = Vec::with_capacity(desc.sources.len());
        let mut sounds = Vec::new();
        for (index, source) in desc.sources.iter().enumerate() {
            for sound in &source.sounds {
                let name = format!("{}.{}", source.object.name, sound.name);
                let mut chain = Vec::with_capacity(sound.plugins.len());
                for plugin in &sound.plugins {
                    let ctx = PluginContext {
                        attributes: &plugin.attributes,
                        clips: &clips,
                        sample_rate: fs,
                        block_size,
                    };
                    chain.push(plugins.create(&plugin.tag, &ctx)?);
                }
                let max_distance = sound.settings.max_distance.unwrap_or(config.max_distance);
                debug!(
                    "sound \"{}\": {} plugins, max distance {} m",
                    name,
                    chain.len(),
                    max_distance
                );
                sounds.push(SoundSource::new(
                    name,
                    index,
                    sound,
                    max_distance,
                    block_size,
                    chain,
                ));
            }
            source_objects.push(source.object.clone());
        }

        let mut diffuse_fields = desc.diffuse_fields.clone();
        for field in diffuse_fields.iter_mut() {
            field.allocate(block_size);
        }

        let mut receivers = Vec::with_capacity(desc.receivers.len());
        for receiver in &desc.receivers {
            let ctx = EncoderContext {
                attributes: &receiver.attributes,
                speakers: receiver.speakers.as_ref(),
                sample_rate: fs,
                block_size,
                speed_of_sound: config.speed_of_sound,
            };
            let encoder = encoders.create(&receiver.encoder, &ctx)?;
            debug!(
                "receiver \"{}\": {} with {} channels",
                receiver.object.name,
                encoder.type_name(),
                encoder.num_channels()
            );
            receivers.push(Receiver::new(receiver, encoder, block_size));
        }

        let scene = Self {
            name: desc.name.clone(),
            active: desc.active,
            source_objects,
            sounds,
            diffuse_fields,
            reflectors: desc.reflectors.clone(),
            obstacles: desc.obstacles.clone(),
            masks: desc.masks.clone(),
            receivers,
        };
        Self::check_unique(&scene.input_port_names(), "input")?;
        Self::check_unique(&scene.output_port_names(), "output")?;

        info!(
            "scene \"{}\": {} sounds, {} diffuse fields, {} reflectors, {} obstacles, {} masks, \
             {} receivers",
            scene.name,
            scene.sounds.len(),
            scene.diffuse_fields.len(),
            scene.reflectors.len(),
            scene.obstacles.len(),
            scene.masks.len(),
            scene.receivers.len()
        );
        Ok(scene)
    }

    fn check_unique(names: &[String], kind: &str) -> Result<()> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(AcousticaError::config(format!(
                    "Duplicate {} port \"{}\"",
                    kind, name
                )));
            }
        }
        Ok(())
    }

    /// Moves every object to its pose at session time `t`.
    pub fn geometry_update(&mut self, t: f64) {
        for object in self.source_objects.iter_mut() {
            object.geometry_update(t);
        }
        for sound in self.sounds.iter_mut() {
            sound.update_from(&self.source_objects[sound.object]);
        }
        for field in self.diffuse_fields.iter_mut() {
            field.object.geometry_update(t);
        }
        for reflector in self.reflectors.iter_mut() {
            reflector.geometry_update(t);
        }
        for obstacle in self.obstacles.iter_mut() {
            obstacle.geometry_update(t);
        }
        for mask in self.masks.iter_mut() {
            mask.object.geometry_update(t);
        }
        for receiver in self.receivers.iter_mut() {
            receiver.object.geometry_update(t);
        }
    }

    fn objects(&self) -> impl Iterator<Item = &DynamicObject> {
        self.source_objects
            .iter()
            .chain(self.diffuse_fields.iter().map(|f| &f.object))
            .chain(self.reflectors.iter().map(|r| &r.object))
            .chain(self.obstacles.iter().map(|o| &o.object))
            .chain(self.masks.iter().map(|m| &m.object))
            .chain(self.receivers.iter().map(|r| &r.object))
    }

    /// Solo flags of every object in the scene.
    pub fn solo_state(&self) -> SoloState {
        SoloState::from_flags(self.objects())
    }

    /// Updates the active flag of every object.
    pub fn process_active(&mut self, t: f64, solo: &SoloState) {
        for object in self.source_objects.iter_mut() {
            object.process_active(t, solo);
        }
        for sound in self.sounds.iter_mut() {
            sound.set_active(self.source_objects[sound.object].is_active());
        }
        for field in self.diffuse_fields.iter_mut() {
            field.object.process_active(t, solo);
        }
        for reflector in self.reflectors.iter_mut() {
            reflector.object.process_active(t, solo);
        }
        for obstacle in self.obstacles.iter_mut() {
            obstacle.object.process_active(t, solo);
        }
        for mask in self.masks.iter_mut() {
            mask.object.process_active(t, solo);
        }
        for receiver in self.receivers.iter_mut() {
            receiver.object.process_active(t, solo);
        }
    }

    /// Sounds in declaration order, then four ports per diffuse field.
    pub fn input_port_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sounds.iter().map(|s| s.name.clone()).collect();
        for field in &self.diffuse_fields {
            for label in DiffuseField::CHANNEL_LABELS {
                names.push(format!("{}.{}", field.name(), label));
            }
        }
        names
    }

    /// Receivers in declaration order, each with all of its channels.
    pub fn output_port_names(&self) -> Vec<String> {
        self.receivers.iter().flat_map(|r| r.port_names()).collect()
    }

    pub fn num_inputs(&self) -> usize {
        self.sounds.len() + 4 * self.diffuse_fields.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.receivers.iter().map(Receiver::num_channels).sum()
    }

    pub fn sound(&self, id: SoundId) -> Option<&SoundSource> {
        self.sounds.get(id.0)
    }

    pub fn sound_mut(&mut self, id: SoundId) -> Option<&mut SoundSource> {
        self.sounds.get_mut(id.0)
    }

    /// Looks a sound up by port name.
    pub fn find_sound(&self, name: &str) -> Option<SoundId> {
        self.sounds.iter().position(|s| s.name == name).map(SoundId)
    }

    pub fn receiver(&self, id: ReceiverId) -> Option<&Receiver> {
        self.receivers.get(id.0)
    }

    pub fn receiver_mut(&mut self, id: ReceiverId) -> Option<&mut Receiver> {
        self.receivers.get_mut(id.0)
    }

    pub fn find_receiver(&self, name: &str) -> Option<ReceiverId> {
        self.receivers.iter().position(|r| r.name() == name).map(ReceiverId)
    }

    pub fn reflector(&self, id: ReflectorId) -> Option<&Reflector> {
        self.reflectors.get(id.0)
    }

    pub fn reflector_mut(&mut self, id: ReflectorId) -> Option<&mut Reflector> {
        self.reflectors.get_mut(id.0)
    }

    pub fn diffuse_field(&self, id: DiffuseId) -> Option<&DiffuseField> {
        self.diffuse_fields.get(id.0)
    }

    /// First object of any kind named `name`, for live edits such as mute
    /// and solo.
    pub fn object_mut(&mut self, name: &str) -> Option<&mut DynamicObject> {
        self.source_objects
            .iter_mut()
            .chain(self.diffuse_fields.iter_mut().map(|f| &mut f.object))
            .chain(self.reflectors.iter_mut().map(|r| &mut r.object))
            .chain(self.obstacles.iter_mut().map(|o| &mut o.object))
            .chain(self.masks.iter_mut().map(|m| &mut m.object))
            .chain(self.receivers.iter_mut().map(|r| &mut r.object))
            .find(|o| o.name == name)
    }
}
