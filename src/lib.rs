//! # acoustica
//!
//! Real-time acoustic scene renderer. A scene of moving sound sources,
//! first-order diffuse fields, reflecting faces, obstacles, masks and
//! receivers is rendered once per fixed-size audio block: direct sound and
//! image-source reflections are delayed, attenuated and air-filtered per
//! receiver, then encoded into the receiver's output format.
//!
//! ```no_run
//! use acoustica::{DVec3, DynamicObject, Euler, ReceiverDesc, RenderConfig, RenderCore};
//! use acoustica::{SceneDesc, SoundDesc, SourceObject, Transport};
//!
//! let scene = SceneDesc::new("demo")
//!     .source(
//!         SourceObject::new(DynamicObject::fixed("bird", DVec3::new(2.0, 1.0, 0.0), Euler::ZERO))
//!             .sound(SoundDesc::new("0")),
//!     )
//!     .receiver(ReceiverDesc::new(DynamicObject::new("main"), "amb1h0v"));
//!
//! let core = RenderCore::new(scene, RenderConfig::new());
//! core.prepare(48000, 1024)?;
//!
//! let input = vec![0.0f32; 1024];
//! let mut outputs = vec![vec![0.0f32; 1024]; core.output_port_names().len()];
//! let mut ports: Vec<&mut [f32]> = outputs.iter_mut().map(|c| c.as_mut_slice()).collect();
//! core.process(1024, &Transport::default(), &[&input], &mut ports);
//! # Ok::<(), acoustica::AcousticaError>(())
//! ```

pub mod acoustics;
pub mod audio_data;
pub mod config;
pub mod dsp;
#[cfg(feature = "device")]
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod math;
pub mod plugins;
pub mod receiver;
pub mod render;
pub mod scene;
pub mod world;

pub use audio_data::AudioClip;
pub use config::RenderConfig;
#[cfg(feature = "device")]
pub use engine::DeviceBinding;
pub use error::{AcousticaError, Result};
pub use events::{LoadProfile, RenderEvent};
pub use math::{DVec3, Euler};
pub use plugins::{PluginRegistry, SourcePlugin};
pub use receiver::{EncoderRegistry, ReceiverEncoder};
pub use render::{RenderCore, Transport};
pub use scene::{
    DiffuseField, DynamicObject, Mask, Obstacle, ReceiverDesc, ReceiverSettings, Reflector,
    SceneDesc, SoundDesc, SourceObject, SourceSettings,
};
pub use world::{ActivityCounts, World};
