//! Acoustic models: image sources, point-source propagation, diffraction,
//! diffuse-field propagation and receiver masks.
//!
//! One [`PointModel`] exists per (sound path, receiver) pair and one
//! [`DiffuseModel`] per (diffuse field, receiver) pair. Both are created in
//! `prepare()` and own all state of their pair, including the encoder state.

mod diffuse;
mod mask;
mod mirror;
mod obstacle;
mod point;

pub use diffuse::DiffuseModel;
pub use mask::receiver_mask_gain;
pub use mirror::{MirrorModel, MirrorSource};
pub use obstacle::{DiffractionState, diffract};
pub use point::{PathEnv, PointModel};

use crate::scene::SoundId;

/// Origin of a propagation path: a sound itself or one of its images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRef {
    Primary(SoundId),
    /// Index into [`MirrorModel::mirrors`]
    Image(usize),
}
