//! Error types for acoustica

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcousticaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Receiver encoder error: {0}")]
    Encoder(String),

    #[error("Source plugin error: {0}")]
    Plugin(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcousticaError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AcousticaError>;
