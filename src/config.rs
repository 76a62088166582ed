//! Configuration for the render core

use crate::error::{AcousticaError, Result};

/// Global render parameters negotiated when the scene is prepared.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Fixed number of frames per `process()` call
    pub block_size: usize,
    /// Speed of sound in m/s
    pub speed_of_sound: f64,
    /// Maximum image source order (0 disables the mirror model)
    pub ism_order: u32,
    /// Time constant of the load profiler's moving average, in seconds
    pub profiler_tau: f64,
    /// Capacity of the diagnostics event channel
    pub event_capacity: usize,
    /// Delay line length, in meters, for sounds that do not set their own
    pub max_distance: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 1024,
            speed_of_sound: 340.0,
            ism_order: 1,
            profiler_tau: 2.0,
            event_capacity: 64,
            max_distance: 3700.0,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn speed_of_sound(mut self, c: f64) -> Self {
        self.speed_of_sound = c;
        self
    }

    pub fn ism_order(mut self, order: u32) -> Self {
        self.ism_order = order;
        self
    }

    pub fn profiler_tau(mut self, tau: f64) -> Self {
        self.profiler_tau = tau;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn max_distance(mut self, distance: f64) -> Self {
        self.max_distance = distance;
        self
    }

    /// Checks that the parameters describe a usable render setup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero sample rate or block size, or a
    /// non-positive speed of sound.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AcousticaError::config("Sample rate must be greater than 0"));
        }
        if self.block_size == 0 {
            return Err(AcousticaError::config("Block size must be greater than 0"));
        }
        if !(self.speed_of_sound > 0.0) {
            return Err(AcousticaError::config(format!(
                "Invalid speed of sound {}",
                self.speed_of_sound
            )));
        }
        Ok(())
    }

    /// Sample period in seconds.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RenderConfig::new().sample_rate(44100).block_size(64).ism_order(2);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 64);
        assert_eq!(config.ism_order, 2);
        assert_eq!(config.max_distance, 3700.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let config = RenderConfig::new().block_size(0);
        assert!(matches!(config.validate(), Err(AcousticaError::Configuration(_))));
    }
}
