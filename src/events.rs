//! Diagnostics reported by the render core.
//!
//! Events are sent from the audio thread with `try_send` on a bounded
//! channel; when observers fall behind, events are dropped rather than
//! blocking the audio thread.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Prepared {
        sample_rate: u32,
        block_size: usize,
    },
    Released,
    /// The scene was replaced by `reload()`
    Reloaded,
    /// A block was rendered as silence because the scene was locked
    BlockSkipped {
        total_skipped: u64,
    },
    /// Smoothed processing load, sent about once per second
    Timing(LoadProfile),
}

impl RenderEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::BlockSkipped { .. })
    }

    /// Logs the event on the observer thread. Skipped blocks are reported
    /// at power-of-two totals.
    pub fn log(&self) {
        match self {
            Self::Prepared {
                sample_rate,
                block_size,
            } => log::debug!("render core prepared: {} Hz, {} frames", sample_rate, block_size),
            Self::Released => log::debug!("render core released"),
            Self::Reloaded => log::debug!("scene reloaded"),
            Self::BlockSkipped { total_skipped } => {
                if total_skipped.is_power_of_two() {
                    log::warn!("{} blocks skipped while the scene was locked", total_skipped);
                }
            }
            Self::Timing(profile) => log::trace!(
                "load {:.1}% (acoustic {:.1}%)",
                100.0 * profile.total(),
                100.0 * profile.acoustic
            ),
        }
    }
}

/// Processing time per stage as a fraction of the block period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadProfile {
    pub init: f64,
    pub geometry: f64,
    pub preprocess: f64,
    pub acoustic: f64,
    pub postproc: f64,
}

impl LoadProfile {
    pub fn total(&self) -> f64 {
        self.init + self.geometry + self.preprocess + self.acoustic + self.postproc
    }
}

/// Exponential moving average of the stage timings.
#[derive(Debug, Clone)]
pub struct LoadProfiler {
    block_period: f64,
    alpha: f64,
    profile: LoadProfile,
}

impl LoadProfiler {
    /// # Arguments
    /// * `block_period` - Duration of one block in seconds
    /// * `tau` - Time constant of the average in seconds
    pub fn new(block_period: f64, tau: f64) -> Self {
        let alpha = if tau > 0.0 {
            1.0 - (-block_period / tau).exp()
        } else {
            1.0
        };
        Self {
            block_period,
            alpha,
            profile: LoadProfile::default(),
        }
    }

    /// Folds the stage durations of one block into the average.
    pub fn update(&mut self, stages: [Duration; 5]) {
        let [init, geometry, preprocess, acoustic, postproc] =
            stages.map(|d| d.as_secs_f64() / self.block_period);
        let a = self.alpha;
        let p = &mut self.profile;
        p.init += a * (init - p.init);
        p.geometry += a * (geometry - p.geometry);
        p.preprocess += a * (preprocess - p.preprocess);
        p.acoustic += a * (acoustic - p.acoustic);
        p.postproc += a * (postproc - p.postproc);
    }

    pub fn profile(&self) -> LoadProfile {
        self.profile
    }
}
