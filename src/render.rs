//! Render core: prepare/release lifecycle and the real-time block callback.
//!
//! The prepared state (runtime scene plus world) lives behind a mutex. The
//! audio thread only ever calls `try_lock`; when a reconfiguration thread
//! holds the lock the block is rendered as silence and reported as skipped.

use crate::config::RenderConfig;
use crate::dsp::{friendly, friendly_limited};
use crate::error::{AcousticaError, Result};
use crate::events::{LoadProfiler, RenderEvent};
use crate::plugins::PluginRegistry;
use crate::receiver::EncoderRegistry;
use crate::scene::{Scene, SceneDesc};
use crate::world::{ActivityCounts, World};
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};
use std::time::Instant;

/// Transport state handed to every block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transport {
    pub rolling: bool,
    pub session_time_samples: u64,
    pub session_time_seconds: f64,
}

impl Transport {
    /// Rolling transport at `samples`.
    pub fn rolling_at(samples: u64, sample_rate: u32) -> Self {
        Self {
            rolling: true,
            session_time_samples: samples,
            session_time_seconds: samples as f64 / sample_rate as f64,
        }
    }
}

struct Prepared {
    config: RenderConfig,
    scene: Scene,
    world: World,
    profiler: LoadProfiler,
    blocks: u64,
    timing_interval: u64,
}

impl Prepared {
    fn new(
        desc: &SceneDesc,
        config: RenderConfig,
        encoders: &EncoderRegistry,
        plugins: &PluginRegistry,
    ) -> Result<Self> {
        let mut scene = Scene::build(desc, &config, encoders, plugins)?;
        scene.geometry_update(0.0);
        let solo = scene.solo_state();
        scene.process_active(0.0, &solo);
        let world = World::new(&scene, &config);
        let block_period = config.block_size as f64 / config.sample_rate as f64;
        Ok(Self {
            profiler: LoadProfiler::new(block_period, config.profiler_tau),
            timing_interval: (1.0 / block_period).ceil().max(1.0) as u64,
            blocks: 0,
            config,
            scene,
            world,
        })
    }

    fn process(
        &mut self,
        nframes: usize,
        transport: &Transport,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        events: &Sender<RenderEvent>,
    ) -> ActivityCounts {
        let t_start = Instant::now();
        silence(outputs);
        if !self.scene.active || nframes != self.config.block_size {
            return ActivityCounts::default();
        }
        let t_init = Instant::now();

        let t = transport.session_time_seconds;
        self.scene.geometry_update(t);
        let solo = self.scene.solo_state();
        self.scene.process_active(t, &solo);
        let t_geometry = Instant::now();

        let mut inputs = inputs.iter();
        for sound in self.scene.sounds.iter_mut() {
            copy_scaled(&mut sound.audio, inputs.next().copied(), sound.gain);
            for plugin in sound.plugins.iter_mut() {
                plugin.process(&mut sound.audio, transport);
            }
        }
        for field in self.scene.diffuse_fields.iter_mut() {
            let gain = field.gain as f32;
            for channel in field.audio.channels_mut() {
                copy_scaled(channel, inputs.next().copied(), gain);
            }
        }
        let t_preprocess = Instant::now();

        let counts = self.world.process(&mut self.scene, transport);
        let t_acoustic = Instant::now();

        let mut outputs = outputs.iter_mut();
        for receiver in &self.scene.receivers {
            let gain = receiver.settings.gain as f32;
            for channel in receiver.outputs() {
                if let Some(out) = outputs.next() {
                    for (o, x) in out.iter_mut().zip(channel) {
                        *o = friendly_limited(gain * x);
                    }
                }
            }
        }
        let t_end = Instant::now();

        self.profiler.update([
            t_init - t_start,
            t_geometry - t_init,
            t_preprocess - t_geometry,
            t_acoustic - t_preprocess,
            t_end - t_acoustic,
        ]);
        self.blocks += 1;
        if self.blocks % self.timing_interval == 0 {
            let _ = events.try_send(RenderEvent::Timing(self.profiler.profile()));
        }
        counts
    }
}

fn silence(outputs: &mut [&mut [f32]]) {
    for out in outputs.iter_mut() {
        out.fill(0.0);
    }
}

/// Copies a sanitized, scaled input port into `dst`; missing ports are silent.
fn copy_scaled(dst: &mut [f32], src: Option<&[f32]>, gain: f32) {
    match src {
        Some(src) => {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = gain * friendly(*s);
            }
        }
        None => dst.fill(0.0),
    }
}

/// Thread-safe render core.
///
/// `prepare`, `release` and `reload` are called from a control thread and
/// may block; `process` is called from the audio thread and never blocks.
pub struct RenderCore {
    base_config: RenderConfig,
    desc: Mutex<SceneDesc>,
    encoders: EncoderRegistry,
    plugins: PluginRegistry,
    prepared: Mutex<Option<Prepared>>,
    skipped: AtomicU64,
    event_tx: Sender<RenderEvent>,
    event_rx: Receiver<RenderEvent>,
}

impl RenderCore {
    /// Creates an unprepared core with the built-in encoders and plugins.
    pub fn new(desc: SceneDesc, config: RenderConfig) -> Self {
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));
        Self {
            base_config: config,
            desc: Mutex::new(desc),
            encoders: EncoderRegistry::with_builtin(),
            plugins: PluginRegistry::with_builtin(),
            prepared: Mutex::new(None),
            skipped: AtomicU64::new(0),
            event_tx,
            event_rx,
        }
    }

    pub fn with_encoders(mut self, encoders: EncoderRegistry) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Receiving end of the diagnostics channel.
    pub fn events(&self) -> Receiver<RenderEvent> {
        self.event_rx.clone()
    }

    /// Builds the runtime scene and world for the negotiated stream format.
    ///
    /// Any previously prepared state is released first; on failure nothing
    /// stays prepared.
    ///
    /// # Errors
    ///
    /// Returns the configuration, encoder or plugin error that stopped the
    /// scene from being built.
    pub fn prepare(&self, sample_rate: u32, block_size: usize) -> Result<()> {
        let config = self
            .base_config
            .clone()
            .sample_rate(sample_rate)
            .block_size(block_size);
        let mut prepared = self.prepared.lock().unwrap_or_else(PoisonError::into_inner);
        *prepared = None;
        let desc = self.desc.lock().unwrap_or_else(PoisonError::into_inner);
        *prepared = Some(Prepared::new(&desc, config, &self.encoders, &self.plugins)?);
        info!(
            "prepared scene \"{}\" at {} Hz, {} frames per block",
            desc.name, sample_rate, block_size
        );
        let _ = self.event_tx.try_send(RenderEvent::Prepared {
            sample_rate,
            block_size,
        });
        Ok(())
    }

    /// Drops the runtime scene and world. Calling it again is a no-op.
    pub fn release(&self) {
        let mut prepared = self.prepared.lock().unwrap_or_else(PoisonError::into_inner);
        if prepared.take().is_some() {
            info!("released render core");
            let _ = self.event_tx.try_send(RenderEvent::Released);
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replaces the scene description. When prepared, the new scene is built
    /// with the current stream format before the old one is dropped.
    ///
    /// # Errors
    ///
    /// Returns the build error; the previous scene then keeps rendering.
    pub fn reload(&self, desc: SceneDesc) -> Result<()> {
        let mut prepared = self.prepared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = prepared.as_ref() {
            let next = Prepared::new(&desc, current.config.clone(), &self.encoders, &self.plugins)
                .inspect_err(|e| warn!("reload of scene \"{}\" failed: {}", desc.name, e))?;
            *prepared = Some(next);
        }
        info!("reloaded scene \"{}\"", desc.name);
        *self.desc.lock().unwrap_or_else(PoisonError::into_inner) = desc;
        let _ = self.event_tx.try_send(RenderEvent::Reloaded);
        Ok(())
    }

    /// Runs `f` on the prepared scene, blocking until the lock is free.
    ///
    /// # Errors
    ///
    /// Returns an engine error when the core is not prepared.
    pub fn with_scene_mut<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> Result<R> {
        let mut prepared = self.prepared.lock().unwrap_or_else(PoisonError::into_inner);
        let prepared = prepared
            .as_mut()
            .ok_or_else(|| AcousticaError::Engine("Render core is not prepared".into()))?;
        Ok(f(&mut prepared.scene))
    }

    /// Input port names of the prepared scene.
    pub fn input_port_names(&self) -> Vec<String> {
        self.with_scene_mut(|scene| scene.input_port_names())
            .unwrap_or_default()
    }

    /// Output port names of the prepared scene.
    pub fn output_port_names(&self) -> Vec<String> {
        self.with_scene_mut(|scene| scene.output_port_names())
            .unwrap_or_default()
    }

    /// Number of blocks rendered as silence because of lock contention.
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Renders one block.
    ///
    /// `inputs` are matched to the input ports in order and `outputs` to the
    /// output ports; missing inputs count as silence. Outputs are silent
    /// while the core is unprepared, the scene is inactive, `nframes` differs
    /// from the prepared block size or the lock is held elsewhere.
    pub fn process(
        &self,
        nframes: usize,
        transport: &Transport,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> ActivityCounts {
        let mut guard = match self.prepared.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                silence(outputs);
                let total_skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                let _ = self
                    .event_tx
                    .try_send(RenderEvent::BlockSkipped { total_skipped });
                return ActivityCounts::default();
            }
        };
        match guard.as_mut() {
            Some(prepared) => prepared.process(nframes, transport, inputs, outputs, &self.event_tx),
            None => {
                silence(outputs);
                ActivityCounts::default()
            }
        }
    }
}

impl Drop for RenderCore {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{DVec3, Euler};
    use crate::geometry::Polygon;
    use crate::receiver::SpeakerLayout;
    use crate::scene::{
        DiffuseField, DynamicObject, ReceiverDesc, Reflector, SoundDesc, SourceObject,
    };

    const BLOCK: usize = 256;

    fn init_logger() {
        let _ = env_logger::Builder::from_default_env()
            .is_test(true)
            .try_init();
    }

    fn scene() -> SceneDesc {
        SceneDesc::new("test")
            .source(
                SourceObject::new(DynamicObject::fixed(
                    "src",
                    DVec3::new(1.0, 0.0, 0.0),
                    Euler::ZERO,
                ))
                    .sound(SoundDesc::new("0")),
            )
            .receiver(ReceiverDesc::new(
                DynamicObject::fixed("out", DVec3::ZERO, Euler::ZERO),
                "omni",
            ))
    }

    fn run_block(core: &RenderCore, input: f32) -> (Vec<f32>, ActivityCounts) {
        let input = vec![input; BLOCK];
        let mut out = vec![1.0f32; BLOCK];
        let counts = core.process(
            BLOCK,
            &Transport::rolling_at(0, 48000),
            &[&input],
            &mut [&mut out],
        );
        (out, counts)
    }

    #[test]
    fn test_renders_after_prepare() {
        init_logger();
        let core = RenderCore::new(scene(), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        assert_eq!(core.input_port_names(), vec!["src.0"]);
        assert_eq!(core.output_port_names(), vec!["out.0"]);
        let (_, counts) = run_block(&core, 1.0);
        assert_eq!(counts.active_point, 1);
        let (out, _) = run_block(&core, 1.0);
        assert!(out[BLOCK - 1] > 0.5);
        assert!(matches!(
            core.events().try_recv(),
            Ok(RenderEvent::Prepared { sample_rate: 48000, .. })
        ));
    }

    #[test]
    fn test_silence_when_unprepared_or_inactive() {
        let core = RenderCore::new(scene(), RenderConfig::new());
        let (out, _) = run_block(&core, 1.0);
        assert!(out.iter().all(|x| *x == 0.0));

        let core = RenderCore::new(scene().active(false), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        for _ in 0..3 {
            let (out, counts) = run_block(&core, 1.0);
            assert!(out.iter().all(|x| *x == 0.0));
            assert_eq!(counts, ActivityCounts::default());
        }
    }

    #[test]
    fn test_contention_skips_block() {
        let core = RenderCore::new(scene(), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        let events = core.events();
        let _ = events.try_recv();
        let (out, _) = core.with_scene_mut(|_| run_block(&core, 1.0)).unwrap();
        assert!(out.iter().all(|x| *x == 0.0));
        assert_eq!(core.skipped_blocks(), 1);
        assert_eq!(
            events.try_recv(),
            Ok(RenderEvent::BlockSkipped { total_skipped: 1 })
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let core = RenderCore::new(scene(), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        core.release();
        core.release();
        assert!(!core.is_prepared());
        assert!(core.output_port_names().is_empty());
    }

    #[test]
    fn test_failed_prepare_leaves_nothing() {
        let bad = scene().receiver(ReceiverDesc::new(DynamicObject::new("x"), "unknown"));
        let core = RenderCore::new(bad, RenderConfig::new());
        assert!(core.prepare(48000, BLOCK).is_err());
        assert!(!core.is_prepared());
    }

    #[test]
    fn test_failed_reload_keeps_scene() {
        init_logger();
        let core = RenderCore::new(scene(), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        let bad = scene().receiver(ReceiverDesc::new(DynamicObject::new("x"), "unknown"));
        assert!(core.reload(bad).is_err());
        assert_eq!(core.output_port_names(), vec!["out.0"]);

        let stereo = scene().receiver(ReceiverDesc::new(
            DynamicObject::fixed("mic", DVec3::ZERO, Euler::ZERO),
            "ortf",
        ));
        core.reload(stereo).unwrap();
        assert_eq!(core.output_port_names(), vec!["out.0", "mic.l", "mic.r"]);
    }

    #[test]
    fn test_wrong_block_size_is_silent() {
        let core = RenderCore::new(scene(), RenderConfig::new());
        core.prepare(48000, BLOCK).unwrap();
        let input = vec![1.0f32; 64];
        let mut out = vec![1.0f32; 64];
        core.process(64, &Transport::default(), &[&input], &mut [&mut out]);
        assert!(out.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_non_finite_inputs_never_reach_outputs() {
        let desc = scene()
            .reflector(Reflector::new(
                DynamicObject::fixed("wall", DVec3::new(0.0, -5.0, -5.0), Euler::ZERO),
                Polygon::rectangle(10.0, 10.0),
            ))
            .diffuse_field(DiffuseField::new(
                DynamicObject::fixed("amb", DVec3::ZERO, Euler::ZERO),
                DVec3::splat(10.0),
            ))
            .receiver(
                ReceiverDesc::new(DynamicObject::fixed("ring", DVec3::ZERO, Euler::ZERO), "hoa2d")
                    .speakers(SpeakerLayout::ring(8, 2.0)),
            )
            .receiver(ReceiverDesc::new(
                DynamicObject::fixed("mic", DVec3::new(0.5, 0.0, 0.0), Euler::ZERO),
                "ortf",
            ));
        let core = RenderCore::new(desc, RenderConfig::new().ism_order(2));
        core.prepare(48000, BLOCK).unwrap();
        assert_eq!(core.input_port_names().len(), 5);
        let num_outputs = core.output_port_names().len();
        assert_eq!(num_outputs, 1 + 8 + 2);

        let garbage: Vec<f32> = (0..BLOCK)
            .map(|k| match k % 4 {
                0 => f32::NAN,
                1 => f32::INFINITY,
                2 => f32::NEG_INFINITY,
                _ => 1e30,
            })
            .collect();
        let inputs = vec![garbage.as_slice(); 5];
        let mut outputs = vec![vec![0.0f32; BLOCK]; num_outputs];
        for block in 0..20 {
            let mut ports: Vec<&mut [f32]> = outputs.iter_mut().map(|c| c.as_mut_slice()).collect();
            let transport = Transport::rolling_at(block * BLOCK as u64, 48000);
            core.process(BLOCK, &transport, &inputs, &mut ports);
            assert!(outputs.iter().flatten().all(|x| x.is_finite()));
        }
    }
}
