//! Output device binding for the render core.
//!
//! The device callback renders fixed-size blocks through
//! [`RenderCore::process`] and hands them out in whatever buffer size the
//! device asks for, using a ring buffer to bridge the two.

use crate::error::{AcousticaError, Result};
use crate::render::{RenderCore, Transport};
use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Plays the output ports of a prepared [`RenderCore`] on an output device.
///
/// The first `channels` output ports are mapped to the device channels in
/// order; missing ports are silent. The stream has no inputs, so sounds
/// are fed by their plugins only.
pub struct DeviceBinding {
    core: Arc<RenderCore>,
    sample_rate: u32,
    block_size: usize,
    channels: u16,
    stream: Option<cpal::Stream>,
    rolling: Arc<AtomicBool>,
    frames_rendered: Arc<AtomicU64>,
}

impl DeviceBinding {
    pub fn new(core: Arc<RenderCore>, sample_rate: u32, block_size: usize, channels: u16) -> Self {
        Self {
            core,
            sample_rate,
            block_size,
            channels,
            stream: None,
            rolling: Arc::new(AtomicBool::new(true)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Prepares the core for the stream format and starts the default
    /// output device.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.core.prepare(self.sample_rate, self.block_size)?;

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            AcousticaError::AudioDevice("No default output device available".into())
        })?;
        let default_config = device.default_output_config().map_err(|e| {
            AcousticaError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;
        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&device, &config)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&device, &config)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&device, &config)?,
            format => {
                return Err(AcousticaError::AudioFormat(format!(
                    "Unsupported sample format {:?}",
                    format
                )));
            }
        };
        stream.play().map_err(|e| {
            AcousticaError::AudioDevice(format!("Failed to start stream: {}", e))
        })?;
        log::info!(
            "device stream started: {} channels at {} Hz",
            self.channels,
            self.sample_rate
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Stops the stream and releases the core.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            self.core.release();
            log::info!("device stream stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Starts or stops the transport seen by the plugins and point models.
    pub fn set_rolling(&self, rolling: bool) {
        self.rolling.store(rolling, Ordering::Relaxed);
    }

    /// Frames rendered since the stream was started.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mut renderer = BlockRenderer::new(
            self.core.clone(),
            self.sample_rate,
            self.block_size,
            self.channels as usize,
            self.rolling.clone(),
            self.frames_rendered.clone(),
        );
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.fill(data),
                |err| log::error!("device stream error: {}", err),
                None,
            )
            .map_err(|e| AcousticaError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}

impl Drop for DeviceBinding {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Audio-thread side of the binding. All buffers are allocated up front.
struct BlockRenderer {
    core: Arc<RenderCore>,
    sample_rate: u32,
    block_size: usize,
    channels: usize,
    rolling: Arc<AtomicBool>,
    frames_rendered: Arc<AtomicU64>,
    planar: Vec<Vec<f32>>,
    interleaved: Vec<f32>,
    producer: ringbuf::HeapProd<f32>,
    consumer: ringbuf::HeapCons<f32>,
    position: u64,
}

impl BlockRenderer {
    fn new(
        core: Arc<RenderCore>,
        sample_rate: u32,
        block_size: usize,
        channels: usize,
        rolling: Arc<AtomicBool>,
        frames_rendered: Arc<AtomicU64>,
    ) -> Self {
        let num_outputs = core.output_port_names().len().max(channels);
        let (producer, consumer) = HeapRb::<f32>::new(2 * block_size * channels).split();
        Self {
            core,
            sample_rate,
            block_size,
            channels,
            rolling,
            frames_rendered,
            planar: vec![vec![0.0; block_size]; num_outputs],
            interleaved: vec![0.0; block_size * channels],
            producer,
            consumer,
            position: 0,
        }
    }

    fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) {
        let mut written = 0;
        while written < data.len() {
            if self.consumer.is_empty() {
                self.render_block();
            }
            while written < data.len() {
                match self.consumer.try_pop() {
                    Some(x) => {
                        data[written] = T::from_sample(x);
                        written += 1;
                    }
                    None => break,
                }
            }
        }
    }

    fn render_block(&mut self) {
        let rolling = self.rolling.load(Ordering::Relaxed);
        let transport = Transport {
            rolling,
            session_time_samples: self.position,
            session_time_seconds: self.position as f64 / self.sample_rate as f64,
        };
        let mut outputs: Vec<&mut [f32]> =
            self.planar.iter_mut().map(|c| c.as_mut_slice()).collect();
        self.core.process(self.block_size, &transport, &[], &mut outputs);
        for (k, frame) in self.interleaved.chunks_mut(self.channels).enumerate() {
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = self.planar[c][k];
            }
        }
        self.producer.push_slice(&self.interleaved);
        if rolling {
            self.position += self.block_size as u64;
        }
        self.frames_rendered
            .fetch_add(self.block_size as u64, Ordering::Relaxed);
    }
}

/// Plays a core on the default device for `duration` and returns the number
/// of rendered frames. Render events are logged while playing.
pub fn play_for(
    core: Arc<RenderCore>,
    sample_rate: u32,
    block_size: usize,
    duration: Duration,
) -> anyhow::Result<u64> {
    let channels = core.with_scene_mut(|scene| scene.num_outputs()).unwrap_or(2).max(1) as u16;
    let mut binding = DeviceBinding::new(core, sample_rate, block_size, channels);
    let events = binding.core.events();
    binding.start().context("failed to start device binding")?;
    let deadline = Instant::now() + duration;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        if let Ok(event) = events.recv_timeout(left) {
            event.log();
        }
    }
    let frames = binding.frames_rendered();
    binding.stop();
    Ok(frames)
}
