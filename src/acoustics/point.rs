use super::{DiffractionState, MirrorModel, SourceRef, diffract};
use crate::config::RenderConfig;
use crate::dsp::{DelayLine, friendly, friendly_f64};
use crate::receiver::EncoderState;
use crate::scene::{Obstacle, Receiver, ReceiverId, Reflector, SoundId, SoundSource};
use std::f64::consts::PI;

/// Read-only scene state shared by all point models of one block.
pub struct PathEnv<'a> {
    pub sounds: &'a [SoundSource],
    pub mirrors: &'a MirrorModel,
    pub reflectors: &'a [Reflector],
    pub obstacles: &'a [Obstacle],
    /// Transport state of the block
    pub rolling: bool,
}

/// Propagation from one sound path (direct or image) to one receiver.
///
/// Per block the target distance, gain and air absorption are derived from
/// the geometry; per sample they are ramped linearly while the signal passes
/// the delay line, the gain and the air absorption low-pass.
pub struct PointModel {
    pub path: SourceRef,
    pub sound: SoundId,
    pub receiver: ReceiverId,
    pub order: u32,
    audio: Vec<f32>,
    delayline: DelayLine,
    state: EncoderState,
    reflection_states: Vec<f64>,
    diffraction: Vec<DiffractionState>,
    speed_of_sound: f64,
    sample_rate: f64,
    /// `fs / (c * 7782)`, air absorption per meter
    dscale: f64,
    distance: f64,
    gain: f64,
    air: f64,
    air_state: f64,
    primed: bool,
}

impl PointModel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: SourceRef,
        sound: SoundId,
        order: u32,
        receiver_id: ReceiverId,
        receiver: &Receiver,
        max_distance: f64,
        num_obstacles: usize,
        config: &RenderConfig,
    ) -> Self {
        let fs = config.sample_rate as f64;
        let c = config.speed_of_sound;
        Self {
            path,
            sound,
            receiver: receiver_id,
            order,
            audio: vec![0.0; config.block_size],
            delayline: DelayLine::new((max_distance / c * fs).ceil() as usize, fs, c),
            state: receiver.create_state(fs, config.block_size),
            reflection_states: vec![0.0; order as usize],
            diffraction: vec![DiffractionState::default(); num_obstacles],
            speed_of_sound: c,
            sample_rate: fs,
            dscale: fs / (c * 7782.0),
            distance: 0.0,
            gain: 0.0,
            air: 1.0,
            air_state: 0.0,
            primed: false,
        }
    }

    /// Renders one block into `receiver`.
    ///
    /// Returns 1 when the path contributed to the receiver, else 0. Paths of
    /// an inactive sound or receiver keep feeding their delay line.
    pub fn process(&mut self, env: &PathEnv, receiver: &mut Receiver) -> u32 {
        let sound = &env.sounds[self.sound.0];
        self.audio.copy_from_slice(sound.audio());
        let (visible, reflector_active) = match self.path {
            SourceRef::Primary(_) => (true, true),
            SourceRef::Image(i) => {
                let mirror = &env.mirrors.mirrors()[i];
                (mirror.is_visible(), env.reflectors[mirror.reflector.0].is_active())
            }
        };
        if receiver.is_gain_zero()
            || !receiver.is_active()
            || !sound.is_active()
            || !reflector_active
        {
            if sound.settings.delayline {
                self.delayline.add_chunk(&self.audio);
            }
            return 0;
        }
        if !receiver.settings.render_point
            || !sound.settings.renders_order(self.order)
            || !receiver.settings.renders_order(self.order)
            || !visible
        {
            return 0;
        }

        let p_rec = receiver.position();
        let (mut position, path_gain, directivity) = match self.path {
            SourceRef::Primary(_) => (
                sound.physical_position(),
                1.0,
                sound.directivity_gain(p_rec),
            ),
            SourceRef::Image(i) => {
                let mirror = &env.mirrors.mirrors()[i];
                let (p, g) = env.mirrors.effective_position(i, env.reflectors, p_rec);
                let toward = mirror.orientation().derotate(p_rec - mirror.position());
                (p, g, sound.settings.directivity.gain(toward))
            }
        };
        for (obstacle, state) in env.obstacles.iter().zip(self.diffraction.iter_mut()) {
            if !obstacle.is_active() {
                continue;
            }
            let p = diffract(
                obstacle,
                position,
                p_rec,
                &mut self.audio,
                self.speed_of_sound,
                self.sample_rate,
                state,
            );
            if !obstacle.inner {
                position = p;
            }
        }

        let refpoint = receiver.update_refpoint(
            sound.physical_position(),
            position,
            self.order > 0,
            sound.settings.gain_model,
        );
        if refpoint.distance > sound.max_distance {
            return 0;
        }
        let next_gain = friendly_f64(refpoint.gain * path_gain * directivity);
        let next_air = (-refpoint.distance * self.dscale).exp();
        let next_distance =
            (refpoint.distance - self.speed_of_sound * receiver.settings.delaycomp).max(0.0);
        if !self.primed {
            self.distance = next_distance;
            self.gain = next_gain;
            self.air = next_air;
            self.primed = true;
        }
        let dt = 1.0 / self.audio.len().max(1) as f64;
        let ddistance = (next_distance - self.distance) * dt;
        let mut dgain = (next_gain - self.gain) * dt;
        let dair = (next_air - self.air) * dt;

        if let SourceRef::Image(i) = self.path {
            env.mirrors
                .apply_reflection_filter(
                    i,
                    env.reflectors,
                    &mut self.audio,
                    &mut self.reflection_states,
                );
        }
        let muted = receiver.settings.mute_on_stop && !env.rolling;
        if muted {
            self.gain = 0.0;
            dgain = 0.0;
        }

        let use_delayline = sound.settings.delayline;
        let use_air = sound.settings.air_absorption;
        for x in self.audio.iter_mut() {
            self.distance += ddistance;
            self.gain += dgain;
            let delayed = if use_delayline {
                self.delayline.get_dist_push(self.distance, *x)
            } else {
                *x
            };
            let mut y = friendly(self.gain as f32 * delayed);
            if use_air {
                self.air += dair;
                self.air_state =
                    friendly_f64((1.0 - self.air) * self.air_state + self.air * y as f64);
                y = self.air_state as f32;
            }
            *x = y;
        }
        self.distance = next_distance;
        self.gain = next_gain;
        self.air = next_air;

        if !muted && (self.gain != 0.0 || dgain != 0.0) {
            let width =
                (0.25 * PI * sound.settings.size / refpoint.distance.max(0.01)).min(0.5 * PI);
            receiver.add_point_source(refpoint.prel, width, &self.audio, &mut self.state);
            return 1;
        }
        0
    }
}
