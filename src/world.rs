//! The acoustic world: the image source tree plus one propagation model per
//! (path, receiver) and (diffuse field, receiver) pair.

use crate::acoustics::{
    DiffuseModel, MirrorModel, PathEnv, PointModel, SourceRef, receiver_mask_gain,
};
use crate::config::RenderConfig;
use crate::render::Transport;
use crate::scene::{DiffuseId, ReceiverId, Scene, SoundId};
use log::info;

/// Number of models that contributed to the last block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityCounts {
    pub active_point: u32,
    pub total_point: u32,
    pub active_diffuse: u32,
    pub total_diffuse: u32,
}

/// Created when the render core is prepared and dropped on release.
pub struct World {
    mirrors: MirrorModel,
    point_models: Vec<PointModel>,
    diffuse_models: Vec<DiffuseModel>,
}

impl World {
    /// Builds the image source tree and the model cross product of `scene`.
    pub fn new(scene: &Scene, config: &RenderConfig) -> Self {
        let mirrors =
            MirrorModel::new(scene.sounds.len(), scene.reflectors.len(), config.ism_order);
        let fs = config.sample_rate as f64;
        let mut point_models = Vec::new();
        let mut diffuse_models = Vec::new();
        for (r, receiver) in scene.receivers.iter().enumerate() {
            let receiver_id = ReceiverId(r);
            if receiver.settings.render_diffuse {
                for f in 0..scene.diffuse_fields.len() {
                    diffuse_models.push(DiffuseModel::new(
                        DiffuseId(f),
                        receiver_id,
                        receiver,
                        fs,
                        config.block_size,
                    ));
                }
            }
            if !receiver.settings.render_point {
                continue;
            }
            for (s, sound) in scene.sounds.iter().enumerate() {
                point_models.push(PointModel::new(
                    SourceRef::Primary(SoundId(s)),
                    SoundId(s),
                    0,
                    receiver_id,
                    receiver,
                    sound.max_distance,
                    scene.obstacles.len(),
                    config,
                ));
            }
            if receiver.settings.render_image {
                for (m, mirror) in mirrors.mirrors().iter().enumerate() {
                    point_models.push(PointModel::new(
                        SourceRef::Image(m),
                        mirror.root,
                        mirror.order,
                        receiver_id,
                        receiver,
                        scene.sounds[mirror.root.0].max_distance,
                        scene.obstacles.len(),
                        config,
                    ));
                }
            }
        }
        info!(
            "world: {} image sources, {} point models, {} diffuse models",
            mirrors.len(),
            point_models.len(),
            diffuse_models.len()
        );
        Self {
            mirrors,
            point_models,
            diffuse_models,
        }
    }

    pub fn mirrors(&self) -> &MirrorModel {
        &self.mirrors
    }

    pub fn num_point_models(&self) -> usize {
        self.point_models.len()
    }

    pub fn num_diffuse_models(&self) -> usize {
        self.diffuse_models.len()
    }

    /// Renders one block of every receiver.
    ///
    /// Expects the scene's geometry, activity and input buffers to be up to
    /// date. Receiver outputs are overwritten.
    pub fn process(&mut self, scene: &mut Scene, transport: &Transport) -> ActivityCounts {
        for receiver in scene.receivers.iter_mut() {
            receiver.clear_output();
            let gain = receiver_mask_gain(receiver, &scene.masks);
            receiver.set_next_gain(gain as f32);
        }

        self.mirrors.update(&scene.sounds, &scene.reflectors);

        let mut counts = ActivityCounts {
            total_point: self.point_models.len() as u32,
            total_diffuse: self.diffuse_models.len() as u32,
            ..Default::default()
        };
        let env = PathEnv {
            sounds: &scene.sounds,
            mirrors: &self.mirrors,
            reflectors: &scene.reflectors,
            obstacles: &scene.obstacles,
            rolling: transport.rolling,
        };
        for model in self.point_models.iter_mut() {
            counts.active_point += model.process(&env, &mut scene.receivers[model.receiver.0]);
        }
        for model in self.diffuse_models.iter_mut() {
            counts.active_diffuse += model.process(
                &scene.diffuse_fields[model.field.0],
                &mut scene.receivers[model.receiver.0],
            );
        }

        // encoders decode into the outputs in postproc, so the mask gain
        // ramp follows it
        for receiver in scene.receivers.iter_mut() {
            receiver.postproc();
            if receiver.is_active() {
                receiver.apply_gain();
            } else {
                // postproc keeps compensation delay lines running
                receiver.clear_output();
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::math::{DVec3, Euler};
    use crate::plugins::PluginRegistry;
    use crate::receiver::{EncoderRegistry, Speaker, SpeakerLayout};
    use crate::scene::{
        DiffuseField, DynamicObject, ReceiverDesc, ReceiverSettings, Reflector, SceneDesc,
        SoundDesc, SourceObject,
    };

    fn build(desc: &SceneDesc, config: &RenderConfig) -> Scene {
        let mut scene = Scene::build(
            desc,
            config,
            &EncoderRegistry::with_builtin(),
            &PluginRegistry::with_builtin(),
        )
        .unwrap();
        scene.geometry_update(0.0);
        let solo = scene.solo_state();
        scene.process_active(0.0, &solo);
        scene
    }

    fn room() -> SceneDesc {
        SceneDesc::new("room")
            .source(
                SourceObject::new(DynamicObject::fixed("a", DVec3::new(2.0, 1.0, 0.0), Euler::ZERO))
                    .sound(SoundDesc::new("0")),
            )
            .reflector(Reflector::new(
                DynamicObject::fixed("floor", DVec3::new(0.0, -10.0, -10.0), Euler::ZERO),
                Polygon::rectangle(20.0, 20.0),
            ))
            .diffuse_field(DiffuseField::new(
                DynamicObject::fixed("amb", DVec3::ZERO, Euler::ZERO),
                DVec3::splat(10.0),
            ))
            .receiver(ReceiverDesc::new(
                DynamicObject::fixed("out", DVec3::new(4.0, 0.0, 0.0), Euler::ZERO),
                "omni",
            ))
            .receiver(
                ReceiverDesc::new(
                    DynamicObject::fixed("dry", DVec3::new(4.0, 0.0, 0.0), Euler::ZERO),
                    "omni",
                )
                .settings(ReceiverSettings::default().render(true, false, false)),
            )
    }

    #[test]
    fn test_model_cross_product() {
        let config = RenderConfig::new().block_size(64).ism_order(1);
        let scene = build(&room(), &config);
        let world = World::new(&scene, &config);
        assert_eq!(world.mirrors().len(), 1);
        // "out": direct + image, "dry": direct only
        assert_eq!(world.num_point_models(), 3);
        assert_eq!(world.num_diffuse_models(), 1);
    }

    #[test]
    fn test_activity_counts() {
        let config = RenderConfig::new().block_size(64).ism_order(1);
        let mut scene = build(&room(), &config);
        let mut world = World::new(&scene, &config);
        let counts = world.process(&mut scene, &Transport::default());
        assert_eq!(
            counts,
            ActivityCounts {
                active_point: 3,
                total_point: 3,
                active_diffuse: 1,
                total_diffuse: 1,
            }
        );

        scene.object_mut("a").unwrap().mute = true;
        let solo = scene.solo_state();
        scene.process_active(0.0, &solo);
        let counts = world.process(&mut scene, &Transport::default());
        assert_eq!(counts.active_point, 0);
        assert_eq!(counts.active_diffuse, 1);
    }

    #[test]
    fn test_reflection_reaches_receiver() {
        let config = RenderConfig::new().block_size(1024).ism_order(1);
        let desc = room();
        let mut scene = build(&desc, &config);
        let mut world = World::new(&scene, &config);
        scene.sounds[0].audio_mut()[0] = 1.0;
        world.process(&mut scene, &Transport::default());
        let out = &scene.receivers[0].outputs()[0];
        let dry = &scene.receivers[1].outputs()[0];
        // direct path 2.24 m, image path 6.08 m
        let image_delay = (DVec3::new(-2.0, 1.0, 0.0).distance(DVec3::new(4.0, 0.0, 0.0)) / 340.0
            * 48000.0)
            .round() as usize;
        assert!(out[image_delay].abs() > 0.0);
        assert_eq!(dry[image_delay], 0.0);
    }

    #[test]
    fn test_inactive_speaker_receiver_is_silent() {
        let config = RenderConfig::new().block_size(64).ism_order(1);
        // 1.7 m radius difference delays the near speaker by 240 samples
        let layout = SpeakerLayout::new(vec![
            Speaker::new(0.0, 0.0, 3.4),
            Speaker::new(90.0, 0.0, 1.7),
        ]);
        let desc = SceneDesc::new("speakers")
            .source(
                SourceObject::new(DynamicObject::fixed("a", DVec3::new(0.0, 2.0, 0.0), Euler::ZERO))
                    .sound(SoundDesc::new("0")),
            )
            .receiver(
                ReceiverDesc::new(DynamicObject::fixed("spk", DVec3::ZERO, Euler::ZERO), "nsp")
                    .speakers(layout),
            );
        let mut scene = build(&desc, &config);
        let mut world = World::new(&scene, &config);
        // 282 samples of propagation plus 240 of compensation
        for _ in 0..12 {
            scene.sounds[0].audio_mut().fill(1.0);
            world.process(&mut scene, &Transport::default());
        }
        assert!(scene.receivers[0].outputs()[1].iter().any(|x| x.abs() > 0.1));

        scene.object_mut("spk").unwrap().mute = true;
        let solo = scene.solo_state();
        scene.process_active(0.0, &solo);
        scene.sounds[0].audio_mut().fill(1.0);
        world.process(&mut scene, &Transport::default());
        for channel in scene.receivers[0].outputs() {
            assert!(channel.iter().all(|x| *x == 0.0));
        }
    }
}
