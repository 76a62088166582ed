use crate::dsp::{FoaChunk, FoaRotation};
use crate::geometry::raised_cosine;
use crate::receiver::EncoderState;
use crate::scene::{DiffuseField, DiffuseId, Receiver, ReceiverId};

/// Propagation from one diffuse field to one receiver.
///
/// There is no delay: the field is rotated into the receiver frame and faded
/// with the receiver's distance to the field box.
pub struct DiffuseModel {
    pub field: DiffuseId,
    pub receiver: ReceiverId,
    audio: FoaChunk,
    state: EncoderState,
    gain: f32,
}

impl DiffuseModel {
    pub fn new(
        field: DiffuseId,
        receiver_id: ReceiverId,
        receiver: &Receiver,
        sample_rate: f64,
        block_size: usize,
    ) -> Self {
        Self {
            field,
            receiver: receiver_id,
            audio: FoaChunk::new(block_size),
            state: receiver.create_state(sample_rate, block_size),
            gain: 1.0,
        }
    }

    /// Renders one block into `receiver`; returns 1 when audible, else 0.
    pub fn process(&mut self, field: &DiffuseField, receiver: &mut Receiver) -> u32 {
        let distance = field.shoebox().distance(receiver.position());
        let next_gain = raised_cosine(distance, field.falloff) as f32;
        if self.gain == 0.0 && next_gain == 0.0 {
            return 0;
        }
        let active = receiver.is_active() && field.is_active();
        self.audio.copy_from(field.audio());
        self.audio
            .rotate(&FoaRotation::rotate(&field.object.orientation()));
        self.audio
            .rotate(&FoaRotation::derotate(&receiver.orientation()));
        let dgain = (next_gain - self.gain) / self.audio.len().max(1) as f32;
        for k in 0..self.audio.len() {
            self.gain += dgain;
            if active {
                for channel in self.audio.channels_mut() {
                    channel[k] *= self.gain;
                }
            }
        }
        self.gain = next_gain;
        if receiver.settings.render_diffuse && active && !receiver.is_gain_zero() {
            self.audio.scale(receiver.settings.diffuse_gain as f32);
            receiver.add_diffuse_source(&self.audio, &mut self.state);
            return 1;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{DVec3, Euler};
    use crate::receiver::{EncoderContext, Omni};
    use crate::scene::{DynamicObject, ReceiverDesc};

    fn receiver_at(p: DVec3) -> Receiver {
        let desc = ReceiverDesc::new(DynamicObject::fixed("out", p, Euler::ZERO), "omni");
        let ctx = EncoderContext {
            attributes: &desc.attributes,
            speakers: None,
            sample_rate: 48000.0,
            block_size: 8,
            speed_of_sound: 340.0,
        };
        Receiver::new(&desc, Box::new(Omni::new(&ctx).unwrap()), 8)
    }

    fn field() -> DiffuseField {
        let mut field = DiffuseField::new(
            DynamicObject::fixed("rain", DVec3::ZERO, Euler::ZERO),
            DVec3::splat(2.0),
        )
        .falloff(2.0);
        field.allocate(8);
        field.audio_mut().w.fill(1.0);
        field
    }

    #[test]
    fn test_inside_field_is_unity() {
        let field = field();
        let mut receiver = receiver_at(DVec3::ZERO);
        let mut model = DiffuseModel::new(DiffuseId(0), ReceiverId(0), &receiver, 48000.0, 8);
        assert_eq!(model.process(&field, &mut receiver), 1);
        assert!(receiver.outputs()[0].iter().all(|x| (x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_falloff_ramps_to_silence() {
        let field = field();
        let mut receiver = receiver_at(DVec3::new(10.0, 0.0, 0.0));
        let mut model = DiffuseModel::new(DiffuseId(0), ReceiverId(0), &receiver, 48000.0, 8);
        // ramps down from unity in the first block
        assert_eq!(model.process(&field, &mut receiver), 1);
        let out = &receiver.outputs()[0];
        assert!(out[0] > out[7]);
        assert!(out[7].abs() < 1e-6);
        receiver.clear_output();
        assert_eq!(model.process(&field, &mut receiver), 0);
    }

    #[test]
    fn test_half_gain_in_falloff_zone() {
        let field = field();
        let mut receiver = receiver_at(DVec3::new(2.0, 0.0, 0.0));
        let mut model = DiffuseModel::new(DiffuseId(0), ReceiverId(0), &receiver, 48000.0, 8);
        model.process(&field, &mut receiver);
        receiver.clear_output();
        model.process(&field, &mut receiver);
        assert!(receiver.outputs()[0].iter().all(|x| (x - 0.5).abs() < 1e-6));
    }
}
