use crate::geometry::raised_cosine;
use crate::scene::{Mask, Receiver};

/// Target gain of `receiver` given its bounding box and the scene masks.
///
/// Inner masks combine by minimum, outer masks by maximum; the outer term
/// only applies when at least one active outer mask exists.
pub fn receiver_mask_gain(receiver: &Receiver, masks: &[Mask]) -> f64 {
    let p = receiver.position();
    let mut gain = 1.0;
    if let Some(bounding_box) = &receiver.settings.bounding_box {
        gain *= raised_cosine(bounding_box.shoebox().distance(p), bounding_box.falloff);
    }
    if receiver.settings.use_global_mask {
        let mut inner = 1.0f64;
        let mut outer: Option<f64> = None;
        for mask in masks.iter().filter(|m| m.is_active()) {
            let g = mask.gain(p);
            if mask.inner {
                inner = inner.min(g);
            } else {
                outer = Some(outer.map_or(g, |o| o.max(g)));
            }
        }
        gain *= inner * outer.unwrap_or(1.0);
    }
    gain
}
