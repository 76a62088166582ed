//! Signal processing building blocks shared by the propagation models and
//! receiver encoders.

mod delayline;
mod filter;
mod foa;

pub use delayline::DelayLine;
pub use filter::OnePole;
pub use foa::{FoaChunk, FoaRotation};

/// Sanitized sample: NaN, infinite and subnormal values become zero.
#[inline]
pub fn friendly(x: f32) -> f32 {
    if x.is_normal() { x } else { 0.0 }
}

/// Like [`friendly`], also zeroing values with a magnitude above 1e6.
#[inline]
pub fn friendly_limited(x: f32) -> f32 {
    if x.is_normal() && x.abs() <= 1.0e6 {
        x
    } else {
        0.0
    }
}

#[inline]
pub fn friendly_f64(x: f64) -> f64 {
    if x.is_normal() { x } else { 0.0 }
}

pub fn sanitize(buf: &mut [f32]) {
    for x in buf {
        *x = friendly(*x);
    }
}

pub fn sanitize_limited(buf: &mut [f32]) {
    for x in buf {
        *x = friendly_limited(*x);
    }
}

/// Adds `gain * src` to `dst`.
pub fn mix_into(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += gain * s;
    }
}

pub fn rms(buf: &[f32]) -> f32 {
    if buf.is_empty() {
        return 0.0;
    }
    (buf.iter().map(|x| x * x).sum::<f32>() / buf.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_number() {
        assert_eq!(friendly(f32::NAN), 0.0);
        assert_eq!(friendly(f32::INFINITY), 0.0);
        assert_eq!(friendly(f32::MIN_POSITIVE / 4.0), 0.0);
        assert_eq!(friendly(0.25), 0.25);
        assert_eq!(friendly_limited(2.0e6), 0.0);
        assert_eq!(friendly_limited(-3.0), -3.0);
        assert_eq!(friendly_f64(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_sanitize_buffer() {
        let mut buf = [1.0, f32::NAN, -f32::INFINITY, 1.0e7];
        sanitize_limited(&mut buf);
        assert_eq!(buf, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mix_and_rms() {
        let mut dst = [1.0f32; 4];
        mix_into(&mut dst, &[1.0, 2.0, 3.0, 4.0], 0.5);
        assert_eq!(dst, [1.5, 2.0, 2.5, 3.0]);
        assert_eq!(rms(&[2.0, -2.0]), 2.0);
    }
}
