/// One-pole low-pass `y[n] = a * y[n-1] + (1 - a) * x[n]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OnePole {
    pub coefficient: f64,
    state: f64,
}

impl OnePole {
    pub fn new(coefficient: f64) -> Self {
        Self {
            coefficient,
            state: 0.0,
        }
    }

    /// Low-pass with the given -3 dB cutoff frequency.
    pub fn with_cutoff(cutoff: f64, sample_rate: f64) -> Self {
        Self::new((-2.0 * std::f64::consts::PI * cutoff / sample_rate).exp())
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.state = super::friendly_f64(
            self.coefficient * self.state + (1.0 - self.coefficient) * x as f64,
        );
        self.state as f32
    }

    pub fn process(&mut self, buf: &mut [f32]) {
        for x in buf {
            *x = self.process_sample(*x);
        }
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
