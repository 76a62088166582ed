/// Fractional delay line with linear interpolation.
///
/// Delays are given in samples or, through [`DelayLine::get_dist_push`], as
/// a propagation distance. Reading at a varying distance produces the Doppler
/// shift of a moving source.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    pos: usize,
    dist_to_samples: f64,
}

impl DelayLine {
    /// # Arguments
    /// * `max_delay` - Longest supported delay in samples
    /// * `sample_rate` - Sample rate in Hz
    /// * `speed_of_sound` - Speed of sound in m/s
    pub fn new(max_delay: usize, sample_rate: f64, speed_of_sound: f64) -> Self {
        Self {
            buffer: vec![0.0; max_delay + 2],
            pos: 0,
            dist_to_samples: sample_rate / speed_of_sound,
        }
    }

    /// Longest delay that can be read, in samples.
    pub fn max_delay(&self) -> f64 {
        (self.buffer.len() - 2) as f64
    }

    #[inline]
    pub fn push(&mut self, x: f32) {
        self.pos += 1;
        if self.pos == self.buffer.len() {
            self.pos = 0;
        }
        self.buffer[self.pos] = x;
    }

    #[inline]
    fn at(&self, delay: usize) -> f32 {
        let n = self.buffer.len();
        self.buffer[(self.pos + n - delay) % n]
    }

    /// Reads the sample pushed `delay` samples ago; zero is the newest sample.
    #[inline]
    pub fn get(&self, delay: f64) -> f32 {
        let delay = delay.clamp(0.0, self.max_delay());
        let whole = delay.floor();
        let frac = (delay - whole) as f32;
        let k = whole as usize;
        let a = self.at(k);
        if frac == 0.0 {
            return a;
        }
        let b = self.at(k + 1);
        a + frac * (b - a)
    }

    /// Pushes `x`, then reads at the delay corresponding to `distance` meters.
    #[inline]
    pub fn get_dist_push(&mut self, distance: f64, x: f32) -> f32 {
        self.push(x);
        self.get(distance * self.dist_to_samples)
    }

    /// Feeds a chunk without reading, keeping the history current.
    pub fn add_chunk(&mut self, chunk: &[f32]) {
        for x in chunk {
            self.push(*x);
        }
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}
