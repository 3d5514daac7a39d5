pub struct DelayBuffer {
    buffer: Vec<f32>,
    delay_samples: usize,
    write_pos: usize,
    mask: usize, // For fast modulo with power-of-2 sizes
}

impl DelayBuffer {
    pub fn new(max_samples: usize) -> Self {
        // Round up to next power of 2 for efficient modulo operations
        let size = max_samples.max(1).next_power_of_two();
        let mask = size - 1;

        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            delay_samples: 0,
            mask,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Delay lengths beyond the buffer are clamped to its size
    pub fn set_delay_samples(&mut self, delay_samples: usize) {
        self.delay_samples = delay_samples.min(self.buffer.len());
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    fn get_read_pos(&self, delay_samples: usize) -> usize {
        if delay_samples <= self.write_pos {
            self.write_pos - delay_samples
        } else {
            self.buffer.len() - (delay_samples - self.write_pos)
        }
    }

    pub fn read_at(&self, delay_samples: usize) -> f32 {
        let delay_samples = delay_samples.min(self.buffer.len());
        let read_pos = self.get_read_pos(delay_samples) & self.mask;
        self.buffer[read_pos]
    }

    pub fn read(&self) -> f32 {
        self.read_at(self.delay_samples)
    }

    pub fn advance(&mut self) {
        self.write_pos = (self.write_pos + 1) & self.mask;
    }

    pub fn write(&mut self, value: f32) {
        self.buffer[self.write_pos] = value;
        self.advance();
    }
}
