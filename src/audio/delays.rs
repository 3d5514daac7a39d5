use crate::audio::buffers::DelayBuffer;
use crate::audio::filters::{OnePoleFilter, OnePoleMode};
use crate::audio::AudioProcessor;

// Simple delay line without filtering
pub struct DelayLine {
    buffer: DelayBuffer,
    feedback: f32,
    sample_rate: f32,
}

impl DelayLine {
    pub fn new(max_delay_seconds: f32, sample_rate: f32) -> Self {
        Self {
            buffer: DelayBuffer::new((max_delay_seconds * sample_rate) as usize),
            feedback: 0.0,
            sample_rate,
        }
    }

    pub fn set_delay_seconds(&mut self, delay_seconds: f32) {
        let delay_samples = (delay_seconds * self.sample_rate) as usize;
        self.buffer.set_delay_samples(delay_samples);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-1.0, 1.0);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn read(&self) -> f32 {
        self.buffer.read()
    }

    /// Read at an arbitrary delay without changing the set one
    pub fn read_at(&self, delay_seconds: f32) -> f32 {
        let delay_samples = (delay_seconds * self.sample_rate) as usize;
        self.buffer.read_at(delay_samples)
    }

    pub fn write(&mut self, input: f32, feedback: f32) {
        self.buffer.write(input + feedback * self.feedback);
    }
}

impl AudioProcessor for DelayLine {
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.read();
        self.write(input, delayed);
        delayed
    }
}

/// Feedback delay whose repeats are band-limited on every pass, so they
/// darken and thin out as they decay. `process` returns the wet signal only.
pub struct FilteredDelayLine {
    delay_line: DelayLine,
    highpass: OnePoleFilter,
    lowpass: OnePoleFilter,
}

impl FilteredDelayLine {
    pub fn new(max_delay_seconds: f32, sample_rate: f32) -> Self {
        Self {
            delay_line: DelayLine::new(max_delay_seconds, sample_rate),
            highpass: OnePoleFilter::new(300.0, OnePoleMode::Highpass, sample_rate),
            lowpass: OnePoleFilter::new(8000.0, OnePoleMode::Lowpass, sample_rate),
        }
    }

    pub fn set_delay_seconds(&mut self, delay_seconds: f32) {
        self.delay_line.set_delay_seconds(delay_seconds);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.delay_line.set_feedback(feedback);
    }

    pub fn feedback(&self) -> f32 {
        self.delay_line.feedback()
    }
}

impl AudioProcessor for FilteredDelayLine {
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.delay_line.read();
        let filtered = self.lowpass.process(self.highpass.process(delayed));
        self.delay_line.write(input, filtered);
        filtered
    }
}
