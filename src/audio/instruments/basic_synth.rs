use crate::audio::envelopes::AdsrEnvelope;
use crate::audio::instruments::Timbre;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::AudioGenerator;

/// Triangle oscillator through a gated ADSR
pub struct BasicSynth {
    oscillator: Oscillator,
    amp_envelope: AdsrEnvelope,
}

impl BasicSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            oscillator: Oscillator::new(Waveform::Triangle, 440.0, sample_rate),
            amp_envelope: AdsrEnvelope::new(0.01, 0.1, 0.3, 0.5, sample_rate),
        }
    }
}

impl AudioGenerator for BasicSynth {
    fn next_sample(&mut self) -> f32 {
        if !self.amp_envelope.is_active() {
            return 0.0;
        }
        self.oscillator.next_sample() * self.amp_envelope.next_sample()
    }
}

impl Timbre for BasicSynth {
    fn trigger(&mut self, frequency: Option<f32>, duration: f32) {
        if let Some(frequency) = frequency {
            self.oscillator.set_frequency(frequency);
        }
        self.amp_envelope.trigger(duration);
    }

    fn is_active(&self) -> bool {
        self.amp_envelope.is_active()
    }
}
