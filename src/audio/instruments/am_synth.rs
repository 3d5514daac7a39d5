use crate::audio::envelopes::AdsrEnvelope;
use crate::audio::instruments::Timbre;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::AudioGenerator;

const HARMONICITY: f32 = 3.0;

/// Sine carrier whose amplitude follows a square modulator at three times its
/// frequency. The modulation depth swells in with its own envelope.
pub struct AmSynth {
    carrier: Oscillator,
    modulator: Oscillator,
    amp_envelope: AdsrEnvelope,
    mod_envelope: AdsrEnvelope,
}

impl AmSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            carrier: Oscillator::new(Waveform::Sine, 440.0, sample_rate),
            modulator: Oscillator::new(Waveform::Square, 440.0 * HARMONICITY, sample_rate),
            amp_envelope: AdsrEnvelope::new(0.01, 0.01, 1.0, 0.5, sample_rate),
            mod_envelope: AdsrEnvelope::new(0.5, 0.01, 1.0, 0.5, sample_rate),
        }
    }
}

impl AudioGenerator for AmSynth {
    fn next_sample(&mut self) -> f32 {
        if !self.amp_envelope.is_active() {
            return 0.0;
        }

        let depth = self.mod_envelope.next_sample();
        let modulation = (self.modulator.next_sample() * depth + 1.0) * 0.5;

        self.carrier.next_sample() * modulation * self.amp_envelope.next_sample()
    }
}

impl Timbre for AmSynth {
    fn trigger(&mut self, frequency: Option<f32>, duration: f32) {
        if let Some(frequency) = frequency {
            self.carrier.set_frequency(frequency);
            self.modulator.set_frequency(frequency * HARMONICITY);
        }
        self.amp_envelope.trigger(duration);
        self.mod_envelope.trigger(duration);
    }

    fn is_active(&self) -> bool {
        self.amp_envelope.is_active()
    }
}
