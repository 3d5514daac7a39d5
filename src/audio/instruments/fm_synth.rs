use crate::audio::envelopes::AdsrEnvelope;
use crate::audio::instruments::Timbre;
use crate::audio::oscillators::PMOscillator;
use crate::audio::{AudioGenerator, TWO_PI};

const HARMONICITY: f32 = 3.0;
const MODULATION_INDEX: f32 = 10.0;

/// Two-operator phase modulation: a modulator at three times the carrier
/// frequency drives the carrier's phase.
pub struct FmSynth {
    carrier: PMOscillator,
    modulator: PMOscillator,
    amp_envelope: AdsrEnvelope,
    mod_envelope: AdsrEnvelope,
}

impl FmSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            carrier: PMOscillator::new(440.0, sample_rate),
            modulator: PMOscillator::new(440.0 * HARMONICITY, sample_rate),
            amp_envelope: AdsrEnvelope::new(0.01, 0.01, 1.0, 0.5, sample_rate),
            mod_envelope: AdsrEnvelope::new(0.5, 0.01, 1.0, 0.5, sample_rate),
        }
    }
}

impl AudioGenerator for FmSynth {
    fn next_sample(&mut self) -> f32 {
        if !self.amp_envelope.is_active() {
            return 0.0;
        }

        // Modulation index is in radians, the oscillator takes cycles
        let depth = self.mod_envelope.next_sample() * MODULATION_INDEX / TWO_PI;
        let modulator = self.modulator.next_sample();
        let carrier = self.carrier.next_sample_with_pm(modulator * depth);

        carrier * self.amp_envelope.next_sample()
    }
}

impl Timbre for FmSynth {
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
