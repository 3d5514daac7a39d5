use crate::audio::envelopes::{AREnvelope, AdsrEnvelope, CurveType};
use crate::audio::instruments::Timbre;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::AudioGenerator;

const PITCH_DECAY: f32 = 0.05;
const FREQUENCY_RATIO: f32 = 10.0;

/// Pitched drum: a sine that sweeps down from ten times the note frequency
/// over the first 50 ms.
pub struct MembraneSynth {
    oscillator: Oscillator,
    amp_envelope: AdsrEnvelope,
    freq_envelope: AREnvelope,
    base_frequency: f32,
}

impl MembraneSynth {
    pub fn new(sample_rate: f32) -> Self {
        let mut membrane = Self {
            oscillator: Oscillator::new(Waveform::Sine, 60.0, sample_rate),
            amp_envelope: AdsrEnvelope::new(0.001, 0.4, 0.01, 1.4, sample_rate),
            freq_envelope: AREnvelope::new(sample_rate),
            base_frequency: 60.0,
        };

        membrane.freq_envelope.set_attack_time(0.001);
        membrane.freq_envelope.set_release_time(PITCH_DECAY);
        membrane.freq_envelope.set_attack_curve(CurveType::Linear);
        membrane.freq_envelope.set_release_curve(CurveType::Logarithmic);

        membrane
    }
}

impl AudioGenerator for MembraneSynth {
    fn next_sample(&mut self) -> f32 {
        if !self.amp_envelope.is_active() {
            return 0.0;
        }

        // Exponential sweep: ratio^1 at the top, ratio^0 once the envelope is done
        let freq_env = self.freq_envelope.next_sample();
        self.oscillator
            .set_frequency(self.base_frequency * FREQUENCY_RATIO.powf(freq_env));

        self.oscillator.next_sample() * self.amp_envelope.next_sample()
    }
}

impl Timbre for MembraneSynth {
    fn trigger(&mut self, frequency: Option<f32>, duration: f32) {
        if let Some(frequency) = frequency {
            self.base_frequency = frequency;
        }
        self.amp_envelope.trigger(duration);
        self.freq_envelope.trigger();
    }

    fn is_active(&self) -> bool {
        self.amp_envelope.is_active()
    }
}
