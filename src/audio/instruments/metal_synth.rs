use crate::audio::envelopes::AdsrEnvelope;
use crate::audio::filters::{FilterMode, SVF};
use crate::audio::instruments::Timbre;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::{AudioGenerator, AudioProcessor};

const BASE_FREQUENCY: f32 = 200.0;
const RESONANCE: f32 = 4000.0;

// Inharmonic partial ratios of a struck metal plate
const PARTIAL_RATIOS: [f32; 6] = [1.0, 1.483, 1.932, 2.546, 2.63, 3.897];

/// Unpitched metallic hit: six square partials at fixed inharmonic ratios
/// through a resonant band-pass and a high-pass. The note pitch is ignored.
pub struct MetalSynth {
    partials: [Oscillator; 6],
    bandpass: SVF,
    highpass: SVF,
    amp_envelope: AdsrEnvelope,
}

impl MetalSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            partials: std::array::from_fn(|i| {
                Oscillator::new(
                    Waveform::Square,
                    BASE_FREQUENCY * PARTIAL_RATIOS[i],
                    sample_rate,
                )
            }),
            bandpass: SVF::new(RESONANCE, 1.5, FilterMode::Bandpass, sample_rate),
            highpass: SVF::new(RESONANCE * 0.75, 0.707, FilterMode::Highpass, sample_rate),
            amp_envelope: AdsrEnvelope::new(0.001, 1.4, 0.0, 0.2, sample_rate),
        }
    }
}

impl AudioGenerator for MetalSynth {
    fn next_sample(&mut self) -> f32 {
        if !self.amp_envelope.is_active() {
            return 0.0;
        }

        let sum: f32 = self.partials.iter_mut().map(|p| p.next_sample()).sum();
        let filtered = self.highpass.process(self.bandpass.process(sum));

        // Same saturation stage as the noise hats
        (filtered * 2.0).tanh() * 0.5 * self.amp_envelope.next_sample()
    }
}

impl Timbre for MetalSynth {
    fn trigger(&mut self, _frequency: Option<f32>, duration: f32) {
        self.amp_envelope.trigger(duration);
    }

    fn is_active(&self) -> bool {
        self.amp_envelope.is_active()
    }
}
