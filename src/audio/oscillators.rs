use crate::audio::{AudioGenerator, TWO_PI};
use once_cell::sync::Lazy;

const SINE_TABLE_SIZE: usize = 4096;

static SINE_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..SINE_TABLE_SIZE)
        .map(|i| (i as f32 * TWO_PI / SINE_TABLE_SIZE as f32).sin())
        .collect()
});

fn sine_lookup(phase: f32) -> f32 {
    let wrapped = phase - phase.floor();
    let table_index = ((wrapped * SINE_TABLE_SIZE as f32) as usize) % SINE_TABLE_SIZE;
    SINE_TABLE[table_index]
}

pub struct PhaseGenerator {
    phase: f32,
    phase_increment: f32,
    frequency: f32,
    sample_rate: f32,
}

impl PhaseGenerator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            frequency,
            sample_rate,
            phase_increment: frequency / sample_rate,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.phase_increment = frequency / self.sample_rate;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample = self.phase;
        self.phase += self.phase_increment;

        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Naive single-waveform oscillator
pub struct Oscillator {
    phase_gen: PhaseGenerator,
    waveform: Waveform,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase_gen: PhaseGenerator::new(frequency, sample_rate),
            waveform,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_gen.set_frequency(frequency);
    }

    pub fn frequency(&self) -> f32 {
        self.phase_gen.frequency()
    }

    pub fn reset(&mut self) {
        self.phase_gen.reset();
    }
}

impl AudioGenerator for Oscillator {
    fn next_sample(&mut self) -> f32 {
        let phase = self.phase_gen.next_sample();
        match self.waveform {
            Waveform::Sine => sine_lookup(phase),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// Sine oscillator whose phase can be offset per sample by a modulator
pub struct PMOscillator {
    phase_gen: PhaseGenerator,
}

impl PMOscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase_gen: PhaseGenerator::new(frequency, sample_rate),
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_gen.set_frequency(frequency);
    }

    pub fn reset(&mut self) {
        self.phase_gen.reset();
    }

    /// `pm` is expressed in cycles: 1.0 shifts the phase by a full period
    pub fn next_sample_with_pm(&mut self, pm: f32) -> f32 {
        let phase = self.phase_gen.next_sample();
        sine_lookup(phase + pm)
    }
}

impl AudioGenerator for PMOscillator {
    fn next_sample(&mut self) -> f32 {
        self.next_sample_with_pm(0.0)
    }
}
