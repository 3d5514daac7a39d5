use crate::audio::{sec_to_samples, AudioGenerator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveType {
    Linear,
    Exponential,
    Logarithmic,
}

fn apply_curve(progress: f32, curve_type: CurveType) -> f32 {
    match curve_type {
        CurveType::Linear => progress,
        CurveType::Exponential => progress * progress,
        CurveType::Logarithmic => 1.0 - (1.0 - progress).powi(2),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Attack-release envelope used for modulation and pitch sweeps
pub struct AREnvelope {
    attack_time: f32,
    release_time: f32,
    attack_curve: CurveType,
    release_curve: CurveType,

    pub(crate) state: EnvelopeState,
    current_level: f32,
    attack_samples: u32,
    release_samples: u32,
    current_sample: u32,
    sample_rate: f32,
}

impl AREnvelope {
    pub fn new(sample_rate: f32) -> Self {
        let mut envelope = Self {
            attack_time: 0.01,
            release_time: 0.1,
            attack_curve: CurveType::Logarithmic,
            release_curve: CurveType::Exponential,

            state: EnvelopeState::Idle,
            current_level: 0.0,
            attack_samples: 0,
            release_samples: 0,
            current_sample: 0,
            sample_rate,
        };
        envelope.calculate_parameters();
        envelope
    }

    pub fn set_attack_time(&mut self, time: f32) {
        self.attack_time = time.max(0.001);
        self.calculate_parameters();
    }

    pub fn set_release_time(&mut self, time: f32) {
        self.release_time = time.max(0.001);
        self.calculate_parameters();
    }

    pub fn set_attack_curve(&mut self, curve: CurveType) {
        self.attack_curve = curve;
    }

    pub fn set_release_curve(&mut self, curve: CurveType) {
        self.release_curve = curve;
    }

    fn calculate_parameters(&mut self) {
        self.attack_samples = sec_to_samples(self.attack_time, self.sample_rate) as u32;
        self.release_samples = sec_to_samples(self.release_time, self.sample_rate) as u32;
    }

    pub fn trigger(&mut self) {
        self.state = EnvelopeState::Attack;
        self.current_sample = 0;
    }

    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }
}

impl AudioGenerator for AREnvelope {
    fn next_sample(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Attack => {
                if self.current_sample >= self.attack_samples {
                    self.state = EnvelopeState::Release;
                    self.current_sample = 0;
                    self.current_level = 1.0;
                } else {
                    let progress = self.current_sample as f32 / self.attack_samples as f32;
                    self.current_level = apply_curve(progress, self.attack_curve);
                    self.current_sample += 1;
                }
                self.current_level
            }

            EnvelopeState::Release => {
                if self.current_sample >= self.release_samples {
                    self.state = EnvelopeState::Idle;
                    self.current_level = 0.0;
                } else {
                    let progress = self.current_sample as f32 / self.release_samples as f32;
                    self.current_level = 1.0 - apply_curve(progress, self.release_curve);
                    self.current_sample += 1;
                }
                self.current_level
            }

            _ => 0.0,
        }
    }
}

/// Gated attack-decay-sustain-release envelope.
///
/// `trigger` takes the note duration: the envelope holds (attack, decay,
/// sustain) for that long and then releases on its own. Retriggering while
/// the envelope is still sounding ramps up from the current level rather
/// than jumping back to zero.
pub struct AdsrEnvelope {
    attack_samples: u32,
    decay_samples: u32,
    sustain_level: f32,
    release_samples: u32,
    attack_curve: CurveType,
    release_curve: CurveType,

    pub(crate) state: EnvelopeState,
    current_level: f32,
    stage_start_level: f32,
    stage_sample: u32,
    gate_samples: u32,
    gate_elapsed: u32,
    sample_rate: f32,
}

impl AdsrEnvelope {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32, sample_rate: f32) -> Self {
        Self {
            attack_samples: sec_to_samples(attack.max(0.001), sample_rate) as u32,
            decay_samples: sec_to_samples(decay.max(0.001), sample_rate) as u32,
            sustain_level: sustain.clamp(0.0, 1.0),
            release_samples: sec_to_samples(release.max(0.001), sample_rate) as u32,
            attack_curve: CurveType::Linear,
            release_curve: CurveType::Exponential,

            state: EnvelopeState::Idle,
            current_level: 0.0,
            stage_start_level: 0.0,
            stage_sample: 0,
            gate_samples: 0,
            gate_elapsed: 0,
            sample_rate,
        }
    }

    pub fn set_attack_curve(&mut self, curve: CurveType) {
        self.attack_curve = curve;
    }

    pub fn set_release_curve(&mut self, curve: CurveType) {
        self.release_curve = curve;
    }

    pub fn trigger(&mut self, gate_seconds: f32) {
        self.state = EnvelopeState::Attack;
        self.stage_start_level = self.current_level;
        self.stage_sample = 0;
        self.gate_samples = sec_to_samples(gate_seconds.max(0.0), self.sample_rate) as u32;
        self.gate_elapsed = 0;
    }

    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    pub fn level(&self) -> f32 {
        self.current_level
    }

    fn enter(&mut self, state: EnvelopeState) {
        self.state = state;
        self.stage_start_level = self.current_level;
        self.stage_sample = 0;
    }

    fn progress(&self, stage_samples: u32) -> f32 {
        if stage_samples == 0 {
            1.0
        } else {
            (self.stage_sample as f32 / stage_samples as f32).min(1.0)
        }
    }
}

impl AudioGenerator for AdsrEnvelope {
    fn next_sample(&mut self) -> f32 {
        if matches!(
            self.state,
            EnvelopeState::Attack | EnvelopeState::Decay | EnvelopeState::Sustain
        ) {
            if self.gate_elapsed >= self.gate_samples {
                self.enter(EnvelopeState::Release);
            } else {
                self.gate_elapsed += 1;
            }
        }

        match self.state {
            EnvelopeState::Idle => {
                self.current_level = 0.0;
            }

            EnvelopeState::Attack => {
                let progress = self.progress(self.attack_samples);
                let shaped = apply_curve(progress, self.attack_curve);
                self.current_level =
                    self.stage_start_level + (1.0 - self.stage_start_level) * shaped;
                self.stage_sample += 1;
                if self.stage_sample >= self.attack_samples {
                    self.current_level = 1.0;
                    self.enter(EnvelopeState::Decay);
                }
            }

            EnvelopeState::Decay => {
                let progress = self.progress(self.decay_samples);
                let shaped = apply_curve(progress, self.release_curve);
                self.current_level = 1.0 - (1.0 - self.sustain_level) * shaped;
                self.stage_sample += 1;
                if self.stage_sample >= self.decay_samples {
                    self.current_level = self.sustain_level;
                    self.enter(EnvelopeState::Sustain);
                }
            }

            EnvelopeState::Sustain => {
                self.current_level = self.sustain_level;
            }

            EnvelopeState::Release => {
                let progress = self.progress(self.release_samples);
                let shaped = apply_curve(progress, self.release_curve);
                self.current_level = self.stage_start_level * (1.0 - shaped);
                self.stage_sample += 1;
                if self.stage_sample >= self.release_samples {
                    self.current_level = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
        }

        self.current_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn test_ar_envelope_basic_operation() {
        let mut env = AREnvelope::new(SAMPLE_RATE);
        env.set_attack_time(0.1);
        env.set_release_time(0.2);

        assert_eq!(env.next_sample(), 0.0);
        assert!(!env.is_active());

        env.trigger();
        assert!(env.is_active());

        let mut max_level = 0.0f32;
        let mut samples = 0;
        while env.is_active() {
            max_level = max_level.max(env.next_sample());
            samples += 1;
            if samples > 20000 {
                break;
            }
        }

        println!("AR envelope: {} samples, max level {}", samples, max_level);

        assert!((max_level - 1.0).abs() < 1e-3);
        assert!(samples > 0);
        assert_eq!(env.next_sample(), 0.0);
    }

    #[test]
    fn test_adsr_gate_controls_total_length() {
        let mut env = AdsrEnvelope::new(0.01, 0.1, 0.3, 0.5, SAMPLE_RATE);
        env.trigger(0.4);

        let mut samples = 0u32;
        let mut levels = Vec::new();
        while env.is_active() {
            levels.push(env.next_sample());
            samples += 1;
            if samples > 100_000 {
                break;
            }
        }

        let expected = ((0.4 + 0.5) * SAMPLE_RATE) as i64;
        println!("ADSR length: {} samples, expected ~{}", samples, expected);
        assert!((samples as i64 - expected).abs() <= 4);

        let max_level = levels.iter().fold(0.0f32, |a, &b| a.max(b));
        let min_level = levels.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        assert!(max_level <= 1.0 && max_level > 0.99);
        assert!(min_level >= 0.0);

        // Sustain plateau is reached before the gate closes
        let plateau = levels[(0.3 * SAMPLE_RATE) as usize];
        assert!((plateau - 0.3).abs() < 1e-3, "plateau was {}", plateau);
    }

    #[test]
    fn test_adsr_retrigger_starts_from_current_level() {
        let mut env = AdsrEnvelope::new(0.05, 0.1, 0.5, 0.5, SAMPLE_RATE);
        env.trigger(1.0);
        for _ in 0..(0.2 * SAMPLE_RATE) as usize {
            env.next_sample();
        }
        let before = env.level();
        assert!(before > 0.4);

        env.trigger(1.0);
        let after = env.next_sample();

        // No discontinuity back to zero
        assert!(
            (after - before).abs() < 0.01,
            "retrigger jumped from {} to {}",
            before,
            after
        );
    }

    #[test]
    fn test_adsr_release_is_smooth() {
        let mut env = AdsrEnvelope::new(0.01, 0.01, 0.8, 0.2, SAMPLE_RATE);
        env.trigger(0.05);

        let mut previous = 0.0f32;
        let mut max_step = 0.0f32;
        while env.is_active() {
            let level = env.next_sample();
            max_step = max_step.max((level - previous).abs());
            previous = level;
        }

        println!("ADSR max step: {}", max_step);
        assert!(max_step < 0.01);
    }
}
