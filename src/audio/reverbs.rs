use crate::audio::delays::DelayLine;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::{AudioGenerator, AudioProcessor, StereoAudioProcessor};

// Fast Hadamard Transform for 4x4
fn fast_hadamard_transform_4(signals: &mut [f32; 4]) {
    // Stage 1: 4 -> 2 blocks
    let mut temp = [0.0f32; 4];
    for i in 0..2 {
        temp[i] = signals[i] + signals[i + 2];
        temp[i + 2] = signals[i] - signals[i + 2];
    }
    *signals = temp;

    // Stage 2: 2 -> 1 blocks
    for i in 0..2 {
        let base = i * 2;
        temp[base] = signals[base] + signals[base + 1];
        temp[base + 1] = signals[base] - signals[base + 1];
    }
    *signals = temp;

    // Normalize by 1/sqrt(4) = 0.5 for energy conservation
    for signal in signals.iter_mut() {
        *signal *= 0.5;
    }
}

pub struct DiffusionStage4 {
    delay_lines: [DelayLine; 4],
    flip_polarity: [bool; 4],
}

impl DiffusionStage4 {
    pub fn new(min_delay_seconds: f32, max_delay_seconds: f32, sample_rate: f32) -> Self {
        let segment_size = (max_delay_seconds - min_delay_seconds) / 4.0;

        // One channel per equal segment of the range, at a random point inside it
        let delay_lines = std::array::from_fn(|c| {
            let segment_start = min_delay_seconds + (c as f32 * segment_size);
            let segment_start_us = (segment_start * 1_000_000.0) as i32;
            let segment_end_us = ((segment_start + segment_size) * 1_000_000.0) as i32;

            let delay_seconds =
                fastrand::i32(segment_start_us..segment_end_us) as f32 / 1_000_000.0;

            let mut delay_line = DelayLine::new(delay_seconds, sample_rate);
            delay_line.set_delay_seconds(delay_seconds);
            delay_line
        });

        Self {
            delay_lines,
            flip_polarity: std::array::from_fn(|_| fastrand::bool()),
        }
    }

    pub fn process(&mut self, input: [f32; 4]) -> [f32; 4] {
        let mut delayed = [0.0f32; 4];
        for i in 0..4 {
            delayed[i] = AudioProcessor::process(&mut self.delay_lines[i], input[i]);
        }

        fast_hadamard_transform_4(&mut delayed);

        for i in 0..4 {
            if self.flip_polarity[i] {
                delayed[i] = -delayed[i];
            }
        }

        delayed
    }
}

pub struct FeedbackStage4 {
    base_delays: [f32; 4],
    delay_lines: [DelayLine; 4],
    lfos: [Oscillator; 2], // Two LFOs shared across the four channels
    feedback: f32,
    modulation_depth: f32,
}

impl FeedbackStage4 {
    pub fn new(min_delay_seconds: f32, max_delay_seconds: f32, sample_rate: f32) -> Self {
        // Exponential distribution between min and max
        let base_delays: [f32; 4] = std::array::from_fn(|c| {
            let r = c as f32 / 3.0;
            min_delay_seconds * (max_delay_seconds / min_delay_seconds).powf(r)
        });
        let delay_lines =
            std::array::from_fn(|c| DelayLine::new(base_delays[c] * 2.5, sample_rate));

        let mut stage = Self {
            base_delays,
            delay_lines,
            lfos: [
                Oscillator::new(Waveform::Sine, 0.19, sample_rate),
                Oscillator::new(Waveform::Sine, 0.37, sample_rate),
            ],
            feedback: 0.0,
            modulation_depth: 0.0,
        };
        stage.set_feedback(0.5);
        stage
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.98);
        for delay_line in &mut self.delay_lines {
            delay_line.set_feedback(self.feedback);
        }
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_modulation_depth(&mut self, depth: f32) {
        self.modulation_depth = depth.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, diffusion: [f32; 4]) -> [f32; 4] {
        // Unipolar modulation values
        let lfo_values = [
            (self.lfos[0].next_sample() + 1.0) * 0.5,
            (self.lfos[1].next_sample() + 1.0) * 0.5,
        ];

        let mut echoes = [0.0f32; 4];
        for i in 0..4 {
            let lfo_value = lfo_values[i % 2];
            let modulated_delay =
                self.base_delays[i] * (1.0 + lfo_value * self.modulation_depth * 0.1);
            echoes[i] = self.delay_lines[i].read_at(modulated_delay);
        }

        fast_hadamard_transform_4(&mut echoes);

        for i in 0..4 {
            self.delay_lines[i].write(diffusion[i], echoes[i]);
        }

        echoes
    }
}

/// Four-channel feedback delay network reverb. Returns the wet signal only.
// Design from https://signalsmith-audio.co.uk/writing/2021/lets-write-a-reverb/
pub struct ReverbLite {
    diffusion_stages: [DiffusionStage4; 4],
    feedback_stage: FeedbackStage4,
}

impl ReverbLite {
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Self {
            // 10-25ms and 25-50ms diffusion
            diffusion_stages: [
                DiffusionStage4::new(0.01, 0.025, sample_rate),
                DiffusionStage4::new(0.01, 0.025, sample_rate),
                DiffusionStage4::new(0.025, 0.05, sample_rate),
                DiffusionStage4::new(0.025, 0.05, sample_rate),
            ],
            // 50-150ms late reflections
            feedback_stage: FeedbackStage4::new(0.05, 0.150, sample_rate),
        };
        // Slow delay drift
        reverb.feedback_stage.set_modulation_depth(0.5);
        reverb
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback_stage.set_feedback(feedback);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback_stage.feedback()
    }
}

impl StereoAudioProcessor for ReverbLite {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut reflections = [0.0f32; 4];
        reflections[0] = left * 0.5;
        reflections[3] = right * 0.5;

        for stage in &mut self.diffusion_stages {
            reflections = stage.process(reflections);
        }

        let echoes = self.feedback_stage.process(reflections);

        // Mix down to stereo, pairing even and odd channels
        let mut out_left = 0.0;
        let mut out_right = 0.0;
        for i in 0..2 {
            out_left += (echoes[i * 2] * 0.7) + (reflections[i * 2] * 0.3);
            out_right += (echoes[i * 2 + 1] * 0.7) + (reflections[i * 2 + 1] * 0.3);
        }

        (out_left, out_right)
    }
}
