pub mod buffers;
pub mod context;
pub mod delays;
pub mod effects;
pub mod envelopes;
pub mod filters;
pub mod instruments;
pub mod oscillators;
pub mod reverbs;
pub mod systems;

pub const PI: f32 = std::f32::consts::PI;
pub const TWO_PI: f32 = 2.0 * PI;

/// Length of the fade used whenever a voice or an effects chain is swapped out
pub const DECLICK_SECONDS: f32 = 0.01;

// Basic trait for audio generators that produce a single sample output
pub trait AudioGenerator {
    fn next_sample(&mut self) -> f32;
}

pub trait AudioProcessor {
    fn process(&mut self, input: f32) -> f32;
}

pub trait StereoAudioProcessor {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);
}

/// A complete engine the output device pulls frames from
pub trait AudioSystem: Send {
    /// Render a single stereo frame and advance the sample clock by one
    fn next_sample(&mut self) -> (f32, f32);

    fn sample_rate(&self) -> f32;
}

pub fn sec_to_samples(seconds: f32, sample_rate: f32) -> f32 {
    seconds * sample_rate
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Linear fade-out wrapper for a node that is being replaced.
/// Once the fade has run its course the node can be dropped without a click.
pub struct Declick<T> {
    node: T,
    remaining: u32,
    total: u32,
}

impl<T> Declick<T> {
    pub fn new(node: T, sample_rate: f32) -> Self {
        Self::starting_at(node, sample_rate, 1.0)
    }

    /// Fade out a node that is currently playing at `gain` rather than at
    /// full level. The slope is the same as a full fade.
    pub fn starting_at(node: T, sample_rate: f32, gain: f32) -> Self {
        let total = sec_to_samples(DECLICK_SECONDS, sample_rate).max(1.0) as u32;
        Self {
            node,
            remaining: (total as f32 * gain.clamp(0.0, 1.0)).round() as u32,
            total,
        }
    }

    /// Current fade gain, then step towards silence
    pub fn next_gain(&mut self) -> f32 {
        let gain = self.remaining as f32 / self.total as f32;
        self.remaining = self.remaining.saturating_sub(1);
        gain
    }

    /// Gain applied to the replacement while this node fades out
    pub fn fade_in_gain(&self) -> f32 {
        1.0 - self.remaining as f32 / self.total as f32
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn node_mut(&mut self) -> &mut T {
        &mut self.node
    }
}
