use serde::{Deserialize, Serialize};

use crate::audio::delays::FilteredDelayLine;
use crate::audio::filters::{FilterMode, SVF};
use crate::audio::reverbs::ReverbLite;
use crate::audio::{db_to_gain, AudioProcessor, Declick, StereoAudioProcessor};
use crate::error::{EngineError, Result};

/// Above this the filter is fully open and left out of the signal path
pub const FILTER_BYPASS_THRESHOLD: f32 = 0.95;
/// Delay and reverb are only built when their amount exceeds this
pub const WET_THRESHOLD: f32 = 0.1;

pub const DELAY_SECONDS: f32 = 0.25;
const FILTER_Q: f32 = 0.707;

/// User-facing effect amounts, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectsConfig {
    pub reverb: f32,
    pub delay: f32,
    pub filter: f32,
    pub volume: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            reverb: 0.0,
            delay: 0.0,
            filter: 1.0,
            volume: 0.8,
        }
    }
}

impl EffectsConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("reverb", self.reverb),
            ("delay", self.delay),
            ("filter", self.filter),
            ("volume", self.volume),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidEffects { name, value });
            }
        }
        Ok(())
    }
}

/// 0 maps to 100 Hz, 1 to 20 kHz, exponentially in between
pub fn filter_cutoff(filter: f32) -> f32 {
    100.0 * 200f32.powf(filter)
}

/// 0 maps to -10 dB, 1 to +10 dB
pub fn volume_to_db(volume: f32) -> f32 {
    volume * 20.0 - 10.0
}

pub fn delay_feedback(delay: f32) -> f32 {
    0.2 + 0.5 * delay
}

pub fn reverb_feedback(reverb: f32) -> f32 {
    0.5 + 0.4 * reverb
}

/// Which optional stages a configuration puts in the signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub filter: bool,
    pub delay: bool,
    pub reverb: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainChange {
    /// Parameters were applied to the running stages
    Updated,
    /// The stages were rebuilt and the old ones are fading out
    Rebuilt,
}

struct Stages {
    filter: Option<SVF>,
    delay: Option<(FilteredDelayLine, f32)>,
    reverb: Option<(ReverbLite, f32)>,
    gain: f32,
}

impl Stages {
    fn new(config: &EffectsConfig, sample_rate: f32) -> Self {
        let topology = EffectsChain::topology(config);

        let filter = topology.filter.then(|| {
            SVF::new(
                filter_cutoff(config.filter),
                FILTER_Q,
                FilterMode::Lowpass,
                sample_rate,
            )
        });

        let delay = topology.delay.then(|| {
            let mut delay = FilteredDelayLine::new(DELAY_SECONDS * 2.0, sample_rate);
            delay.set_delay_seconds(DELAY_SECONDS);
            delay.set_feedback(delay_feedback(config.delay));
            (delay, config.delay)
        });

        let reverb = topology.reverb.then(|| {
            let mut reverb = ReverbLite::new(sample_rate);
            reverb.set_feedback(reverb_feedback(config.reverb));
            (reverb, config.reverb)
        });

        Self {
            filter,
            delay,
            reverb,
            gain: db_to_gain(volume_to_db(config.volume)),
        }
    }

    fn topology(&self) -> Topology {
        Topology {
            filter: self.filter.is_some(),
            delay: self.delay.is_some(),
            reverb: self.reverb.is_some(),
        }
    }

    fn apply(&mut self, config: &EffectsConfig) {
        if let Some(filter) = &mut self.filter {
            filter.set_cutoff_frequency(filter_cutoff(config.filter));
        }
        if let Some((delay, wet)) = &mut self.delay {
            delay.set_feedback(delay_feedback(config.delay));
            *wet = config.delay;
        }
        if let Some((reverb, wet)) = &mut self.reverb {
            reverb.set_feedback(reverb_feedback(config.reverb));
            *wet = config.reverb;
        }
        self.gain = db_to_gain(volume_to_db(config.volume));
    }

    fn process(&mut self, input: f32) -> (f32, f32) {
        let mut mono = input;

        if let Some(filter) = &mut self.filter {
            mono = filter.process(mono);
        }

        if let Some((delay, wet)) = &mut self.delay {
            let delayed = delay.process(mono);
            mono = mono * (1.0 - *wet) + delayed * *wet;
        }

        let (left, right) = match &mut self.reverb {
            Some((reverb, wet)) => {
                let (rev_l, rev_r) = StereoAudioProcessor::process(reverb, mono, mono);
                let dry = mono * (1.0 - *wet);
                (dry + rev_l * *wet, dry + rev_r * *wet)
            }
            None => (mono, mono),
        };

        (left * self.gain, right * self.gain)
    }
}

/// Linear pipeline: filter -> delay -> reverb -> gain.
///
/// Parameter changes that keep the same set of stages are applied in place.
/// Anything that adds or removes a stage builds fresh stages; the old ones are
/// crossfaded out and only then disconnected and dropped.
pub struct EffectsChain {
    config: EffectsConfig,
    active: Stages,
    // Fade-in of `active` after a rebuild
    fade_in: Option<Declick<()>>,
    retiring: Vec<Declick<Stages>>,
    sample_rate: f32,
}

impl EffectsChain {
    pub fn build(config: EffectsConfig, sample_rate: f32) -> Result<Self> {
        config.validate()?;
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        Ok(Self {
            active: Stages::new(&config, sample_rate),
            config,
            fade_in: None,
            retiring: Vec::new(),
            sample_rate,
        })
    }

    pub fn topology(config: &EffectsConfig) -> Topology {
        Topology {
            filter: config.filter <= FILTER_BYPASS_THRESHOLD,
            delay: config.delay > WET_THRESHOLD,
            reverb: config.reverb > WET_THRESHOLD,
        }
    }

    pub fn current_topology(&self) -> Topology {
        self.active.topology()
    }

    pub fn config(&self) -> EffectsConfig {
        self.config
    }

    pub fn gain(&self) -> f32 {
        self.active.gain
    }

    pub fn update(&mut self, config: EffectsConfig) -> Result<ChainChange> {
        config.validate()?;

        let change = if Self::topology(&config) == self.active.topology() {
            self.active.apply(&config);
            ChainChange::Updated
        } else {
            let old = std::mem::replace(&mut self.active, Stages::new(&config, self.sample_rate));
            // The outgoing stages may themselves still be fading in
            let level = self.active_gain();
            self.retiring
                .push(Declick::starting_at(old, self.sample_rate, level));
            self.fade_in = Some(Declick::new((), self.sample_rate));
            ChainChange::Rebuilt
        };

        tracing::debug!(?config, ?change, "Effects chain updated");
        self.config = config;
        Ok(change)
    }

    pub fn is_crossfading(&self) -> bool {
        self.fade_in.is_some() || !self.retiring.is_empty()
    }

    fn active_gain(&self) -> f32 {
        self.fade_in.as_ref().map_or(1.0, Declick::fade_in_gain)
    }

    pub fn process(&mut self, input: f32) -> (f32, f32) {
        if !self.is_crossfading() {
            return self.active.process(input);
        }

        let fade_in = self.active_gain();
        if let Some(ramp) = &mut self.fade_in {
            ramp.next_gain();
            if ramp.is_finished() {
                self.fade_in = None;
            }
        }

        let (new_l, new_r) = self.active.process(input);
        let (mut left, mut right) = (new_l * fade_in, new_r * fade_in);

        // Every chain replaced mid-fade keeps its own ramp down to silence
        for retiring in &mut self.retiring {
            let fade_out = retiring.next_gain();
            let (old_l, old_r) = retiring.node_mut().process(input);
            left += old_l * fade_out;
            right += old_r * fade_out;
        }
        self.retiring.retain(|retiring| !retiring.is_finished());

        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn config(filter: f32, delay: f32, reverb: f32) -> EffectsConfig {
        EffectsConfig {
            reverb,
            delay,
            filter,
            volume: 0.5,
        }
    }

    #[test]
    fn test_stage_presence_thresholds() {
        assert!(EffectsChain::topology(&config(0.0, 0.0, 0.0)).filter);
        assert!(EffectsChain::topology(&config(0.95, 0.0, 0.0)).filter);
        assert!(!EffectsChain::topology(&config(0.96, 0.0, 0.0)).filter);

        assert!(!EffectsChain::topology(&config(1.0, 0.1, 0.0)).delay);
        assert!(EffectsChain::topology(&config(1.0, 0.11, 0.0)).delay);

        assert!(!EffectsChain::topology(&config(1.0, 0.0, 0.1)).reverb);
        assert!(EffectsChain::topology(&config(1.0, 0.0, 0.11)).reverb);
    }

    #[test]
    fn test_volume_maps_to_decibel_range() {
        assert!((volume_to_db(0.0) + 10.0).abs() < 1e-6);
        assert!((volume_to_db(0.5)).abs() < 1e-6);
        assert!((volume_to_db(1.0) - 10.0).abs() < 1e-6);

        let chain = EffectsChain::build(config(1.0, 0.0, 0.0), SAMPLE_RATE).unwrap();
        assert!((chain.gain() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_filter_cutoff_range() {
        assert!((filter_cutoff(0.0) - 100.0).abs() < 1e-3);
        assert!((filter_cutoff(1.0) - 20000.0).abs() < 1.0);
    }

    #[test]
    fn test_open_chain_is_transparent() {
        let mut chain = EffectsChain::build(config(1.0, 0.0, 0.0), SAMPLE_RATE).unwrap();

        for input in [0.0, 0.25, -0.5, 1.0] {
            let (l, r) = chain.process(input);
            assert!((l - input).abs() < 1e-6);
            assert!((r - input).abs() < 1e-6);
        }
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let result = EffectsChain::build(config(1.5, 0.0, 0.0), SAMPLE_RATE);
        assert!(matches!(
            result,
            Err(EngineError::InvalidEffects { name: "filter", .. })
        ));

        let mut chain = EffectsChain::build(EffectsConfig::default(), SAMPLE_RATE).unwrap();
        assert!(chain.update(config(1.0, f32::NAN, 0.0)).is_err());
        assert_eq!(chain.config(), EffectsConfig::default());
    }

    #[test]
    fn test_update_in_place_keeps_topology() {
        let mut chain = EffectsChain::build(config(0.5, 0.5, 0.0), SAMPLE_RATE).unwrap();
        let change = chain.update(config(0.3, 0.8, 0.0)).unwrap();

        assert_eq!(change, ChainChange::Updated);
        assert!(!chain.is_crossfading());
        assert_eq!(chain.config().delay, 0.8);
    }

    #[test]
    fn test_topology_change_crossfades_without_clicks() {
        let mut chain = EffectsChain::build(config(1.0, 0.0, 0.0), SAMPLE_RATE).unwrap();

        // Steady DC so any discontinuity shows up as a jump
        for _ in 0..100 {
            chain.process(0.5);
        }

        let change = chain.update(config(1.0, 0.5, 0.0)).unwrap();
        assert_eq!(change, ChainChange::Rebuilt);
        assert!(chain.is_crossfading());

        let mut previous = 0.5f32;
        let mut max_step = 0.0f32;
        for _ in 0..(0.02 * SAMPLE_RATE) as usize {
            let (l, _) = chain.process(0.5);
            max_step = max_step.max((l - previous).abs());
            previous = l;
        }

        println!("Effects crossfade max step: {}", max_step);
        assert!(!chain.is_crossfading());
        assert!(max_step < 0.01);
    }

    #[test]
    fn test_rebuild_during_crossfade_finishes_every_fade() {
        let mut chain = EffectsChain::build(config(1.0, 0.0, 0.0), SAMPLE_RATE).unwrap();
        for _ in 0..100 {
            chain.process(0.5);
        }

        // Three topology changes, each inside the previous fade window
        let mut previous = 0.5f32;
        let mut max_step = 0.0f32;
        for next in [config(0.5, 0.0, 0.0), config(1.0, 0.0, 0.0), config(0.5, 0.0, 0.0)] {
            assert_eq!(chain.update(next).unwrap(), ChainChange::Rebuilt);
            for _ in 0..(0.004 * SAMPLE_RATE) as usize {
                let (l, _) = chain.process(0.5);
                max_step = max_step.max((l - previous).abs());
                previous = l;
            }
        }
        assert!(chain.is_crossfading());

        for _ in 0..(0.02 * SAMPLE_RATE) as usize {
            let (l, _) = chain.process(0.5);
            max_step = max_step.max((l - previous).abs());
            previous = l;
        }

        println!("Overlapping rebuilds max step: {}", max_step);
        assert!(!chain.is_crossfading());
        assert!(max_step < 0.01);
    }

    #[test]
    fn test_reverb_adds_tail() {
        let mut chain = EffectsChain::build(config(1.0, 0.0, 0.8), SAMPLE_RATE).unwrap();

        chain.process(1.0);
        let tail: f32 = (0..(0.3 * SAMPLE_RATE) as usize)
            .map(|_| {
                let (l, r) = chain.process(0.0);
                l.abs() + r.abs()
            })
            .sum();

        println!("Reverb tail energy: {}", tail);
        assert!(tail > 0.0);
    }
}
