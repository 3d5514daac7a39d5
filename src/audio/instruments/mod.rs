mod am_synth;
mod basic_synth;
mod fm_synth;
mod membrane_synth;
mod metal_synth;

pub use am_synth::AmSynth;
pub use basic_synth::BasicSynth;
pub use fm_synth::FmSynth;
pub use membrane_synth::MembraneSynth;
pub use metal_synth::MetalSynth;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::effects::{ChainChange, EffectsChain, EffectsConfig};
use crate::audio::{AudioGenerator, Declick};
use crate::error::{EngineError, Result};
use crate::sequencing::BIT_WIDTH;

/// Mix level of a single lane before the effects chain
const LANE_GAIN: f32 = 0.2;

/// The one trigger capability every variant implements.
///
/// `frequency` is `None` for timbres that take no pitch. `duration` is the
/// gate length in seconds; the release tail follows it.
pub trait Timbre: AudioGenerator + Send {
    fn trigger(&mut self, frequency: Option<f32>, duration: f32);

    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentVariant {
    #[default]
    Synth,
    Am,
    Fm,
    Membrane,
    Metal,
}

/// What a variant's trigger wants to be told about the note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchInput {
    Note,
    Frequency,
    Unpitched,
}

impl InstrumentVariant {
    pub const ALL: [InstrumentVariant; 5] = [
        InstrumentVariant::Synth,
        InstrumentVariant::Am,
        InstrumentVariant::Fm,
        InstrumentVariant::Membrane,
        InstrumentVariant::Metal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InstrumentVariant::Synth => "synth",
            InstrumentVariant::Am => "am",
            InstrumentVariant::Fm => "fm",
            InstrumentVariant::Membrane => "membrane",
            InstrumentVariant::Metal => "metal",
        }
    }

    pub fn pitch_input(self) -> PitchInput {
        match self {
            InstrumentVariant::Synth | InstrumentVariant::Am | InstrumentVariant::Fm => {
                PitchInput::Note
            }
            InstrumentVariant::Membrane => PitchInput::Frequency,
            InstrumentVariant::Metal => PitchInput::Unpitched,
        }
    }

    fn build_timbre(self, sample_rate: f32) -> Box<dyn Timbre> {
        match self {
            InstrumentVariant::Synth => Box::new(BasicSynth::new(sample_rate)),
            InstrumentVariant::Am => Box::new(AmSynth::new(sample_rate)),
            InstrumentVariant::Fm => Box::new(FmSynth::new(sample_rate)),
            InstrumentVariant::Membrane => Box::new(MembraneSynth::new(sample_rate)),
            InstrumentVariant::Metal => Box::new(MetalSynth::new(sample_rate)),
        }
    }
}

impl fmt::Display for InstrumentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstrumentVariant {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        InstrumentVariant::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown instrument type {:?}", s)))
    }
}

struct PendingNote {
    frequency: Option<f32>,
    duration: f32,
    at_sample: u64,
}

struct Lane {
    timbre: Box<dyn Timbre>,
    pending: Option<PendingNote>,
}

/// A live sound source bound to one instrument variant: one lane per bit,
/// summed into its own effects chain.
pub struct Voice {
    variant: InstrumentVariant,
    lanes: Vec<Lane>,
    effects: EffectsChain,
}

impl Voice {
    fn new(variant: InstrumentVariant, effects: EffectsConfig, sample_rate: f32) -> Result<Self> {
        let effects = EffectsChain::build(effects, sample_rate)?;
        let lanes = (0..BIT_WIDTH)
            .map(|_| Lane {
                timbre: variant.build_timbre(sample_rate),
                pending: None,
            })
            .collect();

        Ok(Self {
            variant,
            lanes,
            effects,
        })
    }

    pub fn variant(&self) -> InstrumentVariant {
        self.variant
    }

    pub fn pitch_input(&self) -> PitchInput {
        self.variant.pitch_input()
    }

    pub fn effects(&self) -> &EffectsChain {
        &self.effects
    }

    pub fn update_effects(&mut self, config: EffectsConfig) -> Result<ChainChange> {
        self.effects.update(config)
    }

    /// Queue a note on `lane` that starts once the sample clock reaches
    /// `at_sample`. A later trigger on the same lane replaces a queued one.
    pub fn trigger(
        &mut self,
        lane: usize,
        frequency: Option<f32>,
        duration: f32,
        at_sample: u64,
    ) -> Result<()> {
        let lane = self
            .lanes
            .get_mut(lane)
            .ok_or(EngineError::IndexOutOfRange(lane))?;

        lane.pending = Some(PendingNote {
            frequency,
            duration,
            at_sample,
        });
        Ok(())
    }

    /// Move notes that have not started yet onto `next`, so a rebuild between
    /// dispatch and playback does not swallow them. A note without a
    /// frequency plays on a pitched lane at whatever pitch that lane holds.
    fn hand_over_pending(&mut self, next: &mut Voice) {
        for (from, to) in self.lanes.iter_mut().zip(next.lanes.iter_mut()) {
            if let Some(note) = from.pending.take() {
                to.pending = Some(note);
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.lanes.iter().any(|lane| lane.pending.is_some())
    }

    pub fn is_active(&self) -> bool {
        self.lanes
            .iter()
            .any(|lane| lane.pending.is_some() || lane.timbre.is_active())
    }

    pub fn next_sample(&mut self, now: u64) -> (f32, f32) {
        let mut mix = 0.0;

        for lane in &mut self.lanes {
            if lane.pending.as_ref().is_some_and(|note| note.at_sample <= now) {
                if let Some(note) = lane.pending.take() {
                    lane.timbre.trigger(note.frequency, note.duration);
                }
            }
            if lane.timbre.is_active() {
                mix += lane.timbre.next_sample();
            }
        }

        self.effects.process(mix * LANE_GAIN)
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        tracing::debug!(variant = %self.variant, "Voice disposed");
    }
}

/// Owns the current voice and the ones being faded out after rebuilds
pub struct InstrumentFactory {
    sample_rate: f32,
    current: Option<Voice>,
    retiring: Vec<Declick<Voice>>,
}

impl InstrumentFactory {
    pub fn new(sample_rate: f32) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        Ok(Self {
            sample_rate,
            current: None,
            retiring: Vec::new(),
        })
    }

    /// Build a voice for `variant` and make it current. On failure the
    /// previous voice stays in place.
    pub fn build(&mut self, variant: InstrumentVariant, effects: EffectsConfig) -> Result<&mut Voice> {
        let mut voice = Voice::new(variant, effects, self.sample_rate)?;
        tracing::debug!(%variant, ?effects, "Voice built");

        if let Some(mut old) = self.current.take() {
            old.hand_over_pending(&mut voice);
            self.retiring.push(Declick::new(old, self.sample_rate));
        }

        Ok(self.current.insert(voice))
    }

    /// Release the current voice and anything still fading out
    pub fn dispose(&mut self) {
        self.current = None;
        self.retiring.clear();
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.current.as_ref()
    }

    pub fn voice_mut(&mut self) -> Option<&mut Voice> {
        self.current.as_mut()
    }

    pub fn is_crossfading(&self) -> bool {
        !self.retiring.is_empty()
    }

    pub fn next_sample(&mut self, now: u64) -> (f32, f32) {
        let (mut left, mut right) = match &mut self.current {
            Some(voice) => voice.next_sample(now),
            None => (0.0, 0.0),
        };

        // Voices replaced in quick succession each finish their own fade
        for retiring in &mut self.retiring {
            let gain = retiring.next_gain();
            let (old_l, old_r) = retiring.node_mut().next_sample(now);
            left += old_l * gain;
            right += old_r * gain;
        }
        self.retiring.retain(|retiring| !retiring.is_finished());

        (left, right)
    }
}
