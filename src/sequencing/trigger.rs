use std::time::Duration;

use crate::audio::instruments::{PitchInput, Voice};
use crate::sequencing::notes::{note_duration, NoteSlots, Pitch};
use crate::sequencing::BIT_WIDTH;

/// Minimum wall-clock spacing between two notes on the same bit
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// Upper bound of the random offset added to every scheduled note, seconds
pub const MAX_JITTER: f64 = 0.01;

/// The note as handed to the voice, in the form its variant takes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteValue {
    Pitch(Pitch),
    Frequency(f32),
    Unpitched,
}

impl NoteValue {
    pub fn frequency(&self) -> Option<f32> {
        match self {
            NoteValue::Pitch(pitch) => Some(pitch.frequency()),
            NoteValue::Frequency(frequency) => Some(*frequency),
            NoteValue::Unpitched => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchedNote {
    pub index: usize,
    pub value: NoteValue,
    pub duration: f32,
    /// Scheduled time plus jitter, seconds on the audio clock
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Dispatched(DispatchedNote),
    /// Same bit fired less than `DEBOUNCE` ago
    Debounced,
    /// Bad index or malformed note; nothing was played
    Rejected(String),
    /// No voice has been built yet
    NoVoice,
}

/// Resolves bit indices to notes and hands them to the current voice.
///
/// Nothing in here returns an error: every failure is logged and reported
/// as an outcome so a bad slot can never stop the transport.
pub struct NoteTrigger {
    slots: NoteSlots,
    last_triggered: [Option<Duration>; BIT_WIDTH],
    rng: fastrand::Rng,
    sample_rate: f32,
}

impl NoteTrigger {
    pub fn new(slots: NoteSlots, sample_rate: f32) -> Self {
        Self::with_rng(slots, sample_rate, fastrand::Rng::new())
    }

    /// Reproducible jitter, for tests and offline rendering
    pub fn with_seed(slots: NoteSlots, sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(slots, sample_rate, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(slots: NoteSlots, sample_rate: f32, rng: fastrand::Rng) -> Self {
        Self {
            slots,
            last_triggered: [None; BIT_WIDTH],
            rng,
            sample_rate,
        }
    }

    pub fn slots(&self) -> &NoteSlots {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut NoteSlots {
        &mut self.slots
    }

    pub fn set_slots(&mut self, slots: NoteSlots) {
        self.slots = slots;
    }

    /// Play slot `index` at `scheduled_time` (seconds on the audio clock).
    /// `wall_now` is the wall-clock reading used for debouncing.
    pub fn trigger(
        &mut self,
        voice: Option<&mut Voice>,
        index: usize,
        scheduled_time: f64,
        wall_now: Duration,
    ) -> TriggerOutcome {
        let Some(voice) = voice else {
            tracing::warn!(index, "No voice to play note on");
            return TriggerOutcome::NoVoice;
        };

        if index >= BIT_WIDTH {
            tracing::warn!(index, "Invalid note attempt");
            return TriggerOutcome::Rejected(format!("bit index {} is out of range", index));
        }

        if let Some(last) = self.last_triggered[index] {
            if wall_now.saturating_sub(last) < DEBOUNCE {
                return TriggerOutcome::Debounced;
            }
        }
        self.last_triggered[index] = Some(wall_now);

        let pitch = match self.slots.resolve(index) {
            Ok(pitch) => pitch,
            Err(err) => {
                tracing::warn!(index, %err, "Invalid note format");
                return TriggerOutcome::Rejected(err.to_string());
            }
        };

        // NOTE_DURATIONS always covers every valid index
        let duration = note_duration(index).unwrap_or(0.5);

        let value = match voice.pitch_input() {
            PitchInput::Note => NoteValue::Pitch(pitch),
            PitchInput::Frequency => NoteValue::Frequency(pitch.frequency()),
            PitchInput::Unpitched => NoteValue::Unpitched,
        };

        let time = scheduled_time + self.rng.f64() * MAX_JITTER;
        let at_sample = (time * self.sample_rate as f64).round() as u64;

        if let Err(err) = voice.trigger(index, Some(pitch.frequency()), duration, at_sample) {
            tracing::warn!(index, %err, "Note dispatch failed");
            return TriggerOutcome::Rejected(err.to_string());
        }

        tracing::debug!(index, note = %pitch, duration, time, "Playing note");

        TriggerOutcome::Dispatched(DispatchedNote {
            index,
            value,
            duration,
            time,
        })
    }
}
