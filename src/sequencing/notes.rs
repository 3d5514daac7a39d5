use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::sequencing::BIT_WIDTH;

pub const DEFAULT_NOTES: [&str; BIT_WIDTH] =
    ["D4", "E4", "F4", "G4", "A5", "C5", "D5", "E5", "F5", "G5"];

/// Gate length per slot in seconds. Faster-changing bits get shorter notes.
pub const NOTE_DURATIONS: [f32; BIT_WIDTH] = [1.7, 1.5, 1.3, 1.2, 0.9, 0.7, 0.6, 0.5, 0.5, 0.4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

/// A note name such as `D4`, `F#3` or `Bb5`: letter A-G, optional `#` or
/// `b`, single octave digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    letter: char,
    accidental: Accidental,
    octave: u8,
}

impl Pitch {
    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn accidental(&self) -> Accidental {
        self.accidental
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    /// MIDI note number, C4 = 60
    pub fn midi_number(&self) -> i32 {
        let semitone = match self.letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        };
        let offset = match self.accidental {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        };
        (self.octave as i32 + 1) * 12 + semitone + offset
    }

    /// Equal temperament, A4 = 440 Hz
    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi_number() - 69) as f32 / 12.0)
    }
}

impl FromStr for Pitch {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidPitch(s.to_string());
        let mut chars = s.chars();

        let letter = chars.next().filter(|c| ('A'..='G').contains(c)).ok_or_else(invalid)?;

        let (accidental, octave_char) = match chars.next().ok_or_else(invalid)? {
            '#' => (Accidental::Sharp, chars.next().ok_or_else(invalid)?),
            'b' => (Accidental::Flat, chars.next().ok_or_else(invalid)?),
            c => (Accidental::Natural, c),
        };

        let octave = octave_char.to_digit(10).ok_or_else(invalid)? as u8;

        if chars.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            letter,
            accidental,
            octave,
        })
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}{}", self.letter, accidental, self.octave)
    }
}

/// One user-editable note name per bit. Entries are free text; they are
/// only checked when a note is about to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSlots {
    notes: [String; BIT_WIDTH],
}

impl Default for NoteSlots {
    fn default() -> Self {
        Self {
            notes: DEFAULT_NOTES.map(String::from),
        }
    }
}

impl NoteSlots {
    pub fn new<S: AsRef<str>>(notes: &[S]) -> Result<Self> {
        if notes.len() != BIT_WIDTH {
            return Err(EngineError::InvalidConfig(format!(
                "expected {} notes, got {}",
                BIT_WIDTH,
                notes.len()
            )));
        }

        Ok(Self {
            notes: std::array::from_fn(|i| notes[i].as_ref().to_string()),
        })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.notes.get(index).map(String::as_str)
    }

    pub fn set(&mut self, index: usize, note: impl Into<String>) -> Result<()> {
        let slot = self
            .notes
            .get_mut(index)
            .ok_or(EngineError::IndexOutOfRange(index))?;
        *slot = note.into();
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.notes.to_vec()
    }

    /// Parse the note at `index`
    pub fn resolve(&self, index: usize) -> Result<Pitch> {
        self.get(index)
            .ok_or(EngineError::IndexOutOfRange(index))?
            .parse()
    }
}

pub fn note_duration(index: usize) -> Option<f32> {
    NOTE_DURATIONS.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_pitches_parse() {
        for name in ["C0", "D4", "F#3", "Bb5", "G9", "A4", "Eb2"] {
            let pitch: Pitch = name.parse().unwrap();
            assert_eq!(pitch.to_string(), name);
        }
    }

    #[test]
    fn test_malformed_pitches_are_rejected() {
        for name in ["", "H4", "d4", "C", "C#", "C10", "C-1", "Cx4", "C#b4", "C4 ", " C4", "CB4"] {
            let result = name.parse::<Pitch>();
            assert!(
                matches!(result, Err(EngineError::InvalidPitch(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_frequencies() {
        let a4: Pitch = "A4".parse().unwrap();
        assert_eq!(a4.midi_number(), 69);
        assert!((a4.frequency() - 440.0).abs() < 1e-3);

        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.midi_number(), 60);
        assert!((c4.frequency() - 261.626).abs() < 1e-2);

        // Enharmonic spellings agree
        let sharp: Pitch = "F#3".parse().unwrap();
        let flat: Pitch = "Gb3".parse().unwrap();
        assert_eq!(sharp.midi_number(), flat.midi_number());

        // Cb and B# cross the octave boundary
        let c_flat: Pitch = "Cb4".parse().unwrap();
        let b: Pitch = "B3".parse().unwrap();
        assert_eq!(c_flat.midi_number(), b.midi_number());
    }

    #[test]
    fn test_durations_shrink_towards_fast_bits() {
        for pair in NOTE_DURATIONS.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert!(NOTE_DURATIONS.iter().all(|&d| d > 0.0));
        assert_eq!(note_duration(9), Some(0.4));
        assert_eq!(note_duration(BIT_WIDTH), None);
    }

    #[test]
    fn test_default_slots_all_resolve() {
        let slots = NoteSlots::default();
        for index in 0..BIT_WIDTH {
            assert!(slots.resolve(index).is_ok(), "slot {} failed", index);
        }
        assert_eq!(slots.get(0), Some("D4"));
        assert_eq!(slots.get(9), Some("G5"));
    }

    #[test]
    fn test_slots_keep_malformed_text_until_resolved() {
        let mut slots = NoteSlots::default();
        slots.set(3, "nope").unwrap();

        assert_eq!(slots.get(3), Some("nope"));
        assert!(matches!(slots.resolve(3), Err(EngineError::InvalidPitch(_))));
        assert!(matches!(
            slots.set(BIT_WIDTH, "C4"),
            Err(EngineError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_slot_count_is_enforced() {
        assert!(NoteSlots::new(&["C4"; BIT_WIDTH]).is_ok());
        assert!(matches!(
            NoteSlots::new(&["C4"; 9]),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
