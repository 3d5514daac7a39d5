use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::audio::effects::EffectsConfig;
use crate::audio::instruments::InstrumentVariant;
use crate::error::{EngineError, Result};
use crate::sequencing::{NoteSlots, BIT_WIDTH};

pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;
pub const DEFAULT_TEMPO: f32 = 50.0;

/// Tempo range offered to users
pub const MIN_TEMPO: f32 = 30.0;
pub const MAX_TEMPO: f32 = 120.0;

pub fn validate_tempo_bounds(tempo: f32) -> Result<()> {
    if (MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "tempo {} is outside {}..={} bpm",
            tempo, MIN_TEMPO, MAX_TEMPO
        )))
    }
}

/// Runtime settings an engine starts with
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub tempo: f32,
    pub notes: NoteSlots,
    pub instrument: InstrumentVariant,
    pub effects: EffectsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            tempo: DEFAULT_TEMPO,
            notes: NoteSlots::default(),
            instrument: InstrumentVariant::default(),
            effects: EffectsConfig::default(),
        }
    }
}

/// A named preset as stored by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConfig {
    pub name: String,
    pub notes: Vec<String>,
    pub instrument_type: InstrumentVariant,
    pub tempo: f32,
    /// Older presets were saved without effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<EffectsConfig>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: u64,
}

impl SavedConfig {
    pub fn new(name: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            name: name.into(),
            notes: config.notes.to_vec(),
            instrument_type: config.instrument,
            tempo: config.tempo,
            effects: Some(config.effects),
            created_at: 0,
        }
    }

    /// Note text is not parsed here; malformed notes are caught when played
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidConfig("preset name is empty".to_string()));
        }
        if self.notes.len() != BIT_WIDTH {
            return Err(EngineError::InvalidConfig(format!(
                "expected {} notes, got {}",
                BIT_WIDTH,
                self.notes.len()
            )));
        }
        validate_tempo_bounds(self.tempo)?;
        if let Some(effects) = &self.effects {
            effects.validate()?;
        }
        Ok(())
    }

    pub fn note_slots(&self) -> Result<NoteSlots> {
        NoteSlots::new(self.notes.as_slice())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Saved presets keyed by case-insensitive name, in save order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigLibrary {
    configs: Vec<SavedConfig>,
}

impl ConfigLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.configs.iter().position(|c| c.name.to_lowercase() == name)
    }

    /// Stamp and store `config`, replacing any preset with the same name
    pub fn save(&mut self, mut config: SavedConfig) -> Result<&SavedConfig> {
        config.validate()?;
        config.created_at = now_millis();

        let index = match self.position(&config.name) {
            Some(index) => {
                self.configs[index] = config;
                index
            }
            None => {
                self.configs.push(config);
                self.configs.len() - 1
            }
        };

        tracing::info!(name = %self.configs[index].name, "Saved configuration");
        Ok(&self.configs[index])
    }

    pub fn get(&self, name: &str) -> Option<&SavedConfig> {
        self.position(name).map(|index| &self.configs[index])
    }

    /// Returns false when no preset had that name
    pub fn delete(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.configs.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[SavedConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Invalid presets are dropped with a warning rather than failing the load
    pub fn from_json(json: &str) -> Result<Self> {
        let configs: Vec<SavedConfig> = serde_json::from_str(json)?;
        let configs = configs
            .into_iter()
            .filter(|config| match config.validate() {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(name = %config.name, %err, "Skipping saved configuration");
                    false
                }
            })
            .collect();
        Ok(Self { configs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(name: &str) -> SavedConfig {
        SavedConfig::new(name, &EngineConfig::default())
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.tempo, 50.0);
        assert_eq!(config.instrument, InstrumentVariant::Synth);
        assert_eq!(config.notes.get(4), Some("A5"));
        assert_eq!(config.effects.filter, 1.0);
        assert_eq!(config.effects.volume, 0.8);
    }

    #[test]
    fn test_saved_config_json_shape() {
        let json = r#"{
            "name": "Morning",
            "notes": ["C4","D4","E4","F4","G4","A4","B4","C5","D5","E5"],
            "instrumentType": "membrane",
            "tempo": 72,
            "createdAt": 1700000000000
        }"#;

        let config = SavedConfig::from_json(json).unwrap();
        assert_eq!(config.instrument_type, InstrumentVariant::Membrane);
        assert_eq!(config.tempo, 72.0);
        assert_eq!(config.effects, None);
        assert_eq!(config.created_at, 1_700_000_000_000);

        let written = serde_json::to_value(&config).unwrap();
        println!("Written: {}", written);
        assert!(written.get("instrumentType").is_some());
        assert!(written.get("effects").is_none());
    }

    #[test]
    fn test_saved_config_validation() {
        assert!(preset("ok").validate().is_ok());

        let mut short = preset("short");
        short.notes.pop();
        assert!(matches!(short.validate(), Err(EngineError::InvalidConfig(_))));

        let mut fast = preset("fast");
        fast.tempo = 121.0;
        assert!(fast.validate().is_err());

        let mut loud = preset("loud");
        loud.effects = Some(EffectsConfig {
            volume: 1.5,
            ..EffectsConfig::default()
        });
        assert!(matches!(loud.validate(), Err(EngineError::InvalidEffects { .. })));

        // Free-text notes pass; they are checked when played
        let mut odd = preset("odd");
        odd.notes[0] = "Q7".to_string();
        assert!(odd.validate().is_ok());
    }

    #[test]
    fn test_library_names_are_case_insensitive() {
        let mut library = ConfigLibrary::new();
        library.save(preset("Groove")).unwrap();

        let mut faster = preset("GROOVE");
        faster.tempo = 100.0;
        let saved = library.save(faster).unwrap();
        assert!(saved.created_at > 0);

        assert_eq!(library.len(), 1);
        assert_eq!(library.get("groove").map(|c| c.tempo), Some(100.0));

        assert!(library.delete("gRoOvE"));
        assert!(!library.delete("groove"));
        assert!(library.is_empty());
    }

    #[test]
    fn test_library_keeps_save_order_and_round_trips() {
        let mut library = ConfigLibrary::new();
        for name in ["one", "two", "three"] {
            library.save(preset(name)).unwrap();
        }

        let json = library.to_json().unwrap();
        let restored = ConfigLibrary::from_json(&json).unwrap();
        let names: Vec<&str> = restored.list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_library_skips_invalid_entries() {
        let json = r#"[
            {"name": "good", "notes": ["C4","C4","C4","C4","C4","C4","C4","C4","C4","C4"],
             "instrumentType": "fm", "tempo": 60, "createdAt": 1},
            {"name": "bad", "notes": ["C4"], "instrumentType": "fm", "tempo": 60, "createdAt": 2}
        ]"#;

        let library = ConfigLibrary::from_json(json).unwrap();
        assert_eq!(library.len(), 1);
        assert!(library.get("good").is_some());
        assert!(ConfigLibrary::from_json("not json").is_err());
    }
}
