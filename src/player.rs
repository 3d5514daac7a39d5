use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::audio::context::{AudioContext, OfflineContext};
use crate::audio::effects::EffectsConfig;
use crate::audio::instruments::InstrumentVariant;
use crate::audio::systems::BinaryCounterSystem;
use crate::audio::AudioSystem;
use crate::config::{EngineConfig, SavedConfig};
use crate::error::{EngineError, Result};
use crate::events::{bit_pattern, ServerEvent, ServerEventQueue, ServerEventReceiver};

/// What the display shows, as of the last processed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub counter: u16,
    pub pattern: String,
    pub is_playing: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            counter: 0,
            pattern: bit_pattern(0),
            is_playing: false,
        }
    }
}

fn lock(system: &Mutex<BinaryCounterSystem>) -> Result<MutexGuard<'_, BinaryCounterSystem>> {
    system.lock().map_err(|_| EngineError::Lock)
}

/// Control-side handle: owns the audio context, shares the system with the
/// audio callback and turns server events into a display snapshot.
pub struct Player<C: AudioContext> {
    system: Arc<Mutex<BinaryCounterSystem>>,
    context: C,
    events: ServerEventReceiver,
    snapshot: Snapshot,
}

impl<C: AudioContext> Player<C> {
    pub fn from_parts(
        system: Arc<Mutex<BinaryCounterSystem>>,
        events: ServerEventReceiver,
        context: C,
    ) -> Self {
        Self {
            system,
            context,
            events,
            snapshot: Snapshot::default(),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn system(&self) -> Arc<Mutex<BinaryCounterSystem>> {
        Arc::clone(&self.system)
    }

    /// Resume the context and start counting from zero
    pub fn play(&mut self) -> Result<()> {
        let mut system = lock(&self.system)?;
        system.start(&mut self.context)
    }

    pub fn stop(&mut self) -> Result<bool> {
        Ok(lock(&self.system)?.stop())
    }

    /// Returns whether the player is now playing
    pub fn toggle(&mut self) -> Result<bool> {
        let playing = lock(&self.system)?.is_playing();
        if playing {
            self.stop()?;
        } else {
            self.play()?;
        }
        Ok(!playing)
    }

    pub fn set_tempo(&mut self, tempo: f32) -> Result<()> {
        lock(&self.system)?.set_tempo(tempo)
    }

    pub fn set_instrument(&mut self, instrument: InstrumentVariant) -> Result<()> {
        lock(&self.system)?.set_instrument(instrument)
    }

    pub fn set_effects(&mut self, effects: EffectsConfig) -> Result<()> {
        lock(&self.system)?.set_effects(effects)
    }

    pub fn set_note(&mut self, index: usize, note: impl Into<String>) -> Result<()> {
        lock(&self.system)?.set_note(index, note)
    }

    pub fn load_config(&mut self, config: &SavedConfig) -> Result<()> {
        lock(&self.system)?.load_config(config)
    }

    /// Preset of the current settings, ready for a `ConfigLibrary`
    pub fn save_config(&self, name: impl Into<String>) -> Result<SavedConfig> {
        let system = lock(&self.system)?;
        let config = EngineConfig {
            sample_rate: system.sample_rate(),
            tempo: system.tempo(),
            notes: system.notes().clone(),
            instrument: system.instrument(),
            effects: system.effects(),
        };
        Ok(SavedConfig::new(name, &config))
    }

    /// Drain pending events into the snapshot, handing each to `handle_event`
    pub fn process_events<F>(&mut self, mut handle_event: F)
    where
        F: FnMut(&ServerEvent),
    {
        let snapshot = &mut self.snapshot;
        self.events.process_events(|event| {
            match &event {
                ServerEvent::CounterChanged(counter) => {
                    snapshot.counter = *counter;
                    snapshot.pattern = bit_pattern(*counter);
                }
                ServerEvent::PlayStateChanged(playing) => snapshot.is_playing = *playing,
                ServerEvent::NoteTriggered { .. } | ServerEvent::NoteRejected { .. } => {}
            }
            handle_event(&event);
        });
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Stop, release the voice and close the context
    pub fn close(&mut self) -> Result<()> {
        lock(&self.system)?.dispose();
        self.context.close();
        Ok(())
    }
}

impl Player<OfflineContext> {
    /// Deterministic player rendering on demand
    pub fn offline(config: &EngineConfig, seed: u64) -> Result<Self> {
        Self::offline_with_context(config, seed, OfflineContext::new(config.sample_rate))
    }

    pub fn offline_with_context(
        config: &EngineConfig,
        seed: u64,
        context: OfflineContext,
    ) -> Result<Self> {
        let queue = ServerEventQueue::new();
        let system = BinaryCounterSystem::offline(config, queue.sender(), seed)?;
        Ok(Self::from_parts(
            Arc::new(Mutex::new(system)),
            queue.receiver(),
            context,
        ))
    }

    pub fn render(&mut self, frames: usize) -> Result<Vec<(f32, f32)>> {
        let mut system = lock(&self.system)?;
        Ok(self.context.render(&mut *system, frames))
    }
}

#[cfg(feature = "output")]
impl Player<crate::audio_output::AudioOutput> {
    /// Player on the default output device, at the device's sample rate
    pub fn with_output(config: &EngineConfig) -> Result<Self> {
        use crate::audio_output::AudioOutput;

        let config = EngineConfig {
            sample_rate: AudioOutput::device_sample_rate()?,
            ..config.clone()
        };

        let queue = ServerEventQueue::new();
        let system = Arc::new(Mutex::new(BinaryCounterSystem::new(&config, queue.sender())?));
        let output = AudioOutput::new(Arc::clone(&system))?;
        Ok(Self::from_parts(system, queue.receiver(), output))
    }
}
