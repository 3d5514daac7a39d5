use std::time::{Duration, Instant};

use crate::audio::context::AudioContext;
use crate::audio::effects::EffectsConfig;
use crate::audio::instruments::{InstrumentFactory, InstrumentVariant};
use crate::audio::AudioSystem;
use crate::config::{EngineConfig, SavedConfig};
use crate::error::Result;
use crate::events::{ServerEvent, ServerEventSender};
use crate::sequencing::{
    BitClock, Clock, NoteSlots, NoteTrigger, Tick, TransportController, TriggerOutcome,
};

/// Time source for note debouncing
#[derive(Debug, Clone, Copy)]
pub enum WallClock {
    /// Real elapsed time since the system was created
    Monotonic(Instant),
    /// Rendered audio time; offline rendering runs faster than real time
    Rendered,
}

impl WallClock {
    fn now(&self, clock: &Clock, sample_rate: f32) -> Duration {
        match self {
            WallClock::Monotonic(origin) => origin.elapsed(),
            WallClock::Rendered => Duration::from_secs_f64(clock.seconds(sample_rate)),
        }
    }
}

/// Counts in binary on every tick and plays a note for each bit that turns on
pub struct BinaryCounterSystem {
    // Sequencer
    clock: Clock,
    transport: TransportController,
    bit_clock: BitClock,
    trigger: NoteTrigger,
    wall_clock: WallClock,

    // Sound
    factory: InstrumentFactory,
    instrument: InstrumentVariant,
    effects: EffectsConfig,

    // Event sender for communicating with UI
    event_sender: ServerEventSender,
    sample_rate: f32,
}

impl BinaryCounterSystem {
    pub fn new(config: &EngineConfig, event_sender: ServerEventSender) -> Result<Self> {
        let trigger = NoteTrigger::new(config.notes.clone(), config.sample_rate);
        Self::build(config, event_sender, trigger, WallClock::Monotonic(Instant::now()))
    }

    /// Fully deterministic system for rendering without a device
    pub fn offline(config: &EngineConfig, event_sender: ServerEventSender, seed: u64) -> Result<Self> {
        let trigger = NoteTrigger::with_seed(config.notes.clone(), config.sample_rate, seed);
        Self::build(config, event_sender, trigger, WallClock::Rendered)
    }

    fn build(
        config: &EngineConfig,
        event_sender: ServerEventSender,
        trigger: NoteTrigger,
        wall_clock: WallClock,
    ) -> Result<Self> {
        config.effects.validate()?;

        Ok(Self {
            clock: Clock::new(),
            transport: TransportController::new(config.sample_rate, config.tempo)?,
            bit_clock: BitClock::new(),
            trigger,
            wall_clock,
            factory: InstrumentFactory::new(config.sample_rate)?,
            instrument: config.instrument,
            effects: config.effects,
            event_sender,
            sample_rate: config.sample_rate,
        })
    }

    fn send_event(&self, event: ServerEvent) {
        self.event_sender.send(event);
    }

    /// Reset the counter, make sure a voice exists and start ticking.
    /// Errors leave the system stopped.
    pub fn start(&mut self, context: &mut dyn AudioContext) -> Result<()> {
        self.stop();

        if self.factory.voice().is_none() {
            self.factory.build(self.instrument, self.effects)?;
        }

        let tempo = self.transport.tempo();
        self.transport.start(context, &self.clock, tempo)?;

        self.send_event(ServerEvent::PlayStateChanged(true));
        self.send_event(ServerEvent::CounterChanged(self.bit_clock.counter()));
        Ok(())
    }

    /// Cancel future ticks and reset the counter. Notes already queued
    /// still sound. Returns false if nothing was playing.
    pub fn stop(&mut self) -> bool {
        let was_running = self.transport.stop();
        self.bit_clock.reset();

        if was_running {
            self.send_event(ServerEvent::PlayStateChanged(false));
            self.send_event(ServerEvent::CounterChanged(0));
        }
        was_running
    }

    pub fn set_tempo(&mut self, tempo: f32) -> Result<()> {
        self.transport.set_tempo(tempo, &self.clock)
    }

    /// Replace the voice. The old one fades out; notes it had queued move
    /// to the new voice.
    pub fn set_instrument(&mut self, instrument: InstrumentVariant) -> Result<()> {
        self.factory.build(instrument, self.effects)?;
        self.instrument = instrument;
        tracing::info!(%instrument, "Instrument changed");
        Ok(())
    }

    pub fn set_effects(&mut self, effects: EffectsConfig) -> Result<()> {
        effects.validate()?;
        if let Some(voice) = self.factory.voice_mut() {
            voice.update_effects(effects)?;
        }
        self.effects = effects;
        Ok(())
    }

    pub fn set_note(&mut self, index: usize, note: impl Into<String>) -> Result<()> {
        self.trigger.slots_mut().set(index, note)
    }

    pub fn set_notes(&mut self, notes: NoteSlots) {
        self.trigger.set_slots(notes);
    }

    /// Apply a saved preset. A running transport is stopped and the counter
    /// reset first; the system stays stopped afterwards.
    pub fn load_config(&mut self, config: &SavedConfig) -> Result<()> {
        config.validate()?;
        let notes = config.note_slots()?;

        if self.is_playing() {
            self.stop();
        }

        self.trigger.set_slots(notes);
        if let Some(effects) = config.effects {
            self.effects = effects;
        }
        self.set_instrument(config.instrument_type)?;
        self.set_tempo(config.tempo)?;

        tracing::info!(name = %config.name, "Loaded configuration");
        Ok(())
    }

    /// Release the voice. The next `start` builds a fresh one.
    pub fn dispose(&mut self) {
        self.stop();
        self.factory.dispose();
    }

    pub fn counter(&self) -> u16 {
        self.bit_clock.counter()
    }

    pub fn pattern(&self) -> String {
        self.bit_clock.pattern()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn tempo(&self) -> f32 {
        self.transport.tempo()
    }

    pub fn instrument(&self) -> InstrumentVariant {
        self.instrument
    }

    pub fn effects(&self) -> EffectsConfig {
        self.effects
    }

    pub fn notes(&self) -> &NoteSlots {
        self.trigger.slots()
    }

    pub fn factory(&self) -> &InstrumentFactory {
        &self.factory
    }

    pub fn current_sample(&self) -> u64 {
        self.clock.get_sample()
    }

    fn on_tick(&mut self, tick: Tick) {
        let (counter, rising) = self.bit_clock.advance();
        self.send_event(ServerEvent::CounterChanged(counter));

        let wall_now = self.wall_clock.now(&self.clock, self.sample_rate);
        for index in rising.iter() {
            let outcome = self
                .trigger
                .trigger(self.factory.voice_mut(), index, tick.time, wall_now);

            match outcome {
                TriggerOutcome::Dispatched(note) => {
                    self.send_event(ServerEvent::NoteTriggered {
                        index,
                        duration: note.duration,
                        time: note.time,
                    });
                }
                TriggerOutcome::Rejected(_) | TriggerOutcome::NoVoice => {
                    self.send_event(ServerEvent::NoteRejected { index });
                }
                TriggerOutcome::Debounced => {}
            }
        }
    }
}

impl AudioSystem for BinaryCounterSystem {
    fn next_sample(&mut self) -> (f32, f32) {
        if let Some(tick) = self.transport.poll(&self.clock) {
            self.on_tick(tick);
        }

        let output = self.factory.next_sample(self.clock.get_sample());
        self.clock.tick();
        output
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::context::OfflineContext;
    use crate::events::{ServerEventQueue, ServerEventReceiver};

    const SAMPLE_RATE: f32 = 8000.0;

    fn system(tempo: f32) -> (BinaryCounterSystem, ServerEventReceiver) {
        let queue = ServerEventQueue::new();
        let config = EngineConfig {
            sample_rate: SAMPLE_RATE,
            tempo,
            ..EngineConfig::default()
        };
        let system = BinaryCounterSystem::offline(&config, queue.sender(), 7).unwrap();
        (system, queue.receiver())
    }

    fn drain(receiver: &ServerEventReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        receiver.process_events(|event| events.push(event));
        events
    }

    fn triggered(events: &[ServerEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::NoteTriggered { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ticks_count_in_binary() {
        let (mut system, receiver) = system(120.0);
        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();

        // 0.25 s per tick: ticks at 0, 0.25, 0.5, 0.75
        context.render(&mut system, 7000);
        assert_eq!(system.counter(), 4);
        assert_eq!(system.pattern(), "0000000100");

        let events = drain(&receiver);
        println!("Events: {:?}", events);
        // 0->1 raises 9, 1->2 raises 8, 2->3 raises 9, 3->4 raises 7
        assert_eq!(triggered(&events), vec![9, 8, 9, 7]);
    }

    #[test]
    fn test_output_is_audible_and_finite() {
        let (mut system, _receiver) = system(120.0);
        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();

        let frames = context.render(&mut system, 4000);
        assert!(frames.iter().all(|(l, r)| l.is_finite() && r.is_finite()));
        let peak = frames.iter().map(|(l, _)| l.abs()).fold(0.0, f32::max);
        println!("Peak: {}", peak);
        assert!(peak > 0.01);
    }

    #[test]
    fn test_stop_resets_and_cancels() {
        let (mut system, receiver) = system(120.0);
        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();
        context.render(&mut system, 5000);
        assert!(system.counter() > 0);

        assert!(system.stop());
        assert!(!system.stop());
        assert_eq!(system.counter(), 0);
        drain(&receiver);

        context.render(&mut system, 8000);
        assert_eq!(system.counter(), 0);
        assert!(triggered(&drain(&receiver)).is_empty());
    }

    #[test]
    fn test_malformed_note_is_skipped_and_counting_continues() {
        let (mut system, receiver) = system(120.0);
        system.set_note(9, "not a note").unwrap();

        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();
        context.render(&mut system, 5000);

        let events = drain(&receiver);
        assert!(events.contains(&ServerEvent::NoteRejected { index: 9 }));
        assert_eq!(triggered(&events), vec![8]);
        assert_eq!(system.counter(), 3);
    }

    #[test]
    fn test_load_config_stops_and_applies() {
        let (mut system, receiver) = system(120.0);
        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();
        context.render(&mut system, 3000);

        let mut preset = SavedConfig::new("loud metal", &EngineConfig::default());
        preset.instrument_type = InstrumentVariant::Metal;
        preset.tempo = 90.0;
        preset.effects = Some(EffectsConfig {
            reverb: 0.5,
            ..EffectsConfig::default()
        });
        system.load_config(&preset).unwrap();

        assert!(!system.is_playing());
        assert_eq!(system.counter(), 0);
        assert_eq!(system.instrument(), InstrumentVariant::Metal);
        assert_eq!(system.tempo(), 90.0);
        assert_eq!(system.effects().reverb, 0.5);
        assert!(drain(&receiver).contains(&ServerEvent::PlayStateChanged(false)));
    }

    #[test]
    fn test_invalid_effects_leave_previous_settings() {
        let (mut system, _receiver) = system(60.0);
        let bad = EffectsConfig {
            delay: -0.5,
            ..EffectsConfig::default()
        };
        assert!(system.set_effects(bad).is_err());
        assert_eq!(system.effects(), EffectsConfig::default());
    }

    #[test]
    fn test_debounce_uses_rendered_time() {
        // At the top tempo a tick is 250 ms apart, far outside the window
        let (mut system, receiver) = system(120.0);
        let mut context = OfflineContext::new(SAMPLE_RATE);
        system.start(&mut context).unwrap();
        context.render(&mut system, 2 * SAMPLE_RATE as usize);

        let events = drain(&receiver);
        let nines = triggered(&events).iter().filter(|&&i| i == 9).count();
        assert_eq!(nines, 4);
    }
}
