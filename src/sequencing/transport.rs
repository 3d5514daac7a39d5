use crate::audio::context::AudioContext;
use crate::error::{EngineError, Result};
use crate::sequencing::clocks::{Clock, TickGrid};

/// Identifies one start..stop run of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub handle: ScheduleHandle,
    /// Ticks since this schedule started
    pub index: u64,
    /// Exact tick time in seconds on the audio clock
    pub time: f64,
}

/// Eighth-note interval at `bpm`
pub fn tick_interval_seconds(bpm: f32) -> f64 {
    30.0 / bpm as f64
}

fn validate_tempo(bpm: f32) -> Result<()> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!("tempo must be positive, got {}", bpm)))
    }
}

/// Repeating eighth-note schedule driven by the sample clock
pub struct TransportController {
    sample_rate: f32,
    tempo: f32,
    schedule: Option<(ScheduleHandle, TickGrid)>,
    next_handle: u64,
}

impl TransportController {
    pub fn new(sample_rate: f32, tempo: f32) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        validate_tempo(tempo)?;

        Ok(Self {
            sample_rate,
            tempo,
            schedule: None,
            next_handle: 0,
        })
    }

    fn samples_per_tick(&self) -> f64 {
        tick_interval_seconds(self.tempo) * self.sample_rate as f64
    }

    /// Resume `context` and register a new repeating tick starting at the
    /// current clock position. A running schedule is stopped first. On
    /// failure the transport is left stopped.
    pub fn start(
        &mut self,
        context: &mut dyn AudioContext,
        clock: &Clock,
        tempo: f32,
    ) -> Result<ScheduleHandle> {
        self.stop();
        validate_tempo(tempo)?;

        context.resume()?;

        self.tempo = tempo;
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;

        let grid = TickGrid::new(self.samples_per_tick(), clock.get_sample());
        self.schedule = Some((handle, grid));

        tracing::info!(handle = handle.0, tempo, "Transport started");
        Ok(handle)
    }

    /// Cancel the schedule. Returns false if it was already stopped.
    pub fn stop(&mut self) -> bool {
        match self.schedule.take() {
            Some((handle, _)) => {
                tracing::info!(handle = handle.0, "Transport stopped");
                true
            }
            None => false,
        }
    }

    /// Takes effect from the next tick when running. That tick is never
    /// earlier than `clock`.
    pub fn set_tempo(&mut self, tempo: f32, clock: &Clock) -> Result<()> {
        validate_tempo(tempo)?;
        self.tempo = tempo;

        let samples_per_tick = self.samples_per_tick();
        if let Some((_, grid)) = self.schedule.as_mut() {
            grid.set_samples_per_tick(samples_per_tick, clock.get_sample());
        }
        Ok(())
    }

    /// Call once per frame, before rendering it
    pub fn poll(&mut self, clock: &Clock) -> Option<Tick> {
        let (handle, grid) = self.schedule.as_mut()?;
        let (index, position) = grid.tick(clock)?;

        Some(Tick {
            handle: *handle,
            index,
            time: position / self.sample_rate as f64,
        })
    }

    pub fn state(&self) -> TransportState {
        if self.schedule.is_some() {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    pub fn handle(&self) -> Option<ScheduleHandle> {
        self.schedule.as_ref().map(|(handle, _)| *handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::context::{ContextState, OfflineContext};

    const SAMPLE_RATE: f32 = 1000.0;

    fn collect_ticks(
        transport: &mut TransportController,
        clock: &mut Clock,
        frames: usize,
    ) -> Vec<Tick> {
        let mut ticks = Vec::new();
        for _ in 0..frames {
            if let Some(tick) = transport.poll(clock) {
                ticks.push(tick);
            }
            clock.tick();
        }
        ticks
    }

    #[test]
    fn test_interval_is_an_eighth_note() {
        assert_eq!(tick_interval_seconds(60.0), 0.5);
        assert_eq!(tick_interval_seconds(120.0), 0.25);
        assert_eq!(tick_interval_seconds(30.0), 1.0);
    }

    #[test]
    fn test_ticks_follow_tempo() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let mut clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 50.0).unwrap();

        let handle = transport.start(&mut context, &clock, 60.0).unwrap();
        assert_eq!(context.state(), ContextState::Running);
        assert_eq!(transport.state(), TransportState::Running);

        // 0.5 s per tick at 1 kHz
        let ticks = collect_ticks(&mut transport, &mut clock, 1600);
        let times: Vec<f64> = ticks.iter().map(|t| t.time).collect();
        println!("Tick times: {:?}", times);

        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
        assert!(ticks.iter().all(|t| t.handle == handle));
        assert_eq!(ticks.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_stop_is_idempotent_and_cancels_ticks() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let mut clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();

        transport.start(&mut context, &clock, 60.0).unwrap();
        assert_eq!(collect_ticks(&mut transport, &mut clock, 10).len(), 1);

        assert!(transport.stop());
        assert!(!transport.stop());
        assert!(!transport.stop());
        assert_eq!(transport.handle(), None);
        assert!(collect_ticks(&mut transport, &mut clock, 2000).is_empty());
    }

    #[test]
    fn test_start_while_running_restarts_schedule() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let mut clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();

        let first = transport.start(&mut context, &clock, 60.0).unwrap();
        collect_ticks(&mut transport, &mut clock, 250);

        let second = transport.start(&mut context, &clock, 120.0).unwrap();
        assert_ne!(first, second);
        assert_eq!(transport.handle(), Some(second));

        // New schedule fires immediately from the restart point
        let ticks = collect_ticks(&mut transport, &mut clock, 300);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].index, 0);
        assert_eq!(ticks[0].time, 0.25);
        assert_eq!(ticks[1].time, 0.5);
        assert!(ticks.iter().all(|t| t.handle == second));
    }

    #[test]
    fn test_set_tempo_applies_from_next_tick() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let mut clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();

        transport.start(&mut context, &clock, 60.0).unwrap();
        let mut ticks = collect_ticks(&mut transport, &mut clock, 600);
        assert_eq!(ticks.len(), 2);

        transport.set_tempo(120.0, &clock).unwrap();
        assert_eq!(transport.tempo(), 120.0);
        ticks.extend(collect_ticks(&mut transport, &mut clock, 401));

        let times: Vec<f64> = ticks.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_speed_up_late_in_tick_keeps_ticks_in_order() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let mut clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 30.0).unwrap();

        transport.start(&mut context, &clock, 30.0).unwrap();
        let mut ticks = collect_ticks(&mut transport, &mut clock, 900);
        assert_eq!(ticks.len(), 1);

        // 0.25 s after the last tick is already in the past at 0.9 s
        transport.set_tempo(120.0, &clock).unwrap();
        ticks.extend(collect_ticks(&mut transport, &mut clock, 600));

        let times: Vec<f64> = ticks.iter().map(|t| t.time).collect();
        println!("Tick times: {:?}", times);
        assert_eq!(times, vec![0.0, 0.9, 1.15, 1.4]);
        assert!(times.windows(2).skip(1).all(|pair| pair[1] - pair[0] >= 0.25 - 1e-9));
    }

    #[test]
    fn test_set_tempo_while_stopped() {
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();
        let clock = Clock::new();
        transport.set_tempo(90.0, &clock).unwrap();
        assert_eq!(transport.tempo(), 90.0);
        assert!(transport.set_tempo(0.0, &clock).is_err());
        assert!(transport.set_tempo(f32::NAN, &clock).is_err());
        assert_eq!(transport.tempo(), 90.0);
    }

    #[test]
    fn test_failed_activation_leaves_transport_stopped() {
        let mut context = OfflineContext::requiring_gesture(SAMPLE_RATE);
        let clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();

        let result = transport.start(&mut context, &clock, 60.0);
        assert!(matches!(result, Err(EngineError::ContextActivation(_))));
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.handle(), None);

        context.grant_gesture();
        assert!(transport.start(&mut context, &clock, 60.0).is_ok());
        assert!(transport.is_running());
    }

    #[test]
    fn test_invalid_tempo_rejected_on_start() {
        let mut context = OfflineContext::new(SAMPLE_RATE);
        let clock = Clock::new();
        let mut transport = TransportController::new(SAMPLE_RATE, 60.0).unwrap();

        assert!(transport.start(&mut context, &clock, -1.0).is_err());
        assert!(!transport.is_running());
        assert!(TransportController::new(0.0, 60.0).is_err());
    }
}
