use crate::audio::AudioSystem;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Handle to whatever consumes the rendered audio.
///
/// Contexts start out suspended. `resume` may legitimately fail (for example
/// when the platform requires a user gesture first); callers must treat that
/// as a recoverable error rather than waiting on it.
pub trait AudioContext {
    fn sample_rate(&self) -> f32;

    fn state(&self) -> ContextState;

    fn resume(&mut self) -> Result<()>;

    fn suspend(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Deterministic context that renders on demand instead of in real time
pub struct OfflineContext {
    sample_rate: f32,
    state: ContextState,
    requires_gesture: bool,
    gesture_received: bool,
    frames_rendered: u64,
}

impl OfflineContext {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            state: ContextState::Suspended,
            requires_gesture: false,
            gesture_received: false,
            frames_rendered: 0,
        }
    }

    /// A context that refuses to resume until `grant_gesture` is called
    pub fn requiring_gesture(sample_rate: f32) -> Self {
        Self {
            requires_gesture: true,
            ..Self::new(sample_rate)
        }
    }

    pub fn grant_gesture(&mut self) {
        self.gesture_received = true;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Pull `frames` stereo frames from the system. A context that is not
    /// running yields silence without advancing the system.
    pub fn render(&mut self, system: &mut dyn AudioSystem, frames: usize) -> Vec<(f32, f32)> {
        if self.state != ContextState::Running {
            return vec![(0.0, 0.0); frames];
        }

        self.frames_rendered += frames as u64;
        (0..frames).map(|_| system.next_sample()).collect()
    }
}

impl AudioContext for OfflineContext {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(EngineError::ContextClosed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if self.requires_gesture && !self.gesture_received {
                    return Err(EngineError::ContextActivation(
                        "a user gesture is required before audio can start".to_string(),
                    ));
                }
                self.state = ContextState::Running;
                tracing::info!(sample_rate = self.sample_rate, "Offline context running");
                Ok(())
            }
        }
    }

    fn suspend(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(EngineError::ContextClosed),
            _ => {
                self.state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
    }
}
