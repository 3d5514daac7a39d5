use crate::audio::context::{AudioContext, ContextState};
use crate::audio::AudioSystem;
use crate::error::{EngineError, Result};
use cpal::{traits::*, Sample};
use std::sync::{Arc, Mutex};

fn output_error(err: impl std::fmt::Display) -> EngineError {
    EngineError::Output(err.to_string())
}

fn default_device() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| EngineError::Output("No output device available".to_string()))
}

/// The default output device as an audio context. The stream is built
/// paused; `resume` starts pulling frames from the system.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: f32,
    state: ContextState,
}

impl AudioOutput {
    /// Sample rate the default device prefers; build the system with it
    pub fn device_sample_rate() -> Result<f32> {
        let config = default_device()?
            .default_output_config()
            .map_err(output_error)?;
        Ok(config.sample_rate().0 as f32)
    }

    pub fn new<S: AudioSystem + 'static>(system: Arc<Mutex<S>>) -> Result<Self> {
        let device = default_device()?;
        let config = device.default_output_config().map_err(output_error)?;
        let sample_rate = config.sample_rate().0 as f32;

        let system_rate = system.lock().map_err(|_| EngineError::Lock)?.sample_rate();
        if system_rate != sample_rate {
            tracing::warn!(system_rate, sample_rate, "Device sample rate differs from system");
        }

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::run::<f32, S>(&device, &config.into(), system),
            cpal::SampleFormat::I16 => Self::run::<i16, S>(&device, &config.into(), system),
            cpal::SampleFormat::U16 => Self::run::<u16, S>(&device, &config.into(), system),
            format => {
                return Err(EngineError::Output(format!(
                    "Unsupported sample format {:?}",
                    format
                )))
            }
        }
        .map_err(output_error)?;

        stream.pause().map_err(output_error)?;
        tracing::info!(sample_rate, "Audio output ready");

        Ok(AudioOutput {
            stream,
            sample_rate,
            state: ContextState::Suspended,
        })
    }

    fn run<T, S>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        system: Arc<Mutex<S>>,
    ) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: Sample + cpal::SizedSample + cpal::FromSample<f32>,
        S: AudioSystem + 'static,
    {
        let channels = config.channels as usize;

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    // Control side holds the lock briefly; drop a frame rather than block
                    let (left, right) = match system.try_lock() {
                        Ok(mut system) => system.next_sample(),
                        Err(_) => (0.0, 0.0),
                    };

                    // Limiting and NaN protection
                    let left = if left.is_finite() {
                        left.clamp(-0.95, 0.95)
                    } else {
                        0.0
                    };
                    let right = if right.is_finite() {
                        right.clamp(-0.95, 0.95)
                    } else {
                        0.0
                    };

                    if channels >= 2 {
                        frame[0] = T::from_sample(left);
                        frame[1] = T::from_sample(right);
                    } else {
                        frame[0] = T::from_sample((left + right) * 0.5);
                    }

                    for sample in frame.iter_mut().skip(2) {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |err| tracing::error!(%err, "Audio stream error"),
            None,
        )
    }
}

impl AudioContext for AudioOutput {
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
                self.stream
                    .play()
                    .map_err(|err| EngineError::ContextActivation(err.to_string()))?;
                self.state = ContextState::Running;
                tracing::info!("Audio output running");
                Ok(())
            }
        }
    }

    fn suspend(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(EngineError::ContextClosed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                self.stream.pause().map_err(output_error)?;
                self.state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        if self.state == ContextState::Running {
            if let Err(err) = self.stream.pause() {
                tracing::warn!(%err, "Failed to pause stream on close");
            }
        }
        self.state = ContextState::Closed;
    }
}
