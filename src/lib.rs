pub mod audio;
#[cfg(feature = "output")]
pub mod audio_output;
pub mod config;
pub mod error;
pub mod events;
pub mod player;
pub mod sequencing;

pub use audio::context::{AudioContext, ContextState, OfflineContext};
pub use audio::effects::EffectsConfig;
pub use audio::instruments::InstrumentVariant;
pub use audio::systems::BinaryCounterSystem;
#[cfg(feature = "output")]
pub use audio_output::AudioOutput;
pub use config::{ConfigLibrary, EngineConfig, SavedConfig};
pub use error::{EngineError, Result};
pub use events::{ServerEvent, ServerEventQueue};
pub use player::{Player, Snapshot};
