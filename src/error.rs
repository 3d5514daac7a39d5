/// Engine error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Audio context could not be activated: {0}")]
    ContextActivation(String),

    #[error("Audio context is closed")]
    ContextClosed,

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f32),

    #[error("Malformed pitch: {0:?}")]
    InvalidPitch(String),

    #[error("Bit index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("Effect value {name} = {value} is outside [0, 1]")]
    InvalidEffects { name: &'static str, value: f32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Audio system lock poisoned")]
    Lock,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
