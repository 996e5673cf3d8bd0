//! Audio errors

use thiserror::Error;

/// Audio system errors
///
/// Exhaustion variants are recoverable: release other resources and retry.
/// No variant is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The sound data registry is full
    #[error("Out of sound data slots")]
    OutOfSoundData,

    /// The instance table is full
    #[error("Out of sound instances")]
    OutOfInstances,

    /// Fewer than two buffers are free
    #[error("Out of sound buffers")]
    OutOfBuffers,

    /// Every voice is busy
    #[error("Out of sound sources")]
    OutOfSources,

    /// Handle is stale or was never issued by this system
    #[error("Invalid handle")]
    InvalidHandle,

    /// `play` on an instance that still holds a voice
    #[error("Sound instance is already playing")]
    AlreadyPlaying,

    /// `destroy_instance` on an instance that still holds a voice
    #[error("Sound instance still holds a voice; stop it and update first")]
    InstanceStillPlaying,

    /// `unregister_sound_data` while a playing instance streams from it
    #[error("Sound data is still streamed by a playing instance")]
    SoundDataInUse,

    /// Backend could not be brought up
    #[error("Audio backend initialization failed: {0}")]
    BackendInitFailed(String),

    /// Backend has no more voices or buffers to create
    #[error("Audio backend exhausted")]
    BackendExhausted,

    /// Backend reported an error on a call
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// Sound file could not be decoded
    #[error("Failed to decode sound: {0}")]
    DecodeFailed(String),

    /// Sound file decoded but its sample layout is not supported
    #[error("Unsupported sound format: {0}")]
    UnsupportedFormat(String),

    /// Configuration rejected at initialization
    #[error("Invalid sound configuration: {0}")]
    InvalidConfig(String),

    /// Sound data or instances were still allocated at finalize
    #[error("Resource leak: {sound_data} sound data and {instances} instances not deleted")]
    ResourceLeak {
        /// Live sound data slots
        sound_data: usize,
        /// Live instance slots
        instances: usize,
    },
}

impl From<hound::Error> for AudioError {
    fn from(error: hound::Error) -> Self {
        AudioError::DecodeFailed(error.to_string())
    }
}
