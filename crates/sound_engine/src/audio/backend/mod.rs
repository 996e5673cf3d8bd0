//! Audio backend implementations
//!
//! Platform-independent abstraction over voice/buffer style audio output
//! (OpenAL-like queued buffers). The sound system only ever talks to the
//! output device through [`AudioBackend`].

pub mod simulated;

#[cfg(feature = "rodio")]
pub mod rodio_backend;

use crate::audio::AudioError;

/// Opaque backend voice handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u32);

/// Opaque backend buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Playback state reported by a backend voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Voice is consuming queued buffers
    Playing,
    /// Voice is stopped, paused, or has run out of queued data
    #[default]
    Inactive,
}

/// Sample layout of raw PCM bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFormat {
    /// Number of interleaved channels (1=mono, 2=stereo)
    pub channels: u16,
    /// Bits per sample (8 = unsigned bytes, 16 = little-endian signed)
    pub bits_per_sample: u16,
    /// Frames per second
    pub sample_rate: u32,
}

impl SoundFormat {
    /// Create a sound format
    pub fn new(channels: u16, bits_per_sample: u16, sample_rate: u32) -> Self {
        Self { channels, bits_per_sample, sample_rate }
    }

    /// Size of one frame (one sample per channel) in bytes
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }

    /// Bytes needed for one second of audio
    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.sample_rate as usize
    }
}

impl Default for SoundFormat {
    fn default() -> Self {
        Self::new(2, 16, 44100)
    }
}

/// Audio backend trait for platform abstraction
///
/// # Threading
/// Not `Send + Sync`; the sound system drives the backend from a single thread.
///
/// # Buffer queue contract
/// Buffers submitted to a voice are consumed in submission order. Once a voice
/// is [`VoiceState::Inactive`] every buffer still queued on it counts as
/// finished, so callers can drain the queue with
/// [`AudioBackend::unqueue_finished_buffer`].
pub trait AudioBackend {
    /// Initialize the audio backend
    fn initialize(&mut self) -> Result<(), AudioError>;

    /// Shutdown the audio backend
    fn shutdown(&mut self);

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Create a voice
    ///
    /// # Errors
    /// `BackendExhausted` when the device cannot provide another voice.
    fn create_voice(&mut self) -> Result<VoiceId, AudioError>;

    /// Destroy a voice
    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), AudioError>;

    /// Set the output gain of a voice
    fn set_voice_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), AudioError>;

    /// Poll the playback state of a voice
    fn query_voice_state(&self, voice: VoiceId) -> Result<VoiceState, AudioError>;

    /// Queue a filled buffer on a voice
    fn submit_buffer(&mut self, voice: VoiceId, buffer: BufferId) -> Result<(), AudioError>;

    /// Remove the oldest finished buffer from a voice's queue
    fn unqueue_finished_buffer(&mut self, voice: VoiceId) -> Result<BufferId, AudioError>;

    /// Number of queued buffers the voice has finished consuming
    fn count_finished_buffers(&self, voice: VoiceId) -> Result<usize, AudioError>;

    /// Start consuming queued buffers
    fn start_voice(&mut self, voice: VoiceId) -> Result<(), AudioError>;

    /// Stop a voice; queued buffers become finished
    fn stop_voice(&mut self, voice: VoiceId) -> Result<(), AudioError>;

    /// Create a buffer
    ///
    /// # Errors
    /// `BackendExhausted` when the device cannot provide another buffer.
    fn create_buffer(&mut self) -> Result<BufferId, AudioError>;

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), AudioError>;

    /// Copy sample bytes into a buffer, replacing its previous contents
    fn fill_buffer(&mut self, buffer: BufferId, data: &[u8], format: SoundFormat) -> Result<(), AudioError>;
}
