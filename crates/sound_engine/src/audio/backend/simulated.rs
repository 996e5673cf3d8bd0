//! Simulated audio backend
//!
//! Deterministic in-memory implementation of [`AudioBackend`]. Nothing is
//! played; instead each call to [`SimulatedBackend::advance`] lets every
//! playing voice consume one queued buffer. Used by the engine tests, the demo
//! and headless builds without an output device.
//!
//! # Example
//!
//! ```
//! use sound_engine::audio::{AudioBackend, SimulatedBackend, SoundFormat, VoiceState};
//!
//! let mut backend = SimulatedBackend::new();
//! backend.initialize().unwrap();
//!
//! let voice = backend.create_voice().unwrap();
//! let buffer = backend.create_buffer().unwrap();
//! backend.fill_buffer(buffer, &[0u8; 64], SoundFormat::default()).unwrap();
//! backend.submit_buffer(voice, buffer).unwrap();
//! backend.start_voice(voice).unwrap();
//! assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Playing);
//!
//! backend.advance();
//! assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Inactive);
//! assert_eq!(backend.count_finished_buffers(voice).unwrap(), 1);
//! ```

use super::{AudioBackend, BufferId, SoundFormat, VoiceId, VoiceState};
use crate::audio::AudioError;
use std::collections::VecDeque;

/// Buffer waiting on a voice
#[derive(Debug, Clone, Copy)]
struct QueuedBuffer {
    buffer: BufferId,
    finished: bool,
}

#[derive(Debug)]
struct SimulatedVoice {
    alive: bool,
    state: VoiceState,
    gain: f32,
    queue: VecDeque<QueuedBuffer>,
    played_bytes: usize,
    start_count: u32,
}

#[derive(Debug)]
struct SimulatedBuffer {
    alive: bool,
    data: Vec<u8>,
    format: Option<SoundFormat>,
}

/// In-memory backend driven by explicit [`advance`](SimulatedBackend::advance) calls
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    voices: Vec<SimulatedVoice>,
    buffers: Vec<SimulatedBuffer>,
    voice_limit: Option<usize>,
    buffer_limit: Option<usize>,
    fail_initialize: bool,
    initialized: bool,
}

impl SimulatedBackend {
    /// Create a backend with no voice or buffer limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose `initialize` always fails (no device available)
    pub fn unavailable() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }

    /// Limit how many voices the device can create
    pub fn with_voice_limit(mut self, limit: usize) -> Self {
        self.voice_limit = Some(limit);
        self
    }

    /// Limit how many buffers the device can create
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    /// Let every playing voice consume the oldest unfinished buffer in its queue
    ///
    /// A voice with nothing left to consume becomes inactive.
    pub fn advance(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.alive && v.state == VoiceState::Playing) {
            if let Some(queued) = voice.queue.iter_mut().find(|q| !q.finished) {
                queued.finished = true;
                voice.played_bytes += self
                    .buffers
                    .get(queued.buffer.0 as usize)
                    .map_or(0, |b| b.data.len());
            }

            if voice.queue.iter().all(|q| q.finished) {
                voice.state = VoiceState::Inactive;
            }
        }
    }

    /// Call [`advance`](Self::advance) `ticks` times
    pub fn advance_by(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.advance();
        }
    }

    /// Gain last applied to a voice
    pub fn voice_gain(&self, voice: VoiceId) -> Option<f32> {
        self.live_voice(voice).map(|v| v.gain)
    }

    /// Total bytes consumed by a voice so far
    pub fn played_bytes(&self, voice: VoiceId) -> usize {
        self.live_voice(voice).map_or(0, |v| v.played_bytes)
    }

    /// Number of buffers queued on a voice, finished or not
    pub fn queued_buffers(&self, voice: VoiceId) -> usize {
        self.live_voice(voice).map_or(0, |v| v.queue.len())
    }

    /// Number of times a voice was started
    pub fn start_count(&self, voice: VoiceId) -> u32 {
        self.live_voice(voice).map_or(0, |v| v.start_count)
    }

    /// Current contents of a buffer
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.live_buffer(buffer).map(|b| b.data.as_slice())
    }

    /// Format last written into a buffer
    pub fn buffer_format(&self, buffer: BufferId) -> Option<SoundFormat> {
        self.live_buffer(buffer).and_then(|b| b.format)
    }

    /// Number of voices created and not yet destroyed
    pub fn live_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.alive).count()
    }

    /// Number of buffers created and not yet destroyed
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.alive).count()
    }

    fn live_voice(&self, voice: VoiceId) -> Option<&SimulatedVoice> {
        self.voices.get(voice.0 as usize).filter(|v| v.alive)
    }

    fn voice_mut(&mut self, voice: VoiceId) -> Result<&mut SimulatedVoice, AudioError> {
        self.voices
            .get_mut(voice.0 as usize)
            .filter(|v| v.alive)
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))
    }

    fn live_buffer(&self, buffer: BufferId) -> Option<&SimulatedBuffer> {
        self.buffers.get(buffer.0 as usize).filter(|b| b.alive)
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut SimulatedBuffer, AudioError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .filter(|b| b.alive)
            .ok_or_else(|| AudioError::Backend(format!("Unknown buffer {}", buffer.0)))
    }

    fn ensure_initialized(&self) -> Result<(), AudioError> {
        if self.initialized {
            Ok(())
        } else {
            Err(AudioError::Backend("Backend not initialized".to_string()))
        }
    }
}

impl AudioBackend for SimulatedBackend {
    fn initialize(&mut self) -> Result<(), AudioError> {
        if self.fail_initialize {
            return Err(AudioError::BackendInitFailed("No audio device available".to_string()));
        }
        self.initialized = true;
        log::info!("Simulated audio backend initialized");
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        log::info!("Simulated audio backend shutdown");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn create_voice(&mut self) -> Result<VoiceId, AudioError> {
        self.ensure_initialized()?;
        if self.voice_limit.is_some_and(|limit| self.live_voices() >= limit) {
            return Err(AudioError::BackendExhausted);
        }

        let id = VoiceId(self.voices.len() as u32);
        self.voices.push(SimulatedVoice {
            alive: true,
            state: VoiceState::Inactive,
            gain: 1.0,
            queue: VecDeque::with_capacity(2),
            played_bytes: 0,
            start_count: 0,
        });
        Ok(id)
    }

    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        let voice = self.voice_mut(voice)?;
        voice.alive = false;
        voice.state = VoiceState::Inactive;
        voice.queue.clear();
        Ok(())
    }

    fn set_voice_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), AudioError> {
        self.voice_mut(voice)?.gain = gain;
        Ok(())
    }

    fn query_voice_state(&self, voice: VoiceId) -> Result<VoiceState, AudioError> {
        self.live_voice(voice)
            .map(|v| v.state)
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))
    }

    fn submit_buffer(&mut self, voice: VoiceId, buffer: BufferId) -> Result<(), AudioError> {
        self.buffer_mut(buffer)?;
        self.voice_mut(voice)?.queue.push_back(QueuedBuffer { buffer, finished: false });
        Ok(())
    }

    fn unqueue_finished_buffer(&mut self, voice: VoiceId) -> Result<BufferId, AudioError> {
        let voice_ref = self.voice_mut(voice)?;
        if !voice_ref.queue.front().is_some_and(|q| q.finished) {
            return Err(AudioError::Backend(format!("Voice {} has no finished buffer", voice.0)));
        }
        voice_ref
            .queue
            .pop_front()
            .map(|q| q.buffer)
            .ok_or_else(|| AudioError::Backend(format!("Voice {} has no finished buffer", voice.0)))
    }

    fn count_finished_buffers(&self, voice: VoiceId) -> Result<usize, AudioError> {
        self.live_voice(voice)
            .map(|v| v.queue.iter().take_while(|q| q.finished).count())
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))
    }

    fn start_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        let voice = self.voice_mut(voice)?;
        voice.start_count += 1;
        voice.state = if voice.queue.iter().any(|q| !q.finished) {
            VoiceState::Playing
        } else {
            VoiceState::Inactive
        };
        Ok(())
    }

    fn stop_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        let voice = self.voice_mut(voice)?;
        for queued in &mut voice.queue {
            queued.finished = true;
        }
        voice.state = VoiceState::Inactive;
        Ok(())
    }

    fn create_buffer(&mut self) -> Result<BufferId, AudioError> {
        self.ensure_initialized()?;
        if self.buffer_limit.is_some_and(|limit| self.live_buffers() >= limit) {
            return Err(AudioError::BackendExhausted);
        }

        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(SimulatedBuffer {
            alive: true,
            data: Vec::new(),
            format: None,
        });
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), AudioError> {
        let buffer = self.buffer_mut(buffer)?;
        buffer.alive = false;
        buffer.data = Vec::new();
        Ok(())
    }

    fn fill_buffer(&mut self, buffer: BufferId, data: &[u8], format: SoundFormat) -> Result<(), AudioError> {
        let buffer = self.buffer_mut(buffer)?;
        buffer.data.clear();
        buffer.data.extend_from_slice(data);
        buffer.format = Some(format);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> SimulatedBackend {
        let mut backend = SimulatedBackend::new();
        backend.initialize().unwrap();
        backend
    }

    fn filled_buffer(backend: &mut SimulatedBackend, bytes: usize) -> BufferId {
        let buffer = backend.create_buffer().unwrap();
        backend.fill_buffer(buffer, &vec![1u8; bytes], SoundFormat::default()).unwrap();
        buffer
    }

    #[test]
    fn test_initialization() {
        let mut backend = SimulatedBackend::new();
        assert!(!backend.is_initialized());
        assert!(backend.create_voice().is_err());

        backend.initialize().unwrap();
        assert!(backend.is_initialized());

        backend.shutdown();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_unavailable_device() {
        let mut backend = SimulatedBackend::unavailable();
        assert!(matches!(backend.initialize(), Err(AudioError::BackendInitFailed(_))));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_voice_limit() {
        let mut backend = SimulatedBackend::new().with_voice_limit(1);
        backend.initialize().unwrap();

        let voice = backend.create_voice().unwrap();
        assert_eq!(backend.create_voice(), Err(AudioError::BackendExhausted));

        backend.destroy_voice(voice).unwrap();
        assert!(backend.create_voice().is_ok());
    }

    #[test]
    fn test_buffers_consumed_in_order() {
        let mut backend = initialized();
        let voice = backend.create_voice().unwrap();
        let first = filled_buffer(&mut backend, 10);
        let second = filled_buffer(&mut backend, 20);

        backend.submit_buffer(voice, first).unwrap();
        backend.submit_buffer(voice, second).unwrap();
        backend.start_voice(voice).unwrap();

        backend.advance();
        assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Playing);
        assert_eq!(backend.count_finished_buffers(voice).unwrap(), 1);
        assert_eq!(backend.played_bytes(voice), 10);

        assert_eq!(backend.unqueue_finished_buffer(voice).unwrap(), first);
        assert!(backend.unqueue_finished_buffer(voice).is_err());

        backend.advance();
        assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Inactive);
        assert_eq!(backend.played_bytes(voice), 30);
    }

    #[test]
    fn test_stop_finishes_queue() {
        let mut backend = initialized();
        let voice = backend.create_voice().unwrap();
        let a = filled_buffer(&mut backend, 4);
        let b = filled_buffer(&mut backend, 4);

        backend.submit_buffer(voice, a).unwrap();
        backend.submit_buffer(voice, b).unwrap();
        backend.start_voice(voice).unwrap();
        backend.stop_voice(voice).unwrap();

        assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Inactive);
        assert_eq!(backend.count_finished_buffers(voice).unwrap(), 2);
        assert_eq!(backend.played_bytes(voice), 0);
    }

    #[test]
    fn test_start_with_empty_queue_stays_inactive() {
        let mut backend = initialized();
        let voice = backend.create_voice().unwrap();

        backend.start_voice(voice).unwrap();
        assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Inactive);
        assert_eq!(backend.start_count(voice), 1);
    }

    #[test]
    fn test_fill_replaces_contents() {
        let mut backend = initialized();
        let buffer = filled_buffer(&mut backend, 8);

        let format = SoundFormat::new(1, 8, 8000);
        backend.fill_buffer(buffer, &[7, 7], format).unwrap();
        assert_eq!(backend.buffer_data(buffer), Some(&[7u8, 7][..]));
        assert_eq!(backend.buffer_format(buffer), Some(format));
    }

    #[test]
    fn test_invalid_handles() {
        let mut backend = initialized();
        let bogus_voice = VoiceId(42);
        let bogus_buffer = BufferId(42);

        assert!(backend.query_voice_state(bogus_voice).is_err());
        assert!(backend.set_voice_gain(bogus_voice, 0.5).is_err());
        assert!(backend.fill_buffer(bogus_buffer, &[], SoundFormat::default()).is_err());

        let voice = backend.create_voice().unwrap();
        assert!(backend.submit_buffer(voice, bogus_buffer).is_err());
    }
}
