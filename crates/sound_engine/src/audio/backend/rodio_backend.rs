//! Rodio audio backend implementation
//!
//! Each voice is a paused-on-creation Rodio [`Sink`]. Submitting a buffer
//! appends a copy of its samples to the sink, so the sink's own queue length
//! tells how many submitted buffers are still unplayed.
//!
//! # Example
//!
//! ```no_run
//! use sound_engine::audio::backend::rodio_backend::RodioBackend;
//! use sound_engine::audio::{SoundSystem, WavDecoder};
//! use sound_engine::config::SoundConfig;
//!
//! let mut sound = SoundSystem::initialize(RodioBackend::new(), &SoundConfig::default()).unwrap();
//! let bytes = std::fs::read("resources/audio/sound.wav").unwrap();
//! let data = sound.load_sound_data(&bytes, &WavDecoder).unwrap();
//! let instance = sound.create_instance(data).unwrap();
//! sound.play(instance).unwrap();
//!
//! while sound.is_playing(instance) {
//!     sound.update();
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! ```

use super::{AudioBackend, BufferId, SoundFormat, VoiceId, VoiceState};
use crate::audio::AudioError;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::collections::VecDeque;

struct RodioVoice {
    sink: Sink,
    /// Buffers appended to the sink, oldest first
    queued: VecDeque<BufferId>,
}

impl RodioVoice {
    fn finished(&self) -> usize {
        self.queued.len().saturating_sub(self.sink.len())
    }
}

#[derive(Default)]
struct RodioBuffer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

/// Rodio-based audio backend
pub struct RodioBackend {
    /// Audio output stream (must be kept alive)
    _output_stream: Option<OutputStream>,
    /// Output stream handle for creating sinks
    stream_handle: Option<OutputStreamHandle>,
    voices: Vec<Option<RodioVoice>>,
    buffers: Vec<Option<RodioBuffer>>,
    /// Initialization state
    initialized: bool,
}

impl RodioBackend {
    /// Create a new Rodio backend
    pub fn new() -> Self {
        Self {
            _output_stream: None,
            stream_handle: None,
            voices: Vec::new(),
            buffers: Vec::new(),
            initialized: false,
        }
    }

    fn new_sink(&self) -> Result<Sink, AudioError> {
        let stream_handle = self
            .stream_handle
            .as_ref()
            .ok_or_else(|| AudioError::Backend("Backend not initialized".to_string()))?;

        let sink = Sink::try_new(stream_handle)
            .map_err(|e| AudioError::Backend(format!("Failed to create sink: {}", e)))?;
        sink.pause();
        Ok(sink)
    }

    fn voice(&self, voice: VoiceId) -> Result<&RodioVoice, AudioError> {
        self.voices
            .get(voice.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))
    }

    fn voice_mut(&mut self, voice: VoiceId) -> Result<&mut RodioVoice, AudioError> {
        self.voices
            .get_mut(voice.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut RodioBuffer, AudioError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| AudioError::Backend(format!("Unknown buffer {}", buffer.0)))
    }
}

impl AudioBackend for RodioBackend {
    fn initialize(&mut self) -> Result<(), AudioError> {
        if self.initialized {
            return Ok(());
        }

        // Create output stream
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| AudioError::BackendInitFailed(format!("Failed to create audio output: {}", e)))?;

        self._output_stream = Some(stream);
        self.stream_handle = Some(stream_handle);
        self.initialized = true;

        log::info!("Rodio audio backend initialized");
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }

        for voice in self.voices.drain(..).flatten() {
            voice.sink.stop();
        }
        self.buffers.clear();

        // Drop stream handle and output
        self.stream_handle = None;
        self._output_stream = None;
        self.initialized = false;

        log::info!("Rodio audio backend shutdown");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn create_voice(&mut self) -> Result<VoiceId, AudioError> {
        let sink = self.new_sink()?;
        let id = VoiceId(self.voices.len() as u32);
        self.voices.push(Some(RodioVoice {
            sink,
            queued: VecDeque::with_capacity(2),
        }));
        Ok(id)
    }

    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        let slot = self
            .voices
            .get_mut(voice.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| AudioError::Backend(format!("Unknown voice {}", voice.0)))?;
        slot.sink.stop();
        Ok(())
    }

    fn set_voice_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), AudioError> {
        self.voice(voice)?.sink.set_volume(gain);
        Ok(())
    }

    fn query_voice_state(&self, voice: VoiceId) -> Result<VoiceState, AudioError> {
        let voice = self.voice(voice)?;
        if !voice.sink.is_paused() && !voice.sink.empty() {
            Ok(VoiceState::Playing)
        } else {
            Ok(VoiceState::Inactive)
        }
    }

    fn submit_buffer(&mut self, voice: VoiceId, buffer: BufferId) -> Result<(), AudioError> {
        let source = {
            let data = self.buffer_mut(buffer)?;
            SamplesBuffer::new(data.channels, data.sample_rate, data.samples.clone())
        };

        let voice = self.voice_mut(voice)?;
        voice.sink.append(source);
        voice.queued.push_back(buffer);
        Ok(())
    }

    fn unqueue_finished_buffer(&mut self, voice: VoiceId) -> Result<BufferId, AudioError> {
        let voice_ref = self.voice_mut(voice)?;
        if voice_ref.finished() == 0 {
            return Err(AudioError::Backend(format!("Voice {} has no finished buffer", voice.0)));
        }
        voice_ref
            .queued
            .pop_front()
            .ok_or_else(|| AudioError::Backend(format!("Voice {} has no finished buffer", voice.0)))
    }

    fn count_finished_buffers(&self, voice: VoiceId) -> Result<usize, AudioError> {
        Ok(self.voice(voice)?.finished())
    }

    fn start_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        self.voice(voice)?.sink.play();
        Ok(())
    }

    fn stop_voice(&mut self, voice: VoiceId) -> Result<(), AudioError> {
        // A stopped sink drops its sources; swap in a fresh paused one
        let sink = self.new_sink()?;
        let voice = self.voice_mut(voice)?;
        sink.set_volume(voice.sink.volume());
        let old = std::mem::replace(&mut voice.sink, sink);
        old.stop();
        Ok(())
    }

    fn create_buffer(&mut self) -> Result<BufferId, AudioError> {
        if !self.initialized {
            return Err(AudioError::Backend("Backend not initialized".to_string()));
        }
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(RodioBuffer::default()));
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), AudioError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .and_then(Option::take)
            .map(|_| ())
            .ok_or_else(|| AudioError::Backend(format!("Unknown buffer {}", buffer.0)))
    }

    fn fill_buffer(&mut self, buffer: BufferId, data: &[u8], format: SoundFormat) -> Result<(), AudioError> {
        let buffer = self.buffer_mut(buffer)?;
        buffer.samples.clear();
        match format.bits_per_sample {
            8 => buffer
                .samples
                .extend(data.iter().map(|&byte| (i16::from(byte) - 128) << 8)),
            16 => buffer.samples.extend(
                data.chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
            ),
            bits => {
                return Err(AudioError::UnsupportedFormat(format!("{}-bit samples", bits)));
            }
        }
        buffer.channels = format.channels;
        buffer.sample_rate = format.sample_rate;
        Ok(())
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_initialization() {
        let mut backend = RodioBackend::new();
        assert!(!backend.is_initialized());

        // May fail in CI/test environments without audio device
        if backend.initialize().is_ok() {
            assert!(backend.is_initialized());
            backend.shutdown();
            assert!(!backend.is_initialized());
        }
    }

    #[test]
    fn test_requires_initialization() {
        let mut backend = RodioBackend::new();
        assert!(backend.create_voice().is_err());
        assert!(backend.create_buffer().is_err());
    }

    #[test]
    fn test_fill_converts_samples() {
        let mut backend = RodioBackend::new();
        if backend.initialize().is_err() {
            return;
        }

        let buffer = backend.create_buffer().unwrap();
        backend
            .fill_buffer(buffer, &[0x00, 0x01, 0xFF, 0xFF], SoundFormat::new(1, 16, 8000))
            .unwrap();
        assert_eq!(backend.buffer_mut(buffer).unwrap().samples, vec![256, -1]);

        backend
            .fill_buffer(buffer, &[128, 0], SoundFormat::new(1, 8, 8000))
            .unwrap();
        assert_eq!(backend.buffer_mut(buffer).unwrap().samples, vec![0, -32768]);
    }

    #[test]
    fn test_stopped_voice_reports_queue_finished() {
        let mut backend = RodioBackend::new();
        if backend.initialize().is_err() {
            return;
        }

        let voice = backend.create_voice().unwrap();
        let buffer = backend.create_buffer().unwrap();
        backend
            .fill_buffer(buffer, &[0; 64], SoundFormat::new(1, 16, 8000))
            .unwrap();
        backend.submit_buffer(voice, buffer).unwrap();
        assert_eq!(backend.count_finished_buffers(voice).unwrap(), 0);

        backend.stop_voice(voice).unwrap();
        assert_eq!(backend.query_voice_state(voice).unwrap(), VoiceState::Inactive);
        assert_eq!(backend.count_finished_buffers(voice).unwrap(), 1);
        assert_eq!(backend.unqueue_finished_buffer(voice).unwrap(), buffer);
    }
}
