//! Sound system lifecycle
//!
//! [`SoundSystem`] owns the backend and every pool. It is an ordinary value:
//! create it with [`SoundSystem::initialize`], drive it from one thread, and
//! tear it down with [`SoundSystem::finalize`] (or by dropping it).

use crate::audio::backend::{AudioBackend, VoiceState};
use crate::audio::instance::{InstanceTable, SoundInstance};
use crate::audio::sound_data::{SoundData, SoundDataRegistry};
use crate::audio::streaming::drain_finished_buffers;
use crate::audio::voice_manager::{BufferPool, VoicePool};
use crate::audio::{
    AudioError, DecodedSound, InstanceHandle, SoundDataHandle, SoundDecoder,
};
use crate::config::SoundConfig;

/// Pool occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoundStats {
    /// Registered sounds
    pub sound_data: usize,
    /// Live instances
    pub instances: usize,
    /// Instances currently owning a voice
    pub playing_instances: usize,
    /// Voices in the pool
    pub voices: usize,
    /// Voices not owned by an instance
    pub free_voices: usize,
    /// Buffers in the pool
    pub buffers: usize,
    /// Buffers not owned by an instance
    pub free_buffers: usize,
}

/// Fixed-capacity streaming sound system
pub struct SoundSystem<B: AudioBackend> {
    pub(super) backend: B,
    pub(super) sound_data: SoundDataRegistry,
    pub(super) instances: InstanceTable,
    pub(super) voices: VoicePool,
    pub(super) buffers: BufferPool,
    pub(super) master_gain: f32,
    pub(super) buffer_size: usize,
    finalized: bool,
}

impl<B: AudioBackend> SoundSystem<B> {
    /// Bring up the backend and allocate every pool
    ///
    /// If the backend runs out of voices or buffers before the configured
    /// count, the pool is created with what the backend could provide.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` fails validation
    /// - `BackendInitFailed` if the backend cannot be initialized; no pool
    ///   is allocated in that case
    pub fn initialize(mut backend: B, config: &SoundConfig) -> Result<Self, AudioError> {
        config.validate().map_err(AudioError::InvalidConfig)?;

        if let Err(e) = backend.initialize() {
            log::error!("Failed to initialize sound: {}", e);
            return Err(match e {
                AudioError::BackendInitFailed(reason) => AudioError::BackendInitFailed(reason),
                other => AudioError::BackendInitFailed(other.to_string()),
            });
        }

        let mut voice_ids = Vec::with_capacity(config.max_voices);
        for _ in 0..config.max_voices {
            match backend.create_voice() {
                Ok(id) => voice_ids.push(id),
                Err(e) => {
                    log::warn!("Created {} of {} voices: {}", voice_ids.len(), config.max_voices, e);
                    break;
                }
            }
        }

        let mut buffer_ids = Vec::with_capacity(config.max_buffers);
        for _ in 0..config.max_buffers {
            match backend.create_buffer() {
                Ok(id) => buffer_ids.push(id),
                Err(e) => {
                    log::warn!("Created {} of {} buffers: {}", buffer_ids.len(), config.max_buffers, e);
                    break;
                }
            }
        }

        let mut voices = VoicePool::new(voice_ids);
        voices.refresh(&backend);

        log::info!(
            "Sound system initialized: {} voices, {} buffers of {} bytes, {} sound data, {} instances",
            voices.len(),
            buffer_ids.len(),
            config.buffer_size,
            config.max_sound_data,
            config.max_instances
        );

        Ok(Self {
            backend,
            sound_data: SoundDataRegistry::with_capacity(config.max_sound_data),
            instances: InstanceTable::with_capacity(config.max_instances),
            voices,
            buffers: BufferPool::new(&buffer_ids),
            master_gain: config.gain,
            buffer_size: config.buffer_size,
            finalized: false,
        })
    }

    /// Stop every voice and release all backend resources
    ///
    /// Sound data and instances still allocated are reported, not freed.
    /// Afterwards the system has no voices or buffers, so `play` fails and
    /// `update` does nothing. Calling it again repeats the leak report only.
    ///
    /// # Errors
    /// `ResourceLeak` if any sound data or instance was not deleted.
    pub fn finalize(&mut self) -> Result<(), AudioError> {
        let sound_data = self.sound_data.len();
        let instances = self.instances.len();

        if sound_data > 0 {
            log::error!("{} sound-data not deleted", sound_data);
        }
        if instances > 0 {
            log::error!("{} sound-instances not deleted", instances);
        }

        self.release_backend_resources();

        if sound_data > 0 || instances > 0 {
            Err(AudioError::ResourceLeak { sound_data, instances })
        } else {
            Ok(())
        }
    }

    fn release_backend_resources(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let voices = std::mem::take(&mut self.voices);
        for slot in voices.iter() {
            if let Err(e) = self.backend.stop_voice(slot.id) {
                log::error!("Failed to stop voice {:?}: {}", slot.id, e);
            }
            drain_finished_buffers(&mut self.backend, slot.id);
            if let Err(e) = self.backend.destroy_voice(slot.id) {
                log::error!("Failed to destroy voice {:?}: {}", slot.id, e);
            }
        }

        let buffers = std::mem::replace(&mut self.buffers, BufferPool::new(&[]));
        for id in buffers.ids() {
            if let Err(e) = self.backend.destroy_buffer(id) {
                log::error!("Failed to destroy buffer {:?}: {}", id, e);
            }
        }

        // Nothing is bound to a voice any more
        for index in 0..self.instances.capacity() {
            if let Some(instance) = self
                .instances
                .handle_at(index)
                .and_then(|handle| self.instances.get_mut(handle))
            {
                instance.binding = None;
            }
        }

        self.backend.shutdown();
        log::info!("Sound system finalized");
    }

    /// Register decoded samples
    ///
    /// # Errors
    /// `OutOfSoundData` when the registry is full.
    pub fn register_sound_data(&mut self, sound: DecodedSound) -> Result<SoundDataHandle, AudioError> {
        self.sound_data.register(sound)
    }

    /// Decode a sound file and register the result
    ///
    /// # Errors
    /// Decoder errors, or `OutOfSoundData` when the registry is full.
    pub fn load_sound_data<D: SoundDecoder>(&mut self, bytes: &[u8], decoder: &D) -> Result<SoundDataHandle, AudioError> {
        let sound = decoder.decode(bytes).map_err(|e| {
            log::error!("Failed to load sound: {}", e);
            e
        })?;
        self.sound_data.register(sound)
    }

    /// Free a registered sound
    ///
    /// # Errors
    /// - `InvalidHandle` if the sound was already unregistered
    /// - `SoundDataInUse` if a playing instance still streams from it
    pub fn unregister_sound_data(&mut self, handle: SoundDataHandle) -> Result<(), AudioError> {
        if !self.sound_data.contains(handle) {
            return Err(AudioError::InvalidHandle);
        }

        let streaming = self
            .instances
            .iter()
            .any(|(_, instance)| instance.is_bound() && instance.sound_data == Some(handle));
        if streaming {
            return Err(AudioError::SoundDataInUse);
        }

        self.sound_data.unregister(handle)
    }

    /// Get a registered sound
    pub fn sound_data(&self, handle: SoundDataHandle) -> Option<&SoundData> {
        self.sound_data.get(handle)
    }

    /// Create an idle instance of a registered sound
    ///
    /// # Errors
    /// - `InvalidHandle` if the sound is not registered
    /// - `OutOfInstances` when the instance table is full
    pub fn create_instance(&mut self, sound_data: SoundDataHandle) -> Result<InstanceHandle, AudioError> {
        if !self.sound_data.contains(sound_data) {
            return Err(AudioError::InvalidHandle);
        }
        self.instances.create(sound_data)
    }

    /// Destroy an idle instance
    ///
    /// Playback is not stopped implicitly.
    ///
    /// # Errors
    /// - `InvalidHandle` if the instance was already destroyed
    /// - `InstanceStillPlaying` if it still owns a voice; call
    ///   [`stop`](Self::stop) and let [`update`](Self::update) reclaim it first
    pub fn destroy_instance(&mut self, handle: InstanceHandle) -> Result<(), AudioError> {
        self.instances.destroy(handle)
    }

    /// Get an instance
    pub fn instance(&self, handle: InstanceHandle) -> Option<&SoundInstance> {
        self.instances.get(handle)
    }

    /// Set whether an instance restarts when its sound runs out
    ///
    /// # Errors
    /// `InvalidHandle` if the instance does not exist.
    pub fn set_looping(&mut self, handle: InstanceHandle, looping: bool) -> Result<(), AudioError> {
        let instance = self.instances.get_mut(handle).ok_or(AudioError::InvalidHandle)?;
        instance.looping = looping;
        Ok(())
    }

    /// Set instance gain, applied immediately if the instance is playing
    ///
    /// # Errors
    /// `InvalidHandle` if the instance does not exist.
    pub fn set_gain(&mut self, handle: InstanceHandle, gain: f32) -> Result<(), AudioError> {
        let instance = self.instances.get_mut(handle).ok_or(AudioError::InvalidHandle)?;
        instance.gain = gain.max(0.0);

        if let Some(slot) = instance.binding.and_then(|b| self.voices.get(b.voice)) {
            self.backend.set_voice_gain(slot.id, instance.gain * self.master_gain)?;
        }
        Ok(())
    }

    /// Set master gain and re-apply it to every playing instance
    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.max(0.0);

        for (_, instance) in self.instances.iter() {
            if let Some(slot) = instance.binding.and_then(|b| self.voices.get(b.voice)) {
                if let Err(e) = self.backend.set_voice_gain(slot.id, instance.gain * self.master_gain) {
                    log::error!("Failed to set gain on voice {:?}: {}", slot.id, e);
                }
            }
        }
    }

    /// Current master gain
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Bytes copied per buffer refill
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Pool occupancy snapshot
    pub fn stats(&self) -> SoundStats {
        SoundStats {
            sound_data: self.sound_data.len(),
            instances: self.instances.len(),
            playing_instances: self.instances.iter().filter(|(_, i)| i.is_bound()).count(),
            voices: self.voices.len(),
            free_voices: self.voices.free_count(),
            buffers: self.buffers.capacity(),
            free_buffers: self.buffers.remaining(),
        }
    }

    /// Number of voices the backend last reported playing
    pub fn active_voices(&self) -> usize {
        self.voices
            .iter()
            .filter(|slot| slot.state == VoiceState::Playing)
            .count()
    }

    /// Get the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the backend mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: AudioBackend> Drop for SoundSystem<B> {
    fn drop(&mut self) {
        self.release_backend_resources();
    }
}
