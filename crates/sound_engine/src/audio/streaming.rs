//! Double-buffered streaming
//!
//! A playing instance owns one voice and two buffers. `play` primes both
//! buffers and starts the voice; every `update` tick unqueues buffers the
//! voice has finished, refills them from the instance's read offset and
//! queues them again. Once a non-looping voice runs dry, `update` gives the
//! voice and buffers back to their pools.
//!
//! Nothing here allocates: instances are visited by slot index and all
//! bookkeeping lives in the fixed pools created at startup.

use crate::audio::backend::{AudioBackend, BufferId, VoiceId, VoiceState};
use crate::audio::instance::{SoundInstance, VoiceBinding};
use crate::audio::sound_data::SoundData;
use crate::audio::{AudioError, InstanceHandle, SoundSystem};

/// Copy the next chunk of `sound` into `buffer` and advance the read offset
///
/// Copies `min(chunk_size, remaining)` bytes. A looping instance that has
/// reached the end restarts from offset 0 first. Returns the number of bytes
/// copied; 0 means the sound is exhausted.
pub(super) fn fill_buffer<B: AudioBackend>(
    backend: &mut B,
    sound: &SoundData,
    instance: &mut SoundInstance,
    buffer: BufferId,
    chunk_size: usize,
) -> Result<usize, AudioError> {
    debug_assert!(instance.offset <= sound.len());

    let mut to_copy = chunk_size.min(sound.len().saturating_sub(instance.offset));
    if instance.looping && to_copy == 0 {
        instance.offset = 0;
        to_copy = chunk_size.min(sound.len());
    }

    let start = instance.offset;
    backend.fill_buffer(buffer, &sound.samples()[start..start + to_copy], sound.format())?;
    instance.offset += to_copy;

    Ok(to_copy)
}

/// Unqueue every buffer the voice has finished with
pub(super) fn drain_finished_buffers<B: AudioBackend>(backend: &mut B, voice: VoiceId) {
    let finished = backend.count_finished_buffers(voice).unwrap_or_else(|e| {
        log::error!("Failed to query finished buffers on voice {:?}: {}", voice, e);
        0
    });

    for _ in 0..finished {
        if let Err(e) = backend.unqueue_finished_buffer(voice) {
            log::error!("Failed to unqueue buffer from voice {:?}: {}", voice, e);
            break;
        }
    }
}

impl<B: AudioBackend> SoundSystem<B> {
    /// Start streaming an idle instance
    ///
    /// Binds a free voice and two buffers, fills both from the current read
    /// offset and starts the voice. The second buffer is only queued if the
    /// sound had data left for it.
    ///
    /// # Errors
    /// - `InvalidHandle` if the instance or its sound no longer exists
    /// - `AlreadyPlaying` if the instance already owns a voice
    /// - `OutOfSources` if every voice is owned or still playing
    /// - `OutOfBuffers` if fewer than two buffers are free
    ///
    /// No pool is modified when an error is returned.
    pub fn play(&mut self, handle: InstanceHandle) -> Result<(), AudioError> {
        let Self {
            backend,
            sound_data,
            instances,
            voices,
            buffers,
            master_gain,
            buffer_size,
            ..
        } = self;

        let instance = instances.get_mut(handle).ok_or(AudioError::InvalidHandle)?;
        if instance.is_bound() {
            return Err(AudioError::AlreadyPlaying);
        }
        let sound = instance
            .sound_data
            .and_then(|data| sound_data.get(data))
            .ok_or(AudioError::InvalidHandle)?;

        let Some(voice_index) = voices.find_free() else {
            log::warn!("Out of sound sources");
            return Err(AudioError::OutOfSources);
        };
        let voice = voices
            .get(voice_index)
            .map(|slot| slot.id)
            .ok_or(AudioError::OutOfSources)?;

        let pair = buffers.acquire_pair().map_err(|e| {
            log::warn!("Out of sound buffers");
            e
        })?;
        let [Some(buffer_a), Some(buffer_b)] = pair.map(|key| buffers.id(key)) else {
            buffers.release_pair(pair);
            return Err(AudioError::OutOfBuffers);
        };

        voices.bind(voice_index);
        instance.binding = Some(VoiceBinding {
            voice: voice_index,
            buffers: pair,
        });

        if let Err(e) = backend.set_voice_gain(voice, instance.gain * *master_gain) {
            log::error!("Failed to set gain on voice {:?}: {}", voice, e);
        }

        match fill_buffer(backend, sound, instance, buffer_a, *buffer_size) {
            Ok(_) => {
                if let Err(e) = backend.submit_buffer(voice, buffer_a) {
                    log::error!("Failed to queue buffer on voice {:?}: {}", voice, e);
                }
            }
            Err(e) => log::error!("Failed to fill buffer {:?}: {}", buffer_a, e),
        }

        match fill_buffer(backend, sound, instance, buffer_b, *buffer_size) {
            Ok(0) => {}
            Ok(_) => {
                if let Err(e) = backend.submit_buffer(voice, buffer_b) {
                    log::error!("Failed to queue buffer on voice {:?}: {}", voice, e);
                }
            }
            Err(e) => log::error!("Failed to fill buffer {:?}: {}", buffer_b, e),
        }

        if let Err(e) = backend.start_voice(voice) {
            log::error!("Failed to start voice {:?}: {}", voice, e);
        }
        voices.set_state(voice_index, VoiceState::Playing);

        log::debug!("Instance {} playing on voice {}", handle.index(), voice_index);
        Ok(())
    }

    /// Ask the voice of an instance to stop
    ///
    /// Clears the looping flag. The voice and buffers stay bound until the
    /// next [`update`](Self::update) observes the voice inactive, so
    /// [`is_playing`](Self::is_playing) keeps returning `true` until then.
    /// Stopping an idle instance only clears the flag.
    ///
    /// # Errors
    /// - `InvalidHandle` if the instance does not exist
    /// - `Backend` if the backend refused to stop the voice
    pub fn stop(&mut self, handle: InstanceHandle) -> Result<(), AudioError> {
        let instance = self.instances.get_mut(handle).ok_or(AudioError::InvalidHandle)?;
        instance.looping = false;

        if let Some(slot) = instance.binding.and_then(|b| self.voices.get(b.voice)) {
            self.backend.stop_voice(slot.id)?;
        }
        Ok(())
    }

    /// Check whether an instance currently owns a voice
    ///
    /// Stale handles report `false`.
    pub fn is_playing(&self, handle: InstanceHandle) -> bool {
        self.instances.get(handle).is_some_and(SoundInstance::is_bound)
    }

    /// Advance streaming by one tick
    ///
    /// Refreshes the cached state of every voice, then visits playing
    /// instances in slot order: finished non-looping instances are released,
    /// the rest get their finished buffers refilled and queued again. A
    /// looping voice that ran dry between ticks is restarted. Backend errors
    /// are logged and the instance is skipped for this tick.
    pub fn update(&mut self) {
        let Self {
            backend,
            sound_data,
            instances,
            voices,
            buffers,
            buffer_size,
            ..
        } = self;

        voices.refresh(backend);

        for index in 0..instances.capacity() {
            let Some(handle) = instances.handle_at(index) else {
                continue;
            };
            let Some(instance) = instances.get_mut(handle) else {
                continue;
            };
            let Some(binding) = instance.binding else {
                continue;
            };
            let Some(voice) = voices.get(binding.voice).copied() else {
                continue;
            };

            if voice.state != VoiceState::Playing && !instance.looping {
                drain_finished_buffers(backend, voice.id);
                buffers.release_pair(binding.buffers);
                voices.unbind(binding.voice);
                instance.binding = None;
                instance.offset = 0;
                log::debug!("Instance {} finished, voice {} released", index, binding.voice);
                continue;
            }

            let Some(sound) = instance.sound_data.and_then(|data| sound_data.get(data)) else {
                log::error!("Instance {} streams from unregistered sound data", index);
                continue;
            };

            let finished = match backend.count_finished_buffers(voice.id) {
                Ok(count) => count,
                Err(e) => {
                    log::error!("Failed to query finished buffers on voice {:?}: {}", voice.id, e);
                    continue;
                }
            };

            let mut requeued = 0;
            for _ in 0..finished {
                let buffer = match backend.unqueue_finished_buffer(voice.id) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        log::error!("Failed to unqueue buffer from voice {:?}: {}", voice.id, e);
                        break;
                    }
                };

                match fill_buffer(backend, sound, instance, buffer, *buffer_size) {
                    Ok(0) => {}
                    Ok(_) => match backend.submit_buffer(voice.id, buffer) {
                        Ok(()) => requeued += 1,
                        Err(e) => log::error!("Failed to queue buffer on voice {:?}: {}", voice.id, e),
                    },
                    Err(e) => log::error!("Failed to fill buffer {:?}: {}", buffer, e),
                }
            }

            // Looping voice drained both buffers before we got here
            if voice.state != VoiceState::Playing && requeued > 0 {
                log::warn!("Sound instance {} underran, restarting voice", index);
                match backend.start_voice(voice.id) {
                    Ok(()) => voices.set_state(binding.voice, VoiceState::Playing),
                    Err(e) => log::error!("Failed to restart voice {:?}: {}", voice.id, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DecodedSound, SimulatedBackend, SoundDataHandle, SoundFormat};
    use crate::config::SoundConfig;

    const VOICE: VoiceId = VoiceId(0);

    fn system(config: &SoundConfig) -> SoundSystem<SimulatedBackend> {
        SoundSystem::initialize(SimulatedBackend::new(), config).unwrap()
    }

    fn ramp(sound: &mut SoundSystem<SimulatedBackend>, bytes: usize) -> SoundDataHandle {
        let samples = (0..bytes).map(|i| i as u8).collect();
        sound
            .register_sound_data(DecodedSound::new(samples, SoundFormat::new(1, 8, 8000)))
            .unwrap()
    }

    fn tick(sound: &mut SoundSystem<SimulatedBackend>) {
        sound.backend_mut().advance();
        sound.update();
    }

    #[test]
    fn test_play_primes_both_buffers() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 10);
        let instance = sound.create_instance(data).unwrap();

        sound.play(instance).unwrap();

        assert!(sound.is_playing(instance));
        assert_eq!(sound.instance(instance).unwrap().offset, 8);
        assert_eq!(sound.backend().queued_buffers(VOICE), 2);
        assert_eq!(sound.backend().start_count(VOICE), 1);

        let stats = sound.stats();
        assert_eq!(stats.free_voices, stats.voices - 1);
        assert_eq!(stats.free_buffers, stats.buffers - 2);
    }

    #[test]
    fn test_short_sound_queues_one_buffer() {
        let config = SoundConfig::new().with_buffer_size(16);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 10);
        let instance = sound.create_instance(data).unwrap();

        sound.play(instance).unwrap();

        assert_eq!(sound.instance(instance).unwrap().offset, 10);
        assert_eq!(sound.backend().queued_buffers(VOICE), 1);
        // Both buffers stay owned by the instance
        assert_eq!(sound.stats().free_buffers, sound.stats().buffers - 2);
    }

    #[test]
    fn test_play_twice_rejected() {
        let mut sound = system(&SoundConfig::default());
        let data = ramp(&mut sound, 64);
        let instance = sound.create_instance(data).unwrap();

        sound.play(instance).unwrap();
        let before = sound.stats();
        assert_eq!(sound.play(instance), Err(AudioError::AlreadyPlaying));
        assert_eq!(sound.stats(), before);
    }

    #[test]
    fn test_out_of_buffers_leaves_pools_unchanged() {
        let config = SoundConfig::new().with_max_voices(4).with_max_buffers(3);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 64);
        let a = sound.create_instance(data).unwrap();
        let b = sound.create_instance(data).unwrap();

        sound.play(a).unwrap();
        let before = sound.stats();

        assert_eq!(sound.play(b), Err(AudioError::OutOfBuffers));
        assert_eq!(sound.stats(), before);
        assert!(!sound.is_playing(b));
    }

    #[test]
    fn test_out_of_sources_leaves_pools_unchanged() {
        let config = SoundConfig::new().with_max_voices(1).with_max_buffers(8);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 64);
        let a = sound.create_instance(data).unwrap();
        let b = sound.create_instance(data).unwrap();

        sound.play(a).unwrap();
        let before = sound.stats();

        assert_eq!(sound.play(b), Err(AudioError::OutOfSources));
        assert_eq!(sound.stats(), before);
        assert!(!sound.is_playing(b));
    }

    #[test]
    fn test_streams_whole_sound_then_releases() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 20);
        let instance = sound.create_instance(data).unwrap();
        sound.play(instance).unwrap();

        let mut ticks = 0;
        while sound.is_playing(instance) {
            tick(&mut sound);
            ticks += 1;
            assert!(ticks <= 10, "instance never finished");
        }

        assert_eq!(sound.backend().played_bytes(VOICE), 20);
        assert_eq!(sound.backend().queued_buffers(VOICE), 0);

        let stats = sound.stats();
        assert_eq!(stats.free_voices, stats.voices);
        assert_eq!(stats.free_buffers, stats.buffers);
        assert_eq!(sound.instance(instance).unwrap().offset, 0);
    }

    #[test]
    fn test_refill_copies_next_chunk() {
        let config = SoundConfig::new().with_buffer_size(4).with_max_buffers(2);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 20);
        let instance = sound.create_instance(data).unwrap();
        sound.play(instance).unwrap();

        // First buffer finishes and is refilled with bytes 8..12
        tick(&mut sound);
        assert_eq!(sound.instance(instance).unwrap().offset, 12);
        assert_eq!(sound.backend().buffer_data(BufferId(0)), Some(&[8u8, 9, 10, 11][..]));
        assert_eq!(sound.backend().queued_buffers(VOICE), 2);
    }

    #[test]
    fn test_finished_voice_stays_bound_until_update() {
        let config = SoundConfig::new().with_buffer_size(8);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 8);
        let instance = sound.create_instance(data).unwrap();
        sound.play(instance).unwrap();

        sound.backend_mut().advance();
        assert!(sound.is_playing(instance));

        sound.update();
        assert!(!sound.is_playing(instance));
    }

    #[test]
    fn test_stop_is_reclaimed_by_update() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 64);
        let instance = sound.create_instance(data).unwrap();
        sound.set_looping(instance, true).unwrap();
        sound.play(instance).unwrap();

        sound.stop(instance).unwrap();
        assert!(!sound.instance(instance).unwrap().looping);
        assert!(sound.is_playing(instance));
        assert_eq!(sound.stats().free_voices, sound.stats().voices - 1);

        sound.update();
        assert!(!sound.is_playing(instance));
        assert_eq!(sound.stats().free_voices, sound.stats().voices);
        assert_eq!(sound.stats().free_buffers, sound.stats().buffers);
        assert_eq!(sound.backend().queued_buffers(VOICE), 0);
    }

    #[test]
    fn test_stop_idle_instance() {
        let mut sound = system(&SoundConfig::default());
        let data = ramp(&mut sound, 4);
        let instance = sound.create_instance(data).unwrap();
        sound.set_looping(instance, true).unwrap();

        assert!(sound.stop(instance).is_ok());
        assert!(!sound.instance(instance).unwrap().looping);
    }

    #[test]
    fn test_looping_wraps_offset() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 10);
        let instance = sound.create_instance(data).unwrap();
        sound.set_looping(instance, true).unwrap();
        sound.play(instance).unwrap();

        for _ in 0..20 {
            tick(&mut sound);
            assert!(sound.is_playing(instance));
            assert!(sound.instance(instance).unwrap().offset <= 10);
        }

        // Chunks of 4, 4, 2 repeat, one buffer consumed per tick
        assert_eq!(sound.backend().played_bytes(VOICE), 68);
    }

    #[test]
    fn test_fill_restarts_looping_sound_from_zero() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 10);
        let instance = sound.create_instance(data).unwrap();
        sound.set_looping(instance, true).unwrap();

        let SoundSystem {
            backend,
            sound_data,
            instances,
            ..
        } = &mut sound;
        let data = sound_data.get(data).unwrap();
        let state = instances.get_mut(instance).unwrap();

        let copied: Vec<usize> = (0..4)
            .map(|_| fill_buffer(backend, data, state, BufferId(0), 4).unwrap())
            .collect();
        assert_eq!(copied, vec![4, 4, 2, 4]);
        assert_eq!(state.offset, 4);
        assert_eq!(backend.buffer_data(BufferId(0)), Some(&[0u8, 1, 2, 3][..]));
    }

    #[test]
    fn test_fill_exhausted_sound_copies_nothing() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 6);
        let instance = sound.create_instance(data).unwrap();

        let SoundSystem {
            backend,
            sound_data,
            instances,
            ..
        } = &mut sound;
        let data = sound_data.get(data).unwrap();
        let state = instances.get_mut(instance).unwrap();

        assert_eq!(fill_buffer(backend, data, state, BufferId(0), 4).unwrap(), 4);
        assert_eq!(fill_buffer(backend, data, state, BufferId(0), 4).unwrap(), 2);
        assert_eq!(fill_buffer(backend, data, state, BufferId(0), 4).unwrap(), 0);
        assert_eq!(state.offset, 6);
    }

    #[test]
    fn test_looping_underrun_restarts_voice() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 32);
        let instance = sound.create_instance(data).unwrap();
        sound.set_looping(instance, true).unwrap();
        sound.play(instance).unwrap();

        // Both buffers drain without an update in between
        sound.backend_mut().advance_by(2);
        sound.update();

        assert!(sound.is_playing(instance));
        assert_eq!(sound.backend().start_count(VOICE), 2);
        assert_eq!(sound.backend().queued_buffers(VOICE), 2);
        assert_eq!(sound.active_voices(), 1);
    }

    #[test]
    fn test_single_voice_shared_in_turn() {
        // One-second sound, one chunk covers it
        let format = SoundFormat::new(1, 16, 8000);
        let config = SoundConfig::new()
            .with_max_instances(2)
            .with_max_voices(1)
            .with_max_buffers(2)
            .with_buffer_size(format.bytes_per_second());
        let mut sound = system(&config);
        let data = sound
            .register_sound_data(DecodedSound::new(vec![0; 16000], format))
            .unwrap();
        let a = sound.create_instance(data).unwrap();
        let b = sound.create_instance(data).unwrap();

        sound.play(a).unwrap();
        assert_eq!(sound.play(b), Err(AudioError::OutOfSources));

        let mut ticks = 0;
        while sound.is_playing(a) {
            tick(&mut sound);
            ticks += 1;
            assert!(ticks <= 4, "instance never finished");
        }

        assert!(sound.play(b).is_ok());
        assert!(sound.is_playing(b));
    }

    #[test]
    fn test_replay_starts_from_beginning() {
        let config = SoundConfig::new().with_buffer_size(4);
        let mut sound = system(&config);
        let data = ramp(&mut sound, 6);
        let instance = sound.create_instance(data).unwrap();

        sound.play(instance).unwrap();
        while sound.is_playing(instance) {
            tick(&mut sound);
        }

        sound.play(instance).unwrap();
        assert_eq!(sound.instance(instance).unwrap().offset, 6);

        let binding = sound.instance(instance).unwrap().binding.unwrap();
        let first = sound.buffers.id(binding.buffers[0]).unwrap();
        assert_eq!(sound.backend().buffer_data(first), Some(&[0u8, 1, 2, 3][..]));
    }

    #[test]
    fn test_destroy_requires_reclaim() {
        let mut sound = system(&SoundConfig::default());
        let data = ramp(&mut sound, 64);
        let instance = sound.create_instance(data).unwrap();
        sound.play(instance).unwrap();

        assert_eq!(sound.destroy_instance(instance), Err(AudioError::InstanceStillPlaying));

        sound.stop(instance).unwrap();
        sound.update();
        assert!(sound.destroy_instance(instance).is_ok());
    }

    #[test]
    fn test_stale_instance_handle() {
        let mut sound = system(&SoundConfig::default());
        let data = ramp(&mut sound, 64);
        let instance = sound.create_instance(data).unwrap();
        sound.destroy_instance(instance).unwrap();

        assert!(!sound.is_playing(instance));
        assert_eq!(sound.play(instance), Err(AudioError::InvalidHandle));
        assert_eq!(sound.stop(instance), Err(AudioError::InvalidHandle));

        // Slot reuse does not revive the old handle
        let reused = sound.create_instance(data).unwrap();
        assert_eq!(reused.index(), instance.index());
        assert_eq!(sound.play(instance), Err(AudioError::InvalidHandle));
    }

    #[test]
    fn test_update_without_playing_instances() {
        let mut sound = system(&SoundConfig::default());
        sound.update();
        assert_eq!(sound.stats().free_voices, sound.stats().voices);
    }
}
