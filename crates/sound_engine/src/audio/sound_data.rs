//! Sound data registry
//!
//! Fixed-capacity storage for decoded sounds. Instances refer to their sound
//! through a [`SoundDataHandle`]; the registry owns the sample bytes until the
//! sound is unregistered.

use crate::audio::{AudioError, DecodedSound, SoundFormat};
use crate::foundation::collections::{SlotKey, SlotPool};

/// Handle to a registered sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundDataHandle(pub(crate) SlotKey);

impl SoundDataHandle {
    /// Registry slot index
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// A decoded sound ready for streaming
#[derive(Debug, Clone, PartialEq)]
pub struct SoundData {
    samples: Vec<u8>,
    format: SoundFormat,
}

impl SoundData {
    /// Raw sample bytes
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Length of the sample data in bytes
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the sound has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample layout
    pub fn format(&self) -> SoundFormat {
        self.format
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f32 {
        let bytes_per_second = self.format.bytes_per_second();
        if bytes_per_second == 0 {
            0.0
        } else {
            self.samples.len() as f32 / bytes_per_second as f32
        }
    }
}

impl Default for SoundData {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            format: SoundFormat::default(),
        }
    }
}

/// Pool of registered sounds
#[derive(Debug)]
pub struct SoundDataRegistry {
    pool: SlotPool<SoundData>,
}

impl SoundDataRegistry {
    /// Create a registry with room for `capacity` sounds
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: SlotPool::with_capacity(capacity),
        }
    }

    /// Take ownership of decoded samples
    ///
    /// # Errors
    /// `OutOfSoundData` when every slot is taken. The decoded samples are
    /// dropped in that case.
    pub fn register(&mut self, sound: DecodedSound) -> Result<SoundDataHandle, AudioError> {
        let key = self
            .pool
            .insert(SoundData {
                samples: sound.samples,
                format: sound.format,
            })
            .map_err(|_| AudioError::OutOfSoundData)?;

        Ok(SoundDataHandle(key))
    }

    /// Free the samples and return the slot
    ///
    /// # Errors
    /// `InvalidHandle` if the sound was already unregistered.
    pub fn unregister(&mut self, handle: SoundDataHandle) -> Result<(), AudioError> {
        let data = self.pool.get_mut(handle.0).ok_or(AudioError::InvalidHandle)?;
        data.samples = Vec::new();
        self.pool
            .release(handle.0)
            .map_err(|_| AudioError::InvalidHandle)
    }

    /// Get a registered sound
    pub fn get(&self, handle: SoundDataHandle) -> Option<&SoundData> {
        self.pool.get(handle.0)
    }

    /// Check whether `handle` refers to a registered sound
    pub fn contains(&self, handle: SoundDataHandle) -> bool {
        self.pool.contains(handle.0)
    }

    /// Number of registered sounds
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Check if no sound is registered
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Number of free slots
    pub fn remaining(&self) -> usize {
        self.pool.remaining()
    }

    /// Maximum number of sounds
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tone(bytes: usize) -> DecodedSound {
        DecodedSound::new(vec![0x80; bytes], SoundFormat::new(1, 8, 8000))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SoundDataRegistry::with_capacity(4);
        let handle = registry.register(tone(16)).unwrap();

        let data = registry.get(handle).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(data.format(), SoundFormat::new(1, 8, 8000));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remaining(), 3);
    }

    #[test]
    fn test_out_of_sound_data() {
        let mut registry = SoundDataRegistry::with_capacity(1);
        registry.register(tone(4)).unwrap();

        assert_eq!(registry.register(tone(4)), Err(AudioError::OutOfSoundData));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_frees_slot() {
        let mut registry = SoundDataRegistry::with_capacity(1);
        let handle = registry.register(tone(4)).unwrap();

        registry.unregister(handle).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get(handle).is_none());
        assert!(registry.register(tone(4)).is_ok());
    }

    #[test]
    fn test_double_unregister_is_error() {
        let mut registry = SoundDataRegistry::with_capacity(2);
        let handle = registry.register(tone(4)).unwrap();

        registry.unregister(handle).unwrap();
        assert_eq!(registry.unregister(handle), Err(AudioError::InvalidHandle));
    }

    #[test]
    fn test_duration() {
        let mut registry = SoundDataRegistry::with_capacity(1);
        let handle = registry.register(tone(4000)).unwrap();
        assert_relative_eq!(registry.get(handle).unwrap().duration_secs(), 0.5);
    }
}
