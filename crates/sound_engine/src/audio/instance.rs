//! Sound instances
//!
//! An instance is one playback session of a registered sound: its own read
//! offset, gain and looping flag. While playing it owns one voice and two
//! buffers, recorded together in a single [`VoiceBinding`] so they are always
//! bound and released as a unit.

use crate::audio::{AudioError, SoundDataHandle};
use crate::foundation::collections::{SlotKey, SlotPool};

/// Handle to a sound instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub(crate) SlotKey);

impl InstanceHandle {
    /// Instance slot index
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// Voice and buffers owned by a playing instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceBinding {
    /// Index into the voice pool
    pub voice: usize,
    /// Buffer pool keys, in initial submission order
    pub buffers: [SlotKey; 2],
}

/// One playback session
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInstance {
    /// Sound streamed by this instance
    pub sound_data: Option<SoundDataHandle>,
    /// Next byte to copy from the sound's samples
    pub offset: usize,
    /// Restart from the beginning when the samples run out
    pub looping: bool,
    /// Instance gain, multiplied with the master gain
    pub gain: f32,
    /// Voice and buffers while playing
    pub binding: Option<VoiceBinding>,
}

impl SoundInstance {
    /// Create an unbound instance of `sound_data`
    pub fn new(sound_data: SoundDataHandle) -> Self {
        Self {
            sound_data: Some(sound_data),
            ..Self::default()
        }
    }

    /// Check if the instance owns a voice
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

impl Default for SoundInstance {
    fn default() -> Self {
        Self {
            sound_data: None,
            offset: 0,
            looping: false,
            gain: 1.0,
            binding: None,
        }
    }
}

/// Pool of sound instances
#[derive(Debug)]
pub struct InstanceTable {
    pool: SlotPool<SoundInstance>,
}

impl InstanceTable {
    /// Create a table with room for `capacity` instances
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: SlotPool::with_capacity(capacity),
        }
    }

    /// Create an unbound instance
    ///
    /// # Errors
    /// `OutOfInstances` when every slot is taken.
    pub fn create(&mut self, sound_data: SoundDataHandle) -> Result<InstanceHandle, AudioError> {
        self.pool
            .insert(SoundInstance::new(sound_data))
            .map(InstanceHandle)
            .map_err(|_| AudioError::OutOfInstances)
    }

    /// Release an instance slot
    ///
    /// # Errors
    /// - `InvalidHandle` if the instance was already destroyed
    /// - `InstanceStillPlaying` if it still owns a voice
    pub fn destroy(&mut self, handle: InstanceHandle) -> Result<(), AudioError> {
        let instance = self.pool.get_mut(handle.0).ok_or(AudioError::InvalidHandle)?;
        if instance.is_bound() {
            return Err(AudioError::InstanceStillPlaying);
        }

        *instance = SoundInstance::default();
        self.pool
            .release(handle.0)
            .map_err(|_| AudioError::InvalidHandle)
    }

    /// Get an instance
    pub fn get(&self, handle: InstanceHandle) -> Option<&SoundInstance> {
        self.pool.get(handle.0)
    }

    /// Get a mutable reference to an instance
    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut SoundInstance> {
        self.pool.get_mut(handle.0)
    }

    /// Handle of the live instance in slot `index`
    pub fn handle_at(&self, index: usize) -> Option<InstanceHandle> {
        self.pool.key_at(index).map(InstanceHandle)
    }

    /// Iterate live instances in slot order
    pub fn iter(&self) -> impl Iterator<Item = (InstanceHandle, &SoundInstance)> {
        self.pool.iter().map(|(key, instance)| (InstanceHandle(key), instance))
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Check if no instance is live
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Number of free slots
    pub fn remaining(&self) -> usize {
        self.pool.remaining()
    }

    /// Maximum number of instances
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }
}
