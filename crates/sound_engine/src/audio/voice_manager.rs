//! Voice and buffer resources
//!
//! Backend voices and buffers are created once at startup and then only
//! handed between instances. Each voice caches the playback state observed
//! at the last [`VoicePool::refresh`] so the streaming code never polls the
//! backend more than once per voice per tick.

use crate::audio::backend::{AudioBackend, BufferId, VoiceId, VoiceState};
use crate::audio::AudioError;
use crate::foundation::collections::{SlotKey, SlotPool};

/// Backend voice plus cached bookkeeping
#[derive(Debug, Clone, Copy)]
pub struct VoiceSlot {
    /// Backend voice handle
    pub id: VoiceId,
    /// Playback state observed at the last refresh
    pub state: VoiceState,
    /// Whether an instance currently owns this voice
    pub bound: bool,
}

/// Fixed set of backend voices
#[derive(Debug, Default)]
pub struct VoicePool {
    slots: Vec<VoiceSlot>,
}

impl VoicePool {
    /// Wrap voices created by the backend
    pub fn new(ids: Vec<VoiceId>) -> Self {
        let slots = ids
            .into_iter()
            .map(|id| VoiceSlot {
                id,
                state: VoiceState::Inactive,
                bound: false,
            })
            .collect();
        Self { slots }
    }

    /// Poll the backend for the state of every voice
    ///
    /// A voice whose query fails keeps its previous state.
    pub fn refresh<B: AudioBackend>(&mut self, backend: &B) {
        for slot in &mut self.slots {
            match backend.query_voice_state(slot.id) {
                Ok(state) => slot.state = state,
                Err(e) => log::error!("Failed to query voice {:?}: {}", slot.id, e),
            }
        }
    }

    /// First voice that is neither owned nor observed playing
    pub fn find_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.bound && slot.state != VoiceState::Playing)
    }

    /// Mark a voice as owned
    pub fn bind(&mut self, index: usize) {
        debug_assert!(!self.slots[index].bound, "voice {} bound twice", index);
        self.slots[index].bound = true;
    }

    /// Return a voice to the pool
    pub fn unbind(&mut self, index: usize) {
        debug_assert!(self.slots[index].bound, "voice {} released twice", index);
        self.slots[index].bound = false;
    }

    /// Get a voice slot
    pub fn get(&self, index: usize) -> Option<&VoiceSlot> {
        self.slots.get(index)
    }

    /// Override the cached state (after starting or stopping a voice)
    pub fn set_state(&mut self, index: usize, state: VoiceState) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.state = state;
        }
    }

    /// Iterate all voices
    pub fn iter(&self) -> impl Iterator<Item = &VoiceSlot> {
        self.slots.iter()
    }

    /// Number of voices
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the pool has no voices
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of voices not owned by an instance
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.bound).count()
    }
}

/// Fixed set of backend buffers
#[derive(Debug)]
pub struct BufferPool {
    pool: SlotPool<BufferId>,
}

impl BufferPool {
    /// Wrap buffers created by the backend
    pub fn new(ids: &[BufferId]) -> Self {
        Self {
            pool: SlotPool::from_fn(ids.len(), |index| ids[index]),
        }
    }

    /// Take two buffers for double buffering
    ///
    /// # Errors
    /// `OutOfBuffers` if fewer than two are free; nothing is taken then.
    pub fn acquire_pair(&mut self) -> Result<[SlotKey; 2], AudioError> {
        if self.pool.remaining() < 2 {
            return Err(AudioError::OutOfBuffers);
        }

        let first = self.pool.acquire().map_err(|_| AudioError::OutOfBuffers)?;
        let second = self.pool.acquire().map_err(|_| AudioError::OutOfBuffers)?;
        Ok([first, second])
    }

    /// Return both buffers of a pair
    pub fn release_pair(&mut self, pair: [SlotKey; 2]) {
        for key in pair {
            if let Err(e) = self.pool.release(key) {
                log::error!("Buffer pool release failed: {}", e);
            }
        }
    }

    /// Backend handle behind a held buffer
    pub fn id(&self, key: SlotKey) -> Option<BufferId> {
        self.pool.get(key).copied()
    }

    /// Iterate every backend buffer, held or free
    pub fn ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.pool.values().copied()
    }

    /// Number of free buffers
    pub fn remaining(&self) -> usize {
        self.pool.remaining()
    }

    /// Number of buffers
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }
}
