//! Fixed-capacity collections
//!
//! [`SlotPool`] is the allocator behind every pool in the sound engine. All
//! storage is reserved when the pool is created; `acquire` and `release` only
//! move indices between the free stack and the live set, so they never touch
//! the heap.

use thiserror::Error;

/// Generation-checked reference to a slot in a [`SlotPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// Dense slot index, always below the pool capacity
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation the slot had when this key was handed out
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Slot pool errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPoolError {
    /// Every slot is in use
    #[error("Slot pool is empty")]
    Empty,

    /// The key does not refer to a slot currently held by the caller
    #[error("Slot {index} is not held (stale or double release)")]
    NotHeld {
        /// Index of the offending key
        index: usize,
    },
}

/// Pool entry
#[derive(Debug)]
struct PoolEntry<T> {
    value: T,
    generation: u32,
    allocated: bool,
}

/// Fixed-capacity free-list allocator handing out dense indices
///
/// Every entry always holds a `T`. Pools of pre-created resources (backend
/// buffers) keep their value across acquire/release; pools of records
/// overwrite the value through [`SlotPool::insert`].
#[derive(Debug)]
pub struct SlotPool<T> {
    entries: Vec<PoolEntry<T>>,
    free_indices: Vec<u32>,
}

impl<T> SlotPool<T> {
    /// Create a pool of `capacity` slots, initializing each value with `init`
    ///
    /// Slots are handed out lowest index first.
    pub fn from_fn(capacity: usize, mut init: impl FnMut(usize) -> T) -> Self {
        let entries: Vec<PoolEntry<T>> = (0..capacity)
            .map(|index| PoolEntry {
                value: init(index),
                generation: 0,
                allocated: false,
            })
            .collect();

        let mut free_indices = Vec::with_capacity(capacity);
        free_indices.extend((0..capacity as u32).rev());

        Self { entries, free_indices }
    }

    /// Take a free slot
    ///
    /// # Errors
    /// `SlotPoolError::Empty` when no free slot remains. This is an ordinary
    /// exhaustion condition, callers recover by releasing other slots.
    pub fn acquire(&mut self) -> Result<SlotKey, SlotPoolError> {
        let index = self.free_indices.pop().ok_or(SlotPoolError::Empty)?;
        let entry = &mut self.entries[index as usize];
        debug_assert!(!entry.allocated, "free list handed out a live slot");

        entry.allocated = true;
        entry.generation = entry.generation.wrapping_add(1);

        Ok(SlotKey {
            index,
            generation: entry.generation,
        })
    }

    /// Take a free slot and store `value` in it
    ///
    /// # Errors
    /// `SlotPoolError::Empty` when no free slot remains; `value` is dropped.
    pub fn insert(&mut self, value: T) -> Result<SlotKey, SlotPoolError> {
        let key = self.acquire()?;
        self.entries[key.index()].value = value;
        Ok(key)
    }

    /// Return a slot to the pool
    ///
    /// The stored value is left in place.
    ///
    /// # Errors
    /// `SlotPoolError::NotHeld` if the key is stale or was already released.
    /// The free list is left untouched in that case.
    pub fn release(&mut self, key: SlotKey) -> Result<(), SlotPoolError> {
        if !self.contains(key) {
            log::debug!("Rejected release of slot {} (generation {})", key.index, key.generation);
            return Err(SlotPoolError::NotHeld { index: key.index() });
        }

        self.entries[key.index()].allocated = false;
        self.free_indices.push(key.index);
        Ok(())
    }

    /// Check whether `key` refers to a live slot
    pub fn contains(&self, key: SlotKey) -> bool {
        self.entries
            .get(key.index())
            .is_some_and(|entry| entry.allocated && entry.generation == key.generation)
    }

    /// Get the value behind a live key
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.entries
            .get(key.index())
            .filter(|entry| entry.allocated && entry.generation == key.generation)
            .map(|entry| &entry.value)
    }

    /// Get a mutable reference to the value behind a live key
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.entries
            .get_mut(key.index())
            .filter(|entry| entry.allocated && entry.generation == key.generation)
            .map(|entry| &mut entry.value)
    }

    /// Key of the live slot at `index`, if any
    pub fn key_at(&self, index: usize) -> Option<SlotKey> {
        self.entries
            .get(index)
            .filter(|entry| entry.allocated)
            .map(|entry| SlotKey {
                index: index as u32,
                generation: entry.generation,
            })
    }

    /// Iterate live slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.allocated)
            .map(|(index, entry)| {
                (
                    SlotKey {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    &entry.value,
                )
            })
    }

    /// Iterate every stored value, live or free
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &entry.value)
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.entries.len() - self.free_indices.len()
    }

    /// Check if no slot is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of free slots
    pub fn remaining(&self) -> usize {
        self.free_indices.len()
    }

    /// Fixed number of slots
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Default> SlotPool<T> {
    /// Create a pool of `capacity` default-initialized slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_fn(capacity, |_| T::default())
    }
}
