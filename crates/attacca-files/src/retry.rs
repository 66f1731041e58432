//! Parking lot for unloads the engine reported busy.
//!
//! Keys wait here until the engine frees resources or the retry tick fires;
//! the coordinator then re-issues the unload for every parked key. Parking
//! is idempotent so repeated busy answers keep a single slot per key.

use attacca_core::ResourceKey;
use smallvec::SmallVec;

#[derive(Default)]
pub(crate) struct RetryQueue {
    parked: SmallVec<[ResourceKey; 4]>,
}

impl RetryQueue {
    /// Parks a key, keeping at most one slot per key.
    pub fn park(&mut self, key: ResourceKey) {
        if !self.parked.contains(&key) {
            self.parked.push(key);
        }
    }

    /// Takes every parked key for a retry sweep, leaving the queue empty.
    pub fn take(&mut self) -> SmallVec<[ResourceKey; 4]> {
        std::mem::take(&mut self.parked)
    }

    /// Drops a key whose pending unload resolved through another path.
    pub fn forget(&mut self, key: ResourceKey) {
        self.parked.retain(|k| *k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.parked.len()
    }
}
