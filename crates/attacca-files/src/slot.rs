//! Published per-file view readable from any thread.
//!
//! The coordinator owns the authoritative record; it mirrors the state and
//! the active stream handle into a [`FileSlot`] so hot paths (state queries,
//! streamed reads) never cross the command channel.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use attacca_core::StreamHandle;

use crate::state::FileState;

/// Sized wrapper so the handle can live inside an [`ArcSwapOption`].
pub(crate) struct StreamBinding {
    pub handle: Arc<dyn StreamHandle>,
}

pub(crate) struct FileSlot {
    state: AtomicU8,
    binding: ArcSwapOption<StreamBinding>,
}

impl FileSlot {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(FileState::Unknown as u8),
            binding: ArcSwapOption::empty(),
        }
    }

    pub fn state(&self) -> FileState {
        FileState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn publish_state(&self, state: FileState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn binding(&self) -> Option<Arc<StreamBinding>> {
        self.binding.load_full()
    }

    pub fn publish_binding(&self, binding: Option<Arc<StreamBinding>>) {
        self.binding.store(binding);
    }
}

impl std::fmt::Debug for FileSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSlot")
            .field("state", &self.state())
            .field("bound", &self.binding.load().is_some())
            .finish()
    }
}
