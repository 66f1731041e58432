//! Per-file record owned by the coordinator thread.

use std::path::PathBuf;
use std::sync::Arc;

use attacca_core::{AcquireMode, MediaBuffer, ResourceDescriptor, ResourceKey, StreamHandle};

use crate::slot::FileSlot;
use crate::state::FileState;
use crate::waiters::Waiters;

/// Authoritative lifecycle record for one registered resource.
///
/// Only the coordinator thread touches an entry; everything other threads
/// may observe is mirrored into the shared [`FileSlot`].
pub(crate) struct FileEntry {
    pub desc: Arc<ResourceDescriptor>,
    pub slot: Arc<FileSlot>,
    state: FileState,
    /// Chosen once from the descriptor flags; prefetch buffers never map.
    pub acquire_mode: AcquireMode,
    /// Resident bytes: the whole file, or the prefetch window when streamed.
    pub buffer: Option<Arc<MediaBuffer>>,
    /// Size of the file on disk, not of the resident buffer.
    pub file_size: u64,
    pub stream: Option<Arc<dyn StreamHandle>>,
    pub resolved_path: PathBuf,
    pub refs: u32,
    pub waiters: Waiters,
    /// A close arrived mid-operation; run it when the operation resolves.
    pub close_deferred: bool,
    /// An unload was requested and has not resolved yet. Stays set while the
    /// request sits in the retry queue so later requests coalesce onto it.
    pub unload_pending: bool,
    /// An engine unload call is awaiting its gate or completion right now.
    pub unload_in_flight: bool,
    /// Busy answers for the current unload; cleared when it lands.
    pub retry_attempts: u32,
}

impl FileEntry {
    pub fn new(desc: Arc<ResourceDescriptor>, slot: Arc<FileSlot>) -> Self {
        let acquire_mode = if desc.flags.streaming {
            AcquireMode::for_prefetch(&desc.flags)
        } else {
            AcquireMode::for_resident(&desc.flags)
        };
        Self {
            desc,
            slot,
            state: FileState::Unknown,
            acquire_mode,
            buffer: None,
            file_size: 0,
            stream: None,
            resolved_path: PathBuf::new(),
            refs: 0,
            waiters: Waiters::default(),
            close_deferred: false,
            unload_pending: false,
            unload_in_flight: false,
            retry_attempts: 0,
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.desc.key()
    }

    pub fn is_streamed(&self) -> bool {
        self.desc.is_streamed()
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Moves along a legal edge and publishes the new state.
    pub fn set_state(&mut self, to: FileState) {
        debug_assert!(
            FileState::can_transition(self.state, to),
            "illegal transition {} -> {} for {}",
            self.state,
            to,
            self.key()
        );
        tracing::debug!("{}: {} -> {}", self.key(), self.state, to);
        self.state = to;
        self.slot.publish_state(to);
    }

    /// Shutdown path: jumps without edge checking.
    pub fn force_state(&mut self, to: FileState) {
        self.state = to;
        self.slot.publish_state(to);
    }

    /// Re-reads are needed when the resident bytes were released and the
    /// resource actually has bytes to bring back. Streamed resources only
    /// re-read when a prefetch window is configured.
    pub fn needs_bytes(&self) -> bool {
        self.buffer.is_none()
            && self.file_size > 0
            && (!self.is_streamed() || self.desc.prefetch_size > 0)
    }

    /// Closes the stream handle and unpublishes it.
    pub fn drop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.slot.publish_binding(None);
    }
}
