//! Sound-engine collaborator seam.
//!
//! The lifecycle layer never talks to a concrete engine; it drives this trait.
//! Production wires the real engine bridge, tests wire scripted fakes, and
//! offline tooling runs against [`NullSoundEngine`].

use crate::memory::MediaBuffer;
use crate::resource::ResourceKey;
use std::sync::Arc;

/// Result codes shared by every engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Success,
    /// Resource is still referenced by playback; retry later.
    InUse,
    AlreadyLoaded,
    InvalidFormat,
    /// Engine not initialized or already torn down.
    Unavailable,
    Failed,
}

impl EngineStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Success)
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, EngineStatus::InUse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Success => "success",
            EngineStatus::InUse => "in use",
            EngineStatus::AlreadyLoaded => "already loaded",
            EngineStatus::InvalidFormat => "invalid format",
            EngineStatus::Unavailable => "unavailable",
            EngineStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation for asynchronous engine calls. May fire on any thread.
pub type EngineCallback = Box<dyn FnOnce(EngineStatus) + Send>;

/// Hook the engine fires after freeing internal resources; wakes deferred
/// unloads early.
pub type ResourcesFreedHook = Box<dyn Fn() + Send + Sync>;

/// Bytes handed to the engine for one load.
pub enum EnginePayload<'a> {
    /// Shared mapping. The caller keeps its reference until close; the
    /// engine's own unload releases the engine's claim.
    View(Arc<MediaBuffer>),
    /// The engine must ingest its own copy before the gate call returns;
    /// the caller frees its buffer once the load succeeds.
    Copy(&'a [u8]),
    /// Streamed media: optional resident prefetch window plus total size.
    /// The remainder is served on demand through the stream read path.
    Stream {
        prefetch: Option<Arc<MediaBuffer>>,
        file_size: u64,
    },
}

impl EnginePayload<'_> {
    /// Bytes resident in this payload (prefetch window for streams).
    pub fn resident_len(&self) -> usize {
        match self {
            EnginePayload::View(buf) => buf.len(),
            EnginePayload::Copy(bytes) => bytes.len(),
            EnginePayload::Stream { prefetch, .. } => {
                prefetch.as_ref().map_or(0, |buf| buf.len())
            }
        }
    }
}

impl std::fmt::Debug for EnginePayload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnginePayload::View(buf) => write!(f, "View({} bytes)", buf.len()),
            EnginePayload::Copy(bytes) => write!(f, "Copy({} bytes)", bytes.len()),
            EnginePayload::Stream { file_size, .. } => {
                write!(
                    f,
                    "Stream({} resident of {} bytes)",
                    self.resident_len(),
                    file_size
                )
            }
        }
    }
}

/// Playback-engine surface the file pipeline drives.
///
/// Asynchronous entry points return a synchronous gate status: if the gate is
/// not `Success` the completion callback must never be invoked; if it is, the
/// callback fires exactly once, on an arbitrary thread. `InUse` is only ever
/// reported by the unload entry points.
pub trait SoundEngine: Send + Sync {
    /// Register media bytes for playback. Synchronous.
    fn set_media(&self, key: ResourceKey, payload: EnginePayload<'_>) -> EngineStatus;

    /// Ask the engine to drop a media registration. A gate of `InUse` means
    /// playback still references the bytes; the caller should retry later.
    fn try_unset_media(&self, key: ResourceKey, done: EngineCallback) -> EngineStatus;

    /// Load bank data. Completion may also report post-parse failures.
    fn load_bank(
        &self,
        key: ResourceKey,
        payload: EnginePayload<'_>,
        done: EngineCallback,
    ) -> EngineStatus;

    /// Unload a bank. Gate or completion may report `InUse`.
    fn unload_bank(&self, key: ResourceKey, done: EngineCallback) -> EngineStatus;

    /// Install the resources-freed wake-up hook. Replaces any previous hook.
    fn set_resources_freed_hook(&self, hook: ResourcesFreedHook);

    /// False once the engine is missing or torn down; lifecycle teardown then
    /// degrades to local cleanup instead of blocking.
    fn available(&self) -> bool {
        true
    }
}

/// Stand-in used when no runtime engine is wired (offline tooling, editor
/// batch jobs). Every call reports `Unavailable` and the hook is dropped.
#[derive(Debug, Default)]
pub struct NullSoundEngine;

impl SoundEngine for NullSoundEngine {
    fn set_media(&self, _key: ResourceKey, _payload: EnginePayload<'_>) -> EngineStatus {
        EngineStatus::Unavailable
    }

    fn try_unset_media(&self, _key: ResourceKey, _done: EngineCallback) -> EngineStatus {
        EngineStatus::Unavailable
    }

    fn load_bank(
        &self,
        _key: ResourceKey,
        _payload: EnginePayload<'_>,
        _done: EngineCallback,
    ) -> EngineStatus {
        EngineStatus::Unavailable
    }

    fn unload_bank(&self, _key: ResourceKey, _done: EngineCallback) -> EngineStatus {
        EngineStatus::Unavailable
    }

    fn set_resources_freed_hook(&self, _hook: ResourcesFreedHook) {}

    fn available(&self) -> bool {
        false
    }
}
