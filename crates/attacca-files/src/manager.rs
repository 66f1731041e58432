//! Thread-safe handle over the file coordinator.
//!
//! `FileManager` is the crate's public face: callers register resources,
//! issue lifecycle operations from any thread, and read published state
//! without blocking. Every operation becomes a [`FileCommand`] handled on
//! the coordinator thread; callbacks fire there (or on an engine thread)
//! exactly once per request.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;

use attacca_core::{
    ByteSource, Error, FileCache, ReadHeuristics, ResourceDescriptor, ResourceKey, Result,
    SoundEngine, TransferCallback, TransferRequest,
};

use crate::command::FileCommand;
use crate::config::FileManagerConfig;
use crate::metrics::{FileMetrics, FileMetricsSnapshot};
use crate::registry::Registry;
use crate::slot::FileSlot;
use crate::state::FileState;
use crate::waiters::{DoneCallback, StatusCallback};
use crate::worker::FileWorker;

/// Coordinates open/load/unload/close for every registered resource.
pub struct FileManager {
    tx: Sender<FileCommand>,
    catalog: Arc<DashMap<ResourceKey, Arc<ResourceDescriptor>>>,
    slots: Arc<DashMap<ResourceKey, Arc<FileSlot>>>,
    metrics: Arc<FileMetrics>,
    worker: Mutex<FileWorker>,
}

impl FileManager {
    /// Starts the coordinator thread and hooks the engine's resource-freed
    /// signal up to the deferred-unload retry sweep.
    pub fn spawn(
        config: FileManagerConfig,
        engine: Arc<dyn SoundEngine>,
        cache: Arc<dyn FileCache>,
        source: Arc<dyn ByteSource>,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let catalog = Arc::new(DashMap::new());
        let slots = Arc::new(DashMap::new());
        let metrics = Arc::new(FileMetrics::new());

        let hook_tx = tx.clone();
        engine.set_resources_freed_hook(Box::new(move || {
            let _ = hook_tx.send(FileCommand::ResourcesFreed);
        }));

        let tick = config.retry_tick;
        let registry = Registry::new(
            config,
            engine,
            cache,
            source,
            catalog.clone(),
            slots.clone(),
            metrics.clone(),
            tx.clone(),
        );
        let worker = FileWorker::spawn(registry, rx, tx.clone(), tick)?;

        Ok(Self {
            tx,
            catalog,
            slots,
            metrics,
            worker: Mutex::new(worker),
        })
    }

    /// Makes a resource known to the coordinator. Operations on unregistered
    /// keys fail their callbacks.
    pub fn register(&self, desc: ResourceDescriptor) {
        self.catalog.insert(desc.key(), Arc::new(desc));
    }

    pub fn register_all<I>(&self, descs: I)
    where
        I: IntoIterator<Item = ResourceDescriptor>,
    {
        for desc in descs {
            self.register(desc);
        }
    }

    pub fn descriptor(&self, key: ResourceKey) -> Option<Arc<ResourceDescriptor>> {
        self.catalog.get(&key).map(|desc| desc.value().clone())
    }

    /// Takes a reference on the record so it outlives individual operations.
    pub fn acquire(&self, key: ResourceKey) {
        self.send(FileCommand::Acquire { key });
    }

    /// Drops a reference. The last release closes and retires the record.
    pub fn release(&self, key: ResourceKey) {
        self.send(FileCommand::Release { key });
    }

    /// Opens a resource under the configured root path. `done` reports
    /// whether the resource reached `Opened`.
    pub fn open(&self, key: ResourceKey, done: StatusCallback) {
        self.send(FileCommand::Open {
            key,
            root: None,
            done,
        });
    }

    /// Opens a resource under an explicit root instead of the configured one.
    pub fn open_from(&self, key: ResourceKey, root: PathBuf, done: StatusCallback) {
        self.send(FileCommand::Open {
            key,
            root: Some(root),
            done,
        });
    }

    /// Hands the opened resource to the sound engine.
    pub fn load(&self, key: ResourceKey, done: StatusCallback) {
        self.send(FileCommand::Load { key, done });
    }

    /// Takes the resource back from the engine. While the engine still plays
    /// from it the unload parks and retries; `done` fires once it lands.
    pub fn unload(&self, key: ResourceKey, done: DoneCallback) {
        self.send(FileCommand::Unload { key, done });
    }

    /// Releases everything the record holds. Safe in any state; an in-flight
    /// operation finishes first and the close picks up from its outcome.
    pub fn close(&self, key: ResourceKey, done: DoneCallback) {
        self.send(FileCommand::Close { key, done });
    }

    /// Reads a window of a streamed resource, bypassing the coordinator.
    /// Valid only while the resource is `Loaded`.
    pub fn process_read(
        &self,
        key: ResourceKey,
        heuristics: ReadHeuristics,
        transfer: TransferRequest,
        done: TransferCallback,
    ) -> Result<()> {
        let slot = self
            .slots
            .get(&key)
            .map(|slot| slot.value().clone())
            .ok_or(Error::UnknownResource(key))?;
        let desc = self
            .catalog
            .get(&key)
            .map(|desc| desc.value().clone())
            .ok_or(Error::UnknownResource(key))?;
        if !desc.is_streamed() {
            return Err(Error::InvalidState {
                op: "process_read",
                state: "resident",
            });
        }
        let state = slot.state();
        if state != FileState::Loaded {
            return Err(Error::InvalidState {
                op: "process_read",
                state: state.name(),
            });
        }
        let Some(binding) = slot.binding() else {
            // Loaded was observed just before an unload unpublished it.
            tracing::debug!("{}: stream binding gone, read refused", key);
            return Err(Error::Unavailable("stream"));
        };
        let metrics = self.metrics.clone();
        binding.handle.read(
            heuristics,
            transfer,
            Box::new(move |result| {
                if let Ok(bytes) = &result {
                    metrics.record_stream_read(bytes.len() as u64);
                }
                done(result);
            }),
        );
        Ok(())
    }

    /// Last published lifecycle state. `Unknown` when no record exists.
    pub fn state_of(&self, key: ResourceKey) -> FileState {
        self.slots
            .get(&key)
            .map(|slot| slot.value().state())
            .unwrap_or(FileState::Unknown)
    }

    pub fn metrics(&self) -> FileMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Blocks until every command sent before this call has been handled.
    pub fn wait_for_completion(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.send(FileCommand::Barrier {
            done: Box::new(move || {
                let _ = done_tx.send(());
            }),
        });
        let _ = done_rx.recv();
    }

    /// Drains every record and joins the coordinator thread. Pending opens
    /// and loads report failure; pending unloads and closes complete.
    pub fn shutdown(&self) {
        self.worker.lock().stop();
    }

    fn send(&self, cmd: FileCommand) {
        if let Err(err) = self.tx.send(cmd) {
            tracing::warn!("coordinator gone, failing {:?}", err.0);
            fail_command(err.0);
        }
    }
}

impl fmt::Debug for FileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileManager")
            .field("registered", &self.catalog.len())
            .field("active", &self.slots.len())
            .finish()
    }
}

/// Completes a command's callback when the coordinator can no longer run it.
fn fail_command(cmd: FileCommand) {
    match cmd {
        FileCommand::Open { done, .. } | FileCommand::Load { done, .. } => done(false),
        FileCommand::Unload { done, .. }
        | FileCommand::Close { done, .. }
        | FileCommand::Barrier { done } => done(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attacca_core::{NullSoundEngine, StreamOpenCallback, UnavailableSource};
    use std::path::Path;
    use std::time::Duration;

    struct NoCache;

    impl FileCache for NoCache {
        fn open(&self, _path: &Path, done: StreamOpenCallback) {
            done(Err(Error::Unavailable("cache")));
        }
    }

    fn manager() -> FileManager {
        FileManager::spawn(
            FileManagerConfig::default(),
            Arc::new(NullSoundEngine),
            Arc::new(NoCache),
            Arc::new(UnavailableSource),
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_query() {
        let mgr = manager();
        let key = ResourceKey::media(9);
        assert!(mgr.descriptor(key).is_none());
        mgr.register(ResourceDescriptor::media(9, "nine.wav"));
        assert!(mgr.descriptor(key).is_some());
        assert_eq!(mgr.state_of(key), FileState::Unknown);
        mgr.shutdown();
    }

    #[test]
    fn test_open_reports_failure_when_source_is_unavailable() {
        let mgr = manager();
        mgr.register(ResourceDescriptor::media(3, "three.wav"));
        let key = ResourceKey::media(3);

        let (ok_tx, ok_rx) = crossbeam_channel::bounded(1);
        mgr.open(
            key,
            Box::new(move |ok| {
                let _ = ok_tx.send(ok);
            }),
        );
        assert!(!ok_rx.recv_timeout(Duration::from_secs(5)).unwrap());
        mgr.wait_for_completion();
        assert_eq!(mgr.state_of(key), FileState::OpenFailed);
        assert_eq!(mgr.metrics().open_failures, 1);
        mgr.shutdown();
    }

    #[test]
    fn test_process_read_gates() {
        let mgr = manager();
        mgr.register(ResourceDescriptor::media(5, "five.wav").streamed(64));
        let key = ResourceKey::media(5);
        let window = TransferRequest { offset: 0, size: 16 };

        // No record yet.
        let err = mgr
            .process_read(key, ReadHeuristics::default(), window, Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownResource(_)));

        // Record exists but was never loaded.
        mgr.acquire(key);
        mgr.wait_for_completion();
        let err = mgr
            .process_read(key, ReadHeuristics::default(), window, Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                op: "process_read",
                ..
            }
        ));

        mgr.release(key);
        mgr.shutdown();
    }

    #[test]
    fn test_callbacks_complete_after_shutdown() {
        let mgr = manager();
        mgr.register(ResourceDescriptor::media(8, "eight.wav"));
        mgr.shutdown();

        let (ok_tx, ok_rx) = crossbeam_channel::bounded(1);
        mgr.open(
            ResourceKey::media(8),
            Box::new(move |ok| {
                let _ = ok_tx.send(ok);
            }),
        );
        assert!(!ok_rx.recv_timeout(Duration::from_secs(1)).unwrap());
        // The barrier must not hang either.
        mgr.wait_for_completion();
    }
}
