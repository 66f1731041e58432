//! `AttaccaEngine`: facade wiring the catalog and the file pipeline together.

use std::fmt;
use std::sync::Arc;

use attacca_core::{ResourceDescriptor, ResourceKey};
use attacca_files::{DoneCallback, FileManager, FileMetricsSnapshot, FileState, StatusCallback};

use crate::builder::AttaccaEngineBuilder;

/// Entry point for game code: registers resources, then drives them through
/// the pipeline with one call per direction.
///
/// The chained conveniences (`load_bank`, `prepare_media`) run
/// acquire, open, and load back to back and report a single result; their
/// counterparts run unload, close, and release. Finer control is available
/// through [`files`](AttaccaEngine::files).
///
/// # Example
///
/// ```ignore
/// use attacca::AttaccaEngine;
/// use attacca_core::ResourceDescriptor;
///
/// let engine = AttaccaEngine::builder()
///     .root_path("assets/audio")
///     .build()?;
///
/// engine.register(ResourceDescriptor::bank(1, "music.bnk"));
/// engine.load_bank(1, Box::new(|ok| assert!(ok)));
/// ```
pub struct AttaccaEngine {
    files: Arc<FileManager>,
}

impl AttaccaEngine {
    pub fn builder() -> AttaccaEngineBuilder {
        AttaccaEngineBuilder::default()
    }

    pub(crate) fn from_parts(files: Arc<FileManager>) -> Self {
        Self { files }
    }

    /// Direct access to the file manager for per-operation control.
    pub fn files(&self) -> &Arc<FileManager> {
        &self.files
    }

    /// Makes a resource known to the pipeline.
    pub fn register(&self, desc: ResourceDescriptor) {
        self.files.register(desc);
    }

    pub fn register_all<I>(&self, descs: I)
    where
        I: IntoIterator<Item = ResourceDescriptor>,
    {
        self.files.register_all(descs);
    }

    /// Acquires, opens, and loads a bank. `done` reports whether the bank
    /// reached `Loaded`; on failure the chain releases what it took.
    pub fn load_bank(&self, id: u32, done: StatusCallback) {
        self.load_resource(ResourceKey::bank(id), done);
    }

    /// Unloads, closes, and releases a bank taken by [`load_bank`].
    /// `done` fires once the bank is fully out of the engine.
    pub fn unload_bank(&self, id: u32, done: DoneCallback) {
        self.unload_resource(ResourceKey::bank(id), done);
    }

    /// Same chain as [`load_bank`] for a standalone media file.
    pub fn prepare_media(&self, id: u32, done: StatusCallback) {
        self.load_resource(ResourceKey::media(id), done);
    }

    /// Same chain as [`unload_bank`] for a standalone media file.
    pub fn release_media(&self, id: u32, done: DoneCallback) {
        self.unload_resource(ResourceKey::media(id), done);
    }

    fn load_resource(&self, key: ResourceKey, done: StatusCallback) {
        self.files.acquire(key);
        let files = self.files.clone();
        self.files.open(
            key,
            Box::new(move |opened| {
                if !opened {
                    files.release(key);
                    done(false);
                    return;
                }
                let loading = files.clone();
                files.load(
                    key,
                    Box::new(move |loaded| {
                        if !loaded {
                            // Dropping the reference tears the failed record down.
                            loading.release(key);
                        }
                        done(loaded);
                    }),
                );
            }),
        );
    }

    fn unload_resource(&self, key: ResourceKey, done: DoneCallback) {
        let files = self.files.clone();
        self.files.unload(
            key,
            Box::new(move || {
                let closing = files.clone();
                files.close(
                    key,
                    Box::new(move || {
                        closing.release(key);
                        done();
                    }),
                );
            }),
        );
    }

    /// Last published lifecycle state of a resource.
    pub fn state_of(&self, key: ResourceKey) -> FileState {
        self.files.state_of(key)
    }

    pub fn metrics(&self) -> FileMetricsSnapshot {
        self.files.metrics()
    }

    /// Blocks until the coordinator has handled everything sent so far.
    pub fn wait_for_completion(&self) {
        self.files.wait_for_completion();
    }

    /// Stops the coordinator. Pending opens and loads report failure;
    /// pending unloads and closes complete.
    pub fn shutdown(&self) {
        self.files.shutdown();
    }
}

impl fmt::Debug for AttaccaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttaccaEngine")
            .field("files", &self.files)
            .finish()
    }
}
