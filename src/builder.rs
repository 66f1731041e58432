//! Builder for configuring and constructing an `AttaccaEngine`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use attacca_core::{
    ByteSource, FileCache, FsByteSource, FsFileCache, IoPool, NullSoundEngine, Result, SoundEngine,
};
use attacca_files::{FileManager, FileManagerConfig};

use crate::AttaccaEngine;

/// Collaborators default to the filesystem byte source and stream cache on a
/// shared I/O pool; the sound engine defaults to [`NullSoundEngine`] so
/// offline tooling can run the pipeline without one. Every default can be
/// swapped for an integration-specific implementation.
///
/// # Example
///
/// ```ignore
/// use attacca::AttaccaEngine;
///
/// let engine = AttaccaEngine::builder()
///     .root_path("assets/audio")
///     .io_threads(4)
///     .sound_engine(my_engine)
///     .build()?;
/// ```
pub struct AttaccaEngineBuilder {
    config: FileManagerConfig,
    engine: Option<Arc<dyn SoundEngine>>,
    cache: Option<Arc<dyn FileCache>>,
    source: Option<Arc<dyn ByteSource>>,
}

impl Default for AttaccaEngineBuilder {
    fn default() -> Self {
        Self {
            config: FileManagerConfig::default(),
            engine: None,
            cache: None,
            source: None,
        }
    }
}

impl AttaccaEngineBuilder {
    /// The sound engine that receives loaded media and banks.
    pub fn sound_engine(mut self, engine: Arc<dyn SoundEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// The cache that opens stream handles for streamed resources.
    pub fn file_cache(mut self, cache: Arc<dyn FileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The source that serves resident buffers and prefetch windows.
    pub fn byte_source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Base directory that resource paths resolve under. Default: `.`
    pub fn root_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root_path = root.into();
        self
    }

    /// Threads in the default I/O pool. Ignored when both the byte source
    /// and the file cache are custom. Default: 2
    pub fn io_threads(mut self, threads: usize) -> Self {
        self.config.io_threads = threads;
        self
    }

    /// How often parked unloads are retried. Default: 20ms
    pub fn retry_tick(mut self, tick: Duration) -> Self {
        self.config.retry_tick = tick;
        self
    }

    /// Retries before an in-use unload is forced through. 0 retries forever.
    /// Default: 256
    pub fn max_unload_retries(mut self, retries: u32) -> Self {
        self.config.max_unload_retries = retries;
        self
    }

    /// Replaces the whole configuration at once.
    pub fn config(mut self, config: FileManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AttaccaEngine> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                tracing::debug!("No sound engine wired, loads will be refused");
                Arc::new(NullSoundEngine)
            }
        };

        let (cache, source) = match (self.cache, self.source) {
            (Some(cache), Some(source)) => (cache, source),
            (cache, source) => {
                // Only build the pool when a filesystem default is needed.
                let pool = Arc::new(IoPool::new(self.config.io_threads)?);
                let cache: Arc<dyn FileCache> = match cache {
                    Some(cache) => cache,
                    None => Arc::new(FsFileCache::new(pool.clone())),
                };
                let source: Arc<dyn ByteSource> = match source {
                    Some(source) => source,
                    None => Arc::new(FsByteSource::new(pool)),
                };
                (cache, source)
            }
        };

        let files = FileManager::spawn(self.config, engine, cache, source)?;
        Ok(AttaccaEngine::from_parts(Arc::new(files)))
    }
}
