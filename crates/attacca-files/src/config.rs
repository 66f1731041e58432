//! File coordinator configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the file coordinator thread and its I/O parameters.
#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    /// Base directory resolved against descriptor paths (default: ".")
    pub root_path: PathBuf,
    /// Worker threads for byte source and cache I/O (default: 2)
    pub io_threads: usize,
    /// Coordinator wakeup interval; parked unload retries run on this tick
    /// even if the engine never signals (default: 20ms)
    pub retry_tick: Duration,
    /// Busy answers tolerated per unload before the unload is forced to
    /// complete (default: 256, 0 = unlimited)
    pub max_unload_retries: u32,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            io_threads: 2,
            retry_tick: Duration::from_millis(20),
            max_unload_retries: 256,
        }
    }
}

impl FileManagerConfig {
    /// Create config with a custom base directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
            ..Default::default()
        }
    }
}
