//! File lifecycle coordination for the attacca pipeline.
//!
//! Tracks every registered resource through open, load, unload, and close,
//! coordinating the byte source, the stream cache, and the sound engine from
//! a single thread.
//!
//! # Features
//!
//! - **Lifecycle state machine**: one record per resource, transitions only
//!   on the coordinator thread, published lock-free for readers
//! - **Deferred unloads**: an engine that answers busy parks the request and
//!   the coordinator retries until it lands
//! - **Streamed and resident storage**: prefetch windows, stream handles
//!   reused across load cycles, resident buffers handed off by view or copy
//! - **Request coalescing**: refcounted records merge concurrent operations
//!   and queue their callbacks in arrival order
//!
//! # Example
//!
//! ```ignore
//! use attacca_files::{FileManager, FileManagerConfig};
//! use attacca_core::{ResourceDescriptor, ResourceKey};
//!
//! let files = FileManager::spawn(config, engine, cache, source)?;
//! files.register(ResourceDescriptor::media(42, "boom.wav"));
//!
//! let key = ResourceKey::media(42);
//! files.open(key, Box::new(|ok| assert!(ok)));
//! files.load(key, Box::new(|ok| assert!(ok)));
//! ```

// Error types shared with the rest of the pipeline
pub use attacca_core::{Error, Result};

// Main API
mod manager;
pub use manager::FileManager;

mod config;
pub use config::FileManagerConfig;

mod metrics;
pub use metrics::{FileMetrics, FileMetricsSnapshot};

mod state;
pub use state::FileState;

mod waiters;
pub use waiters::{DoneCallback, StatusCallback};

// Coordinator internals
mod command;
mod entry;
mod registry;
mod retry;
mod slot;
mod worker;
