//! # Attacca - Game-Audio File Pipeline
//!
//! Streaming file-state management for sound-engine middleware.
//!
//! ## Architecture
//!
//! Attacca is an umbrella crate that coordinates:
//! - **attacca-core** - Resource model, collaborator traits, buffer
//!   acquisition, filesystem byte source and stream cache
//! - **attacca-files** - Lifecycle state machine, coordinator thread,
//!   deferred-unload retries, metrics
//!
//! Every registered resource (a media file or a soundbank, resident or
//! streamed) moves through one state machine: open stages bytes, load hands
//! them to the sound engine, unload takes them back, close tears down. All
//! transitions happen on a single coordinator thread; callers observe
//! published state lock-free and get exactly one callback per operation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use attacca::prelude::*;
//!
//! let engine = AttaccaEngine::builder()
//!     .root_path("assets/audio")
//!     .sound_engine(my_engine)
//!     .build()?;
//!
//! engine.register_all([
//!     ResourceDescriptor::bank(1, "music.bnk"),
//!     ResourceDescriptor::media(7, "ambience.wem").streamed(256 * 1024),
//! ]);
//!
//! engine.load_bank(1, Box::new(|ok| assert!(ok)));
//! ```

/// Re-export of attacca-core for direct access
pub use attacca_core as core;

/// Re-export of attacca-files for direct access
pub use attacca_files as files;

// Resource model
pub use attacca_core::{
    AcquireMode,
    AlignedBuf,

    // Collaborator traits
    ByteSource,
    EngineCallback,
    EnginePayload,
    EngineStatus,

    // Error
    Error,
    FileCache,

    // Filesystem collaborators
    FsByteSource,
    FsFileCache,
    IoPool,
    MediaBuffer,
    NullSoundEngine,
    ReadCallback,
    ReadHeuristics,
    ReadOutcome,
    ReadRequest,
    ResourceDescriptor,
    ResourceId,
    ResourceKey,
    ResourceKind,
    ResourcesFreedHook,
    Result,
    SoundEngine,
    StorageFlags,
    StreamHandle,
    StreamOpenCallback,
    TransferCallback,
    TransferRequest,
    UnavailableSource,
};

// File pipeline
pub use attacca_files::{
    DoneCallback, FileManager, FileManagerConfig, FileMetricsSnapshot, FileState, StatusCallback,
};

mod builder;
mod engine;

pub use builder::AttaccaEngineBuilder;
pub use engine::AttaccaEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{AttaccaEngine, AttaccaEngineBuilder};

    // Essential types
    pub use crate::core::{
        EngineStatus, ResourceDescriptor, ResourceKey, ResourceKind, StorageFlags,
    };

    // File pipeline
    pub use crate::files::{FileManager, FileManagerConfig, FileState};
}
