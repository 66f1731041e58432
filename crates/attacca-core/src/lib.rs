//! Resource model and collaborator seams for the attacca file pipeline.
//!
//! Everything the lifecycle layer shares with the outside world lives here:
//! catalog descriptors, the sound-engine and file-cache traits, the byte-range
//! read abstraction, and the buffer acquisition policy.
//!
//! # Features
//!
//! - **Resource catalog**: serde-ready descriptors with fluent constructors
//! - **Collaborator traits**: `SoundEngine`, `FileCache`, `ByteSource`, all
//!   injected, all fakeable
//! - **Acquisition policy**: mapped view vs. aligned heap copy vs. device copy
//! - **Filesystem defaults**: `FsByteSource` and `FsFileCache` over a shared
//!   named I/O pool
//!
//! # Example
//!
//! ```ignore
//! use attacca_core::{AcquireMode, ResourceDescriptor};
//!
//! let bank = ResourceDescriptor::bank(42, "music.bnk").aligned(64);
//! assert_eq!(AcquireMode::for_resident(&bank.flags), AcquireMode::MappedCopy);
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

pub mod cache;
pub mod engine;
pub mod memory;
pub mod resource;
pub mod source;

pub use cache::{
    FileCache, FsFileCache, FsStreamHandle, ReadHeuristics, StreamHandle, StreamOpenCallback,
    TransferCallback, TransferRequest,
};
pub use engine::{
    EngineCallback, EnginePayload, EngineStatus, NullSoundEngine, ResourcesFreedHook, SoundEngine,
};
pub use memory::{AcquireMode, AlignedBuf, MediaBuffer, DEFAULT_ALIGNMENT};
pub use resource::{ResourceDescriptor, ResourceId, ResourceKey, ResourceKind, StorageFlags};
pub use source::{
    ByteSource, FsByteSource, IoPool, ReadCallback, ReadOutcome, ReadRequest, UnavailableSource,
};
