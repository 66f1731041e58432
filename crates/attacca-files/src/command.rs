//! Command types for coordinator thread communication.

use std::path::PathBuf;
use std::sync::Arc;

use attacca_core::{EngineStatus, ReadOutcome, ResourceKey, Result, StreamHandle};

use crate::waiters::{DoneCallback, StatusCallback};

/// Command sent to the coordinator thread
pub(crate) enum FileCommand {
    /// Take a reference on a registered resource
    Acquire {
        /// Resource to reference
        key: ResourceKey,
    },
    /// Drop a reference; the last drop tears the record down
    Release {
        /// Resource to dereference
        key: ResourceKey,
    },

    /// Open a resource and bring its resident bytes in
    Open {
        /// Resource to open
        key: ResourceKey,
        /// Base directory override for this open
        root: Option<PathBuf>,
        /// Invoked once with the open result
        done: StatusCallback,
    },
    /// Hand an opened resource to the sound engine
    Load {
        /// Resource to load
        key: ResourceKey,
        /// Invoked once with the load result
        done: StatusCallback,
    },
    /// Take a loaded resource back from the sound engine
    Unload {
        /// Resource to unload
        key: ResourceKey,
        /// Invoked once when the unload lands
        done: DoneCallback,
    },
    /// Close a resource and release everything it holds
    Close {
        /// Resource to close
        key: ResourceKey,
        /// Invoked once when the record is closed
        done: DoneCallback,
    },

    /// A byte source request finished
    ReadComplete {
        /// Resource the read belongs to
        key: ResourceKey,
        /// Bytes and size, or the I/O error
        outcome: Result<ReadOutcome>,
    },
    /// A streamed cache open finished
    StreamReady {
        /// Resource the handle belongs to
        key: ResourceKey,
        /// Open handle, or the cache error
        result: Result<Arc<dyn StreamHandle>>,
    },
    /// The engine finished ingesting a bank
    BankLoaded {
        /// Bank the completion belongs to
        key: ResourceKey,
        /// Engine verdict
        status: EngineStatus,
    },
    /// The engine answered an unload request
    UnloadResolved {
        /// Resource the answer belongs to
        key: ResourceKey,
        /// Engine verdict; busy answers park a retry
        status: EngineStatus,
    },
    /// The engine freed resources; retry parked unloads now
    ResourcesFreed,

    /// Signal once every command sent before this one has been handled
    Barrier {
        /// Invoked once the queue ahead is drained
        done: DoneCallback,
    },
    /// Shutdown the coordinator thread
    Shutdown,
}

impl std::fmt::Debug for FileCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileCommand::Acquire { key } => f.debug_struct("Acquire").field("key", key).finish(),
            FileCommand::Release { key } => f.debug_struct("Release").field("key", key).finish(),

            FileCommand::Open { key, root, .. } => f
                .debug_struct("Open")
                .field("key", key)
                .field("root", root)
                .finish(),
            FileCommand::Load { key, .. } => f.debug_struct("Load").field("key", key).finish(),
            FileCommand::Unload { key, .. } => f.debug_struct("Unload").field("key", key).finish(),
            FileCommand::Close { key, .. } => f.debug_struct("Close").field("key", key).finish(),

            FileCommand::ReadComplete { key, outcome } => f
                .debug_struct("ReadComplete")
                .field("key", key)
                .field("ok", &outcome.is_ok())
                .finish(),
            FileCommand::StreamReady { key, result } => f
                .debug_struct("StreamReady")
                .field("key", key)
                .field("ok", &result.is_ok())
                .finish(),
            FileCommand::BankLoaded { key, status } => f
                .debug_struct("BankLoaded")
                .field("key", key)
                .field("status", status)
                .finish(),
            FileCommand::UnloadResolved { key, status } => f
                .debug_struct("UnloadResolved")
                .field("key", key)
                .field("status", status)
                .finish(),
            FileCommand::ResourcesFreed => write!(f, "ResourcesFreed"),

            FileCommand::Barrier { .. } => write!(f, "Barrier"),
            FileCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
