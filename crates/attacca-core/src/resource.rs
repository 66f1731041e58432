//! Resource identity and catalog descriptors.
//!
//! Descriptors are created once when a catalog is registered and are never
//! mutated afterwards; the lifecycle layer shares them by `Arc`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque 32-bit resource handle. Unique within its kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the bytes mean to the sound engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Loose media: one encoded sound.
    Media,
    /// Sound bank: event/structure data, possibly with embedded media blobs.
    Bank,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Media => "media",
            ResourceKind::Bank => "bank",
        }
    }
}

/// Registry key. IDs collide across kinds, so the kind is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

impl ResourceKey {
    pub fn media(id: u32) -> Self {
        Self {
            kind: ResourceKind::Media,
            id: ResourceId(id),
        }
    }

    pub fn bank(id: u32) -> Self {
        Self {
            kind: ResourceKind::Bank,
            id: ResourceId(id),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// How a resource's bytes are stored and handed to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFlags {
    /// Engine requires the buffer in device-addressable memory.
    #[serde(default)]
    pub device_memory: bool,
    /// Required buffer alignment in bytes. 0 means the engine default.
    #[serde(default)]
    pub alignment: u32,
    /// Stream from disk instead of loading fully resident.
    #[serde(default)]
    pub streaming: bool,
    /// Bank carries embedded media released individually by the engine.
    #[serde(default)]
    pub embedded_media: bool,
}

/// Immutable catalog entry describing one loadable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: ResourceKind,
    /// Path relative to the manager's root directory.
    pub path: PathBuf,
    #[serde(default)]
    pub flags: StorageFlags,
    /// Bytes read eagerly at open for streamed resources. Zero skips the read.
    #[serde(default)]
    pub prefetch_size: u32,
}

impl ResourceDescriptor {
    pub fn media(id: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            id: ResourceId(id),
            kind: ResourceKind::Media,
            path: path.into(),
            flags: StorageFlags::default(),
            prefetch_size: 0,
        }
    }

    pub fn bank(id: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            id: ResourceId(id),
            kind: ResourceKind::Bank,
            path: path.into(),
            flags: StorageFlags::default(),
            prefetch_size: 0,
        }
    }

    /// Stream from disk, keeping `prefetch_size` bytes resident.
    pub fn streamed(mut self, prefetch_size: u32) -> Self {
        self.flags.streaming = true;
        self.prefetch_size = prefetch_size;
        self
    }

    pub fn device_memory(mut self) -> Self {
        self.flags.device_memory = true;
        self
    }

    /// `alignment` must be a power of two; validated when bytes are acquired.
    pub fn aligned(mut self, alignment: u32) -> Self {
        self.flags.alignment = alignment;
        self
    }

    pub fn with_embedded_media(mut self) -> Self {
        self.flags.embedded_media = true;
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            kind: self.kind,
            id: self.id,
        }
    }

    pub fn is_streamed(&self) -> bool {
        self.flags.streaming
    }
}
