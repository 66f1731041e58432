//! Error types for the attacca file pipeline.

use crate::engine::EngineStatus;
use crate::resource::ResourceKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sound-engine call returned a non-success status.
    #[error("engine error: {0}")]
    Engine(EngineStatus),

    /// A collaborator is not wired up or has shut down.
    #[error("{0} unavailable")]
    Unavailable(&'static str),

    /// Buffer alignment must be a power of two.
    #[error("invalid alignment: {0}")]
    InvalidAlignment(u32),

    /// Resource is not registered in the catalog.
    #[error("unknown resource {0}")]
    UnknownResource(ResourceKey),

    /// Operation issued in a state that does not permit it.
    #[error("{op} invalid while {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// I/O worker pool could not be built.
    #[error("pool error: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
