//! Streaming file handles behind the engine's file cache.
//!
//! Streamed resources keep a persistent handle open from load to close;
//! demand reads flow through it with the engine's scheduling heuristics.

use crate::error::{Error, Result};
use crate::source::IoPool;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Scheduling hints forwarded from the engine's streaming device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadHeuristics {
    /// Milliseconds until the data is needed.
    pub deadline_ms: f32,
    pub priority: i8,
}

impl Default for ReadHeuristics {
    fn default() -> Self {
        Self {
            deadline_ms: 0.0,
            priority: 0,
        }
    }
}

/// One transfer window within an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub offset: u64,
    pub size: u32,
}

pub type TransferCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;
pub type StreamOpenCallback = Box<dyn FnOnce(Result<Arc<dyn StreamHandle>>) + Send>;

/// An open stream. Reads complete on arbitrary threads; a read past end of
/// file reports a truncated buffer, not an error.
pub trait StreamHandle: Send + Sync {
    fn file_size(&self) -> u64;

    fn read(&self, heuristics: ReadHeuristics, transfer: TransferRequest, done: TransferCallback);

    /// Idempotent; in-flight reads after close fail with `Unavailable`.
    fn close(&self);
}

/// Opens persistent streaming handles.
pub trait FileCache: Send + Sync {
    fn open(&self, path: &Path, done: StreamOpenCallback);
}

/// Local-filesystem cache used when the engine's own streaming device is not
/// wired in.
pub struct FsFileCache {
    pool: Arc<IoPool>,
}

impl FsFileCache {
    pub fn new(pool: Arc<IoPool>) -> Self {
        Self { pool }
    }
}

impl FileCache for FsFileCache {
    fn open(&self, path: &Path, done: StreamOpenCallback) {
        let pool = self.pool.clone();
        let path: PathBuf = path.to_path_buf();
        self.pool.spawn(move || done(open_stream(pool, &path)));
    }
}

fn open_stream(pool: Arc<IoPool>, path: &Path) -> Result<Arc<dyn StreamHandle>> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    Ok(Arc::new(FsStreamHandle {
        file: Arc::new(Mutex::new(Some(file))),
        size,
        pool,
    }))
}

/// Seek-and-read stream over one open [`File`]. Transfers on a single handle
/// are serialized by the file lock.
pub struct FsStreamHandle {
    file: Arc<Mutex<Option<File>>>,
    size: u64,
    pool: Arc<IoPool>,
}

impl StreamHandle for FsStreamHandle {
    fn file_size(&self) -> u64 {
        self.size
    }

    fn read(&self, _heuristics: ReadHeuristics, transfer: TransferRequest, done: TransferCallback) {
        let file = self.file.clone();
        self.pool.spawn(move || done(read_window(&file, transfer)));
    }

    fn close(&self) {
        self.file.lock().take();
    }
}

fn read_window(file: &Mutex<Option<File>>, transfer: TransferRequest) -> Result<Vec<u8>> {
    let mut guard = file.lock();
    let file = guard.as_mut().ok_or(Error::Unavailable("stream"))?;
    file.seek(SeekFrom::Start(transfer.offset))?;
    let mut data = vec![0u8; transfer.size as usize];
    let mut filled = 0;
    while filled < data.len() {
        match file.read(&mut data[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    data.truncate(filled);
    Ok(data)
}
