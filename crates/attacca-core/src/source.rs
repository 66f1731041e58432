//! Asynchronous byte-range reads.
//!
//! Open-time acquisition goes through [`ByteSource`]: whole files for
//! resident resources, prefetch prefixes for streamed ones. Completions run
//! on pool threads; callers marshal them wherever they need.

use crate::error::{Error, Result};
use crate::memory::{AcquireMode, AlignedBuf, MediaBuffer, DEFAULT_ALIGNMENT};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use thread_priority::ThreadPriority;

/// One read: the whole file, or a prefetch-sized prefix.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub path: PathBuf,
    pub mode: AcquireMode,
    /// Required alignment for heap copies. 0 uses [`DEFAULT_ALIGNMENT`].
    pub alignment: u32,
    /// `Some(n)` reads at most the first `n` bytes.
    pub prefetch: Option<u64>,
}

/// Successful read product.
#[derive(Debug)]
pub struct ReadOutcome {
    /// Acquired bytes. `None` for an empty file or zero-length request.
    pub buffer: Option<Arc<MediaBuffer>>,
    /// Total size of the underlying file, independent of how much was read.
    pub file_size: u64,
}

pub type ReadCallback = Box<dyn FnOnce(Result<ReadOutcome>) + Send>;

/// Byte-range source. Completions may arrive on any thread.
pub trait ByteSource: Send + Sync {
    fn read(&self, request: ReadRequest, done: ReadCallback);
}

/// Named worker pool shared by the filesystem collaborators.
pub struct IoPool {
    pool: rayon::ThreadPool,
}

impl IoPool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("attacca-io-{i}"))
            .start_handler(|_| {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
            })
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for IoPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoPool")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Reads straight from the local filesystem.
pub struct FsByteSource {
    pool: Arc<IoPool>,
}

impl FsByteSource {
    pub fn new(pool: Arc<IoPool>) -> Self {
        Self { pool }
    }
}

impl ByteSource for FsByteSource {
    fn read(&self, request: ReadRequest, done: ReadCallback) {
        self.pool.spawn(move || done(execute_read(&request)));
    }
}

fn execute_read(request: &ReadRequest) -> Result<ReadOutcome> {
    let mut file = File::open(&request.path)?;
    let file_size = file.metadata()?.len();
    let wanted = match request.prefetch {
        Some(n) => n.min(file_size),
        None => file_size,
    };
    if wanted == 0 {
        return Ok(ReadOutcome {
            buffer: None,
            file_size,
        });
    }
    let alignment = if request.alignment == 0 {
        DEFAULT_ALIGNMENT
    } else {
        request.alignment as usize
    };
    let partial = request.prefetch.is_some() && wanted < file_size;
    let buffer = match request.mode {
        AcquireMode::MappedView if !partial => {
            // Media files are immutable once shipped, so the read-only
            // mapping stays valid for the lifetime of the view.
            let map = unsafe { Mmap::map(&file)? };
            MediaBuffer::Mapped(map)
        }
        AcquireMode::MappedCopy if !partial => {
            let map = unsafe { Mmap::map(&file)? };
            MediaBuffer::Heap(AlignedBuf::from_slice(&map, alignment)?)
        }
        AcquireMode::HeapCopyDevice => {
            MediaBuffer::Device(read_prefix(&mut file, wanted as usize, alignment)?)
        }
        // Partial requests never map; a prefix view would pin the whole file.
        _ => MediaBuffer::Heap(read_prefix(&mut file, wanted as usize, alignment)?),
    };
    Ok(ReadOutcome {
        buffer: Some(Arc::new(buffer)),
        file_size,
    })
}

fn read_prefix(file: &mut File, len: usize, alignment: usize) -> Result<AlignedBuf> {
    let mut buf = AlignedBuf::zeroed(len, alignment)?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Byte source that always fails; models the engine's I/O layer being offline.
#[derive(Debug, Default)]
pub struct UnavailableSource;

impl ByteSource for UnavailableSource {
    fn read(&self, request: ReadRequest, done: ReadCallback) {
        tracing::warn!("Byte source offline, refusing {}", request.path.display());
        done(Err(Error::Unavailable("byte source")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn pool() -> Arc<IoPool> {
        Arc::new(IoPool::new(2).unwrap())
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&bytes)
            .unwrap();
        path
    }

    fn read_blocking(source: &dyn ByteSource, request: ReadRequest) -> Result<ReadOutcome> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        source.read(
            request,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_full_read_heap() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.bnk", 1024);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::HeapCopy,
                alignment: 0,
                prefetch: None,
            },
        )
        .unwrap();
        assert_eq!(out.file_size, 1024);
        let buf = out.buffer.unwrap();
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.bytes()[10], 10);
        assert!(!buf.is_view());
    }

    #[test]
    fn test_full_read_mapped_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.wem", 512);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::MappedView,
                alignment: 0,
                prefetch: None,
            },
        )
        .unwrap();
        let buf = out.buffer.unwrap();
        assert!(buf.is_view());
        assert_eq!(buf.len(), 512);
        assert_eq!(buf.bytes()[7], 7);
    }

    #[test]
    fn test_mapped_copy_honors_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.bnk", 200);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::MappedCopy,
                alignment: 4096,
                prefetch: None,
            },
        )
        .unwrap();
        let buf = out.buffer.unwrap();
        assert!(!buf.is_view());
        assert_eq!(buf.bytes().as_ptr() as usize % 4096, 0);
    }

    #[test]
    fn test_prefetch_reads_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "s.wem", 4096);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::HeapCopy,
                alignment: 0,
                prefetch: Some(256),
            },
        )
        .unwrap();
        assert_eq!(out.file_size, 4096);
        let buf = out.buffer.unwrap();
        assert_eq!(buf.len(), 256);
        assert_eq!(buf.bytes()[255], 255 % 251);
    }

    #[test]
    fn test_prefetch_clamped_to_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "tiny.wem", 64);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::HeapCopy,
                alignment: 0,
                prefetch: Some(1024),
            },
        )
        .unwrap();
        assert_eq!(out.buffer.unwrap().len(), 64);
    }

    #[test]
    fn test_empty_file_yields_no_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.bnk", 0);
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path,
                mode: AcquireMode::MappedView,
                alignment: 0,
                prefetch: None,
            },
        )
        .unwrap();
        assert!(out.buffer.is_none());
        assert_eq!(out.file_size, 0);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsByteSource::new(pool());
        let out = read_blocking(
            &source,
            ReadRequest {
                path: dir.path().join("nope.bnk"),
                mode: AcquireMode::HeapCopy,
                alignment: 0,
                prefetch: None,
            },
        );
        assert!(matches!(out, Err(Error::Io(_))));
    }

    #[test]
    fn test_unavailable_source_refuses() {
        let source = UnavailableSource;
        let out = read_blocking(
            &source,
            ReadRequest {
                path: PathBuf::from("any.bnk"),
                mode: AcquireMode::HeapCopy,
                alignment: 0,
                prefetch: Some(256),
            },
        );
        assert!(matches!(out, Err(Error::Unavailable(_))));
    }

    #[test]
    fn test_pool_counts_threads() {
        assert_eq!(pool().threads(), 2);
        assert_eq!(IoPool::new(0).unwrap().threads(), 1);
    }
}
