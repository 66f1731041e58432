//! Test helpers and fixtures for attacca integration tests.
//!
//! The scripted engine answers each entry point from a queue, completing
//! inline or from a separate thread; the counting source wraps the real
//! filesystem source so tests can assert how many byte-range reads happened.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rand::Rng;

use attacca::{
    AttaccaEngine, ByteSource, DoneCallback, EngineCallback, EnginePayload, EngineStatus,
    FileCache, FsByteSource, FsFileCache, IoPool, ReadCallback, ReadRequest, ResourceKey,
    ResourcesFreedHook, SoundEngine, StatusCallback, StreamOpenCallback,
};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes coordinator logs through the test harness.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Flushes the coordinator twice: once for queued commands, once for the
/// completions those commands enqueued inline.
pub fn settle(engine: &AttaccaEngine) {
    engine.wait_for_completion();
    engine.wait_for_completion();
}

// =============================================================================
// Scripted sound engine
// =============================================================================

/// One scripted answer for an asynchronous engine entry point.
pub enum Reply {
    /// The gate refuses with this status; no completion follows.
    Refuse(EngineStatus),
    /// The gate accepts and the completion fires inline with this status.
    Complete(EngineStatus),
    /// The gate accepts and the completion fires from another thread.
    CompleteAsync(EngineStatus),
}

/// What the engine saw in the last load payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSummary {
    pub kind: &'static str,
    pub resident: Vec<u8>,
    pub file_size: u64,
}

fn summarize(payload: &EnginePayload<'_>) -> PayloadSummary {
    match payload {
        EnginePayload::View(buf) => PayloadSummary {
            kind: "view",
            resident: buf.bytes().to_vec(),
            file_size: 0,
        },
        EnginePayload::Copy(bytes) => PayloadSummary {
            kind: "copy",
            resident: bytes.to_vec(),
            file_size: 0,
        },
        EnginePayload::Stream {
            prefetch,
            file_size,
        } => PayloadSummary {
            kind: "stream",
            resident: prefetch
                .as_ref()
                .map(|buf| buf.bytes().to_vec())
                .unwrap_or_default(),
            file_size: *file_size,
        },
    }
}

fn run_reply(reply: Reply, done: EngineCallback) -> EngineStatus {
    match reply {
        Reply::Refuse(status) => status,
        Reply::Complete(status) => {
            done(status);
            EngineStatus::Success
        }
        Reply::CompleteAsync(status) => {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(2));
                done(status);
            });
            EngineStatus::Success
        }
    }
}

/// Scriptable engine fake. Unscripted calls answer `Success`.
#[derive(Default)]
pub struct RecordingEngine {
    media_replies: Mutex<VecDeque<EngineStatus>>,
    unset_replies: Mutex<VecDeque<Reply>>,
    bank_replies: Mutex<VecDeque<Reply>>,
    unload_bank_replies: Mutex<VecDeque<Reply>>,
    hook: Mutex<Option<ResourcesFreedHook>>,
    last_payload: Mutex<Option<PayloadSummary>>,
    pub set_media_calls: AtomicUsize,
    pub unset_media_calls: AtomicUsize,
    pub load_bank_calls: AtomicUsize,
    pub unload_bank_calls: AtomicUsize,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_set_media(&self, status: EngineStatus) {
        self.media_replies.lock().push_back(status);
    }

    pub fn script_unset_media(&self, reply: Reply) {
        self.unset_replies.lock().push_back(reply);
    }

    pub fn script_load_bank(&self, reply: Reply) {
        self.bank_replies.lock().push_back(reply);
    }

    pub fn script_unload_bank(&self, reply: Reply) {
        self.unload_bank_replies.lock().push_back(reply);
    }

    /// Fires the freed-resources hook the pipeline installed.
    pub fn fire_resources_freed(&self) {
        if let Some(hook) = &*self.hook.lock() {
            hook();
        }
    }

    pub fn last_payload(&self) -> Option<PayloadSummary> {
        self.last_payload.lock().clone()
    }
}

impl SoundEngine for RecordingEngine {
    fn set_media(&self, _key: ResourceKey, payload: EnginePayload<'_>) -> EngineStatus {
        self.set_media_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock() = Some(summarize(&payload));
        let reply = self.media_replies.lock().pop_front();
        reply.unwrap_or(EngineStatus::Success)
    }

    fn try_unset_media(&self, _key: ResourceKey, done: EngineCallback) -> EngineStatus {
        self.unset_media_calls.fetch_add(1, Ordering::SeqCst);
        let reply = { self.unset_replies.lock().pop_front() };
        run_reply(reply.unwrap_or(Reply::Complete(EngineStatus::Success)), done)
    }

    fn load_bank(
        &self,
        _key: ResourceKey,
        payload: EnginePayload<'_>,
        done: EngineCallback,
    ) -> EngineStatus {
        self.load_bank_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock() = Some(summarize(&payload));
        let reply = { self.bank_replies.lock().pop_front() };
        run_reply(reply.unwrap_or(Reply::Complete(EngineStatus::Success)), done)
    }

    fn unload_bank(&self, _key: ResourceKey, done: EngineCallback) -> EngineStatus {
        self.unload_bank_calls.fetch_add(1, Ordering::SeqCst);
        let reply = { self.unload_bank_replies.lock().pop_front() };
        run_reply(reply.unwrap_or(Reply::Complete(EngineStatus::Success)), done)
    }

    fn set_resources_freed_hook(&self, hook: ResourcesFreedHook) {
        *self.hook.lock() = Some(hook);
    }

    fn available(&self) -> bool {
        true
    }
}

// =============================================================================
// Byte sources
// =============================================================================

/// Counts byte-range reads on their way to the real filesystem source.
pub struct CountingSource {
    inner: FsByteSource,
    reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(pool: Arc<IoPool>) -> Self {
        Self {
            inner: FsByteSource::new(pool),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ByteSource for CountingSource {
    fn read(&self, request: ReadRequest, done: ReadCallback) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(request, done);
    }
}

/// Holds every read until the test releases it to the real source.
pub struct GatedSource {
    inner: FsByteSource,
    held: Mutex<Vec<(ReadRequest, ReadCallback)>>,
}

impl GatedSource {
    pub fn new(pool: Arc<IoPool>) -> Self {
        Self {
            inner: FsByteSource::new(pool),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn held(&self) -> usize {
        self.held.lock().len()
    }

    pub fn release_all(&self) {
        let held = { std::mem::take(&mut *self.held.lock()) };
        for (request, done) in held {
            self.inner.read(request, done);
        }
    }
}

impl ByteSource for GatedSource {
    fn read(&self, request: ReadRequest, done: ReadCallback) {
        self.held.lock().push((request, done));
    }
}

/// Counts stream opens on their way to the real filesystem cache.
pub struct CountingCache {
    inner: FsFileCache,
    opens: AtomicUsize,
}

impl CountingCache {
    pub fn new(pool: Arc<IoPool>) -> Self {
        Self {
            inner: FsFileCache::new(pool),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl FileCache for CountingCache {
    fn open(&self, path: &Path, done: StreamOpenCallback) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(path, done);
    }
}

// =============================================================================
// Media fixtures and callback plumbing
// =============================================================================

/// Writes `len` pseudo-random bytes under `dir` and returns them.
pub fn write_media(dir: &Path, name: &str, len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    std::fs::write(dir.join(name), &bytes).unwrap();
    bytes
}

pub fn status_pair() -> (StatusCallback, Receiver<bool>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        Box::new(move |ok| {
            let _ = tx.send(ok);
        }),
        rx,
    )
}

pub fn done_pair() -> (DoneCallback, Receiver<()>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        Box::new(move || {
            let _ = tx.send(());
        }),
        rx,
    )
}

pub fn recv_status(rx: &Receiver<bool>) -> bool {
    rx.recv_timeout(RECV_TIMEOUT).expect("callback never fired")
}

pub fn recv_done(rx: &Receiver<()>) {
    rx.recv_timeout(RECV_TIMEOUT).expect("callback never fired");
}

/// Reads one window of a loaded streamed resource and waits for the bytes.
pub fn read_window(engine: &AttaccaEngine, key: ResourceKey, offset: u64, size: u32) -> Vec<u8> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    engine
        .files()
        .process_read(
            key,
            attacca::ReadHeuristics::default(),
            attacca::TransferRequest { offset, size },
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        )
        .unwrap();
    rx.recv_timeout(RECV_TIMEOUT).unwrap().unwrap()
}
