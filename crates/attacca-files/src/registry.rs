//! Lifecycle driver for every registered resource.
//!
//! All handlers run on the coordinator thread, one command at a time, so a
//! single file never sees two operations racing. Collaborator completions
//! come back through the command channel and re-enter here in order.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;
use dashmap::DashMap;

use attacca_core::{
    ByteSource, EngineCallback, EnginePayload, EngineStatus, FileCache, ReadOutcome, ReadRequest,
    ResourceDescriptor, ResourceKey, ResourceKind, Result, SoundEngine, StreamHandle,
};

use crate::command::FileCommand;
use crate::config::FileManagerConfig;
use crate::entry::FileEntry;
use crate::metrics::FileMetrics;
use crate::retry::RetryQueue;
use crate::slot::{FileSlot, StreamBinding};
use crate::state::FileState;
use crate::waiters::{DoneCallback, StatusCallback};

pub(crate) struct Registry {
    entries: HashMap<ResourceKey, FileEntry>,
    catalog: Arc<DashMap<ResourceKey, Arc<ResourceDescriptor>>>,
    slots: Arc<DashMap<ResourceKey, Arc<FileSlot>>>,
    engine: Arc<dyn SoundEngine>,
    cache: Arc<dyn FileCache>,
    source: Arc<dyn ByteSource>,
    tx: Sender<FileCommand>,
    retry: RetryQueue,
    metrics: Arc<FileMetrics>,
    config: FileManagerConfig,
}

/// Finds the record for `key`, creating it from the catalog on first touch.
fn lookup_or_create<'a>(
    entries: &'a mut HashMap<ResourceKey, FileEntry>,
    catalog: &DashMap<ResourceKey, Arc<ResourceDescriptor>>,
    slots: &DashMap<ResourceKey, Arc<FileSlot>>,
    key: ResourceKey,
) -> Option<&'a mut FileEntry> {
    match entries.entry(key) {
        MapEntry::Occupied(occupied) => Some(occupied.into_mut()),
        MapEntry::Vacant(vacant) => {
            let desc = match catalog.get(&key) {
                Some(desc) => desc.value().clone(),
                None => {
                    tracing::error!("{}: not registered", key);
                    return None;
                }
            };
            let slot = Arc::new(FileSlot::new());
            slots.insert(key, slot.clone());
            Some(vacant.insert(FileEntry::new(desc, slot)))
        }
    }
}

fn read_request(entry: &FileEntry) -> ReadRequest {
    ReadRequest {
        path: entry.resolved_path.clone(),
        mode: entry.acquire_mode,
        alignment: entry.desc.flags.alignment,
        prefetch: if entry.is_streamed() {
            Some(entry.desc.prefetch_size as u64)
        } else {
            None
        },
    }
}

impl Registry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FileManagerConfig,
        engine: Arc<dyn SoundEngine>,
        cache: Arc<dyn FileCache>,
        source: Arc<dyn ByteSource>,
        catalog: Arc<DashMap<ResourceKey, Arc<ResourceDescriptor>>>,
        slots: Arc<DashMap<ResourceKey, Arc<FileSlot>>>,
        metrics: Arc<FileMetrics>,
        tx: Sender<FileCommand>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            catalog,
            slots,
            engine,
            cache,
            source,
            tx,
            retry: RetryQueue::default(),
            metrics,
            config,
        }
    }

    pub fn handle_command(&mut self, cmd: FileCommand) {
        match cmd {
            FileCommand::Acquire { key } => self.handle_acquire(key),
            FileCommand::Release { key } => self.handle_release(key),
            FileCommand::Open { key, root, done } => self.handle_open(key, root, done),
            FileCommand::Load { key, done } => self.handle_load(key, done),
            FileCommand::Unload { key, done } => self.handle_unload(key, done),
            FileCommand::Close { key, done } => self.handle_close(key, done),
            FileCommand::ReadComplete { key, outcome } => self.handle_read_complete(key, outcome),
            FileCommand::StreamReady { key, result } => self.handle_stream_ready(key, result),
            FileCommand::BankLoaded { key, status } => self.handle_bank_loaded(key, status),
            FileCommand::UnloadResolved { key, status } => self.handle_unload_resolved(key, status),
            FileCommand::ResourcesFreed => self.pump_retries(),
            FileCommand::Barrier { done } => done(),
            // The worker loop consumes Shutdown before dispatching here.
            FileCommand::Shutdown => {}
        }
    }

    fn handle_acquire(&mut self, key: ResourceKey) {
        if let Some(entry) = lookup_or_create(&mut self.entries, &self.catalog, &self.slots, key) {
            entry.refs += 1;
        }
    }

    fn handle_release(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::warn!("{}: release without a live record", key);
            return;
        };
        if entry.refs == 0 {
            tracing::warn!("{}: reference count underflow", key);
            return;
        }
        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }
        let state = entry.state();
        match state {
            FileState::Unknown => {
                self.entries.remove(&key);
                self.slots.remove(&key);
            }
            FileState::Closed => self.maybe_remove(key),
            _ => {
                tracing::debug!("{}: last reference dropped, closing", key);
                self.handle_close(key, Box::new(|| {}));
            }
        }
    }

    fn handle_open(&mut self, key: ResourceKey, root: Option<PathBuf>, done: StatusCallback) {
        let Some(entry) = lookup_or_create(&mut self.entries, &self.catalog, &self.slots, key)
        else {
            done(false);
            return;
        };
        match entry.state() {
            FileState::Unknown | FileState::OpenFailed => {
                if entry.refs == 0 {
                    // The open itself holds the record alive.
                    tracing::debug!("{}: implicit acquire on open", key);
                    entry.refs = 1;
                }
                let base = root.unwrap_or_else(|| self.config.root_path.clone());
                entry.resolved_path = base.join(&entry.desc.path);
                entry.waiters.push_open(done);
                entry.set_state(FileState::Opening);
                self.begin_open(key);
            }
            FileState::Opening => entry.waiters.push_open(done),
            state @ (FileState::Closing | FileState::Closed) => {
                tracing::error!("{}: open while {}", key, state);
                self.metrics.record_contract_error();
                done(false);
            }
            state => {
                tracing::error!("{}: duplicate open while {}", key, state);
                self.metrics.record_contract_error();
                done(false);
            }
        }
    }

    fn begin_open(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if entry.is_streamed() && entry.desc.prefetch_size == 0 {
            // No bytes wanted yet; the stream opens lazily at load time.
            tracing::debug!("{}: open without prefetch, skipping read", key);
            let _ = self.tx.send(FileCommand::ReadComplete {
                key,
                outcome: Ok(ReadOutcome {
                    buffer: None,
                    file_size: 0,
                }),
            });
            return;
        }
        let request = read_request(entry);
        let tx = self.tx.clone();
        self.source.read(
            request,
            Box::new(move |outcome| {
                let _ = tx.send(FileCommand::ReadComplete { key, outcome });
            }),
        );
    }

    fn handle_read_complete(&mut self, key: ResourceKey, outcome: Result<ReadOutcome>) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::warn!("{}: read completion for a dead record", key);
            return;
        };
        match entry.state() {
            FileState::Opening => match outcome {
                Ok(read) => {
                    entry.buffer = read.buffer;
                    entry.file_size = read.file_size;
                    if let Some(buf) = &entry.buffer {
                        self.metrics.record_read(buf.len() as u64);
                    }
                    entry.set_state(FileState::Opened);
                    self.metrics.record_open();
                    entry.waiters.finish_open(true);
                    self.after_inflight(key);
                }
                Err(err) => {
                    tracing::warn!("{}: open failed: {}", key, err);
                    entry.set_state(FileState::OpenFailed);
                    self.metrics.record_open_failure();
                    entry.waiters.finish_open(false);
                    self.after_inflight(key);
                }
            },
            FileState::Loading => match outcome {
                Ok(read) => {
                    entry.buffer = read.buffer;
                    entry.file_size = read.file_size;
                    if let Some(buf) = &entry.buffer {
                        self.metrics.record_read(buf.len() as u64);
                    }
                    self.advance_load(key);
                }
                Err(err) => {
                    tracing::warn!("{}: re-read failed: {}", key, err);
                    self.finish_load(key, false);
                }
            },
            state => tracing::warn!("{}: stale read completion while {}", key, state),
        }
    }

    fn handle_load(&mut self, key: ResourceKey, done: StatusCallback) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::error!("{}: load before open", key);
            self.metrics.record_contract_error();
            done(false);
            return;
        };
        match entry.state() {
            FileState::Opened | FileState::LoadFailed => {
                entry.waiters.push_load(done);
                entry.set_state(FileState::Loading);
                self.advance_load(key);
            }
            FileState::Loading => entry.waiters.push_load(done),
            state => {
                tracing::error!("{}: load while {}", key, state);
                self.metrics.record_contract_error();
                done(false);
            }
        }
    }

    /// Runs the next missing step of a load: resident bytes, then the stream
    /// handle, then the engine hand-off.
    fn advance_load(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if entry.needs_bytes() {
            let request = read_request(entry);
            let tx = self.tx.clone();
            self.source.read(
                request,
                Box::new(move |outcome| {
                    let _ = tx.send(FileCommand::ReadComplete { key, outcome });
                }),
            );
            return;
        }
        if entry.is_streamed() && entry.stream.is_none() {
            let path = entry.resolved_path.clone();
            let tx = self.tx.clone();
            self.cache.open(
                &path,
                Box::new(move |result| {
                    let _ = tx.send(FileCommand::StreamReady { key, result });
                }),
            );
            return;
        }
        self.issue_engine_load(key);
    }

    fn handle_stream_ready(&mut self, key: ResourceKey, result: Result<Arc<dyn StreamHandle>>) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::warn!("{}: stream handle for a dead record", key);
            if let Ok(handle) = result {
                handle.close();
            }
            return;
        };
        if entry.state() != FileState::Loading {
            tracing::warn!("{}: stale stream handle while {}", key, entry.state());
            if let Ok(handle) = result {
                handle.close();
            }
            return;
        }
        match result {
            Ok(handle) => {
                entry.file_size = handle.file_size();
                entry.stream = Some(handle);
                self.issue_engine_load(key);
            }
            Err(err) => {
                tracing::warn!("{}: stream open failed: {}", key, err);
                self.finish_load(key, false);
            }
        }
    }

    fn issue_engine_load(&mut self, key: ResourceKey) {
        let engine = self.engine.clone();
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if !engine.available() {
            tracing::warn!("{}: engine unavailable, load refused", key);
            self.finish_load(key, false);
            return;
        }
        let kind = entry.desc.kind;
        let streamed = entry.is_streamed();
        let copy_mode = entry.acquire_mode.is_copy();
        let file_size = entry.file_size;
        let buffer = entry.buffer.clone();
        let payload = if streamed {
            EnginePayload::Stream {
                prefetch: buffer.clone(),
                file_size,
            }
        } else {
            match (&buffer, copy_mode) {
                (Some(buf), true) => EnginePayload::Copy(buf.bytes()),
                (Some(buf), false) => EnginePayload::View(buf.clone()),
                // Empty files still register, with nothing resident.
                (None, _) => EnginePayload::Copy(&[]),
            }
        };
        match kind {
            ResourceKind::Media => {
                let status = engine.set_media(key, payload);
                if !status.is_success() {
                    tracing::warn!("{}: engine refused media: {}", key, status);
                }
                self.finish_load(key, status.is_success());
            }
            ResourceKind::Bank => {
                let tx = self.tx.clone();
                let gate = engine.load_bank(
                    key,
                    payload,
                    Box::new(move |status| {
                        let _ = tx.send(FileCommand::BankLoaded { key, status });
                    }),
                );
                if !gate.is_success() {
                    tracing::warn!("{}: engine refused bank: {}", key, gate);
                    self.finish_load(key, false);
                }
            }
        }
    }

    fn handle_bank_loaded(&mut self, key: ResourceKey, status: EngineStatus) {
        if !status.is_success() {
            tracing::warn!("{}: bank load completed with {}", key, status);
        }
        self.finish_load(key, status.is_success());
    }

    fn finish_load(&mut self, key: ResourceKey, ok: bool) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if entry.state() != FileState::Loading {
            tracing::warn!("{}: load completion while {}", key, entry.state());
            return;
        }
        if ok {
            if entry.is_streamed() {
                if let Some(handle) = &entry.stream {
                    entry.slot.publish_binding(Some(Arc::new(StreamBinding {
                        handle: handle.clone(),
                    })));
                }
            } else if entry.acquire_mode.is_copy() {
                // The engine ingested its own copy before the gate returned.
                entry.buffer = None;
            }
            entry.set_state(FileState::Loaded);
            self.metrics.record_load();
            entry.waiters.finish_load(true);
        } else {
            entry.buffer = None;
            entry.drop_stream();
            entry.set_state(FileState::LoadFailed);
            self.metrics.record_load_failure();
            entry.waiters.finish_load(false);
        }
        self.after_inflight(key);
    }

    fn handle_unload(&mut self, key: ResourceKey, done: DoneCallback) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::error!("{}: unload before open", key);
            self.metrics.record_contract_error();
            done();
            return;
        };
        match entry.state() {
            FileState::Loaded => {
                entry.waiters.push_unload(done);
                // A parked retry already owns this unload; just queue behind it.
                if !entry.unload_pending {
                    self.begin_unload(key);
                }
            }
            // Nothing in the engine; trivially complete.
            FileState::Opened => done(),
            state => {
                tracing::error!("{}: unload while {}", key, state);
                self.metrics.record_contract_error();
                done();
            }
        }
    }

    fn begin_unload(&mut self, key: ResourceKey) {
        let engine = self.engine.clone();
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        debug_assert_eq!(entry.state(), FileState::Loaded);
        entry.unload_pending = true;
        entry.unload_in_flight = true;
        let kind = entry.desc.kind;
        if !engine.available() {
            // No engine left to hold the bytes; complete locally.
            tracing::warn!("{}: engine unavailable, forcing unload", key);
            self.resolve_unload(key);
            return;
        }
        let tx = self.tx.clone();
        let done: EngineCallback = Box::new(move |status| {
            let _ = tx.send(FileCommand::UnloadResolved { key, status });
        });
        let gate = match kind {
            ResourceKind::Media => engine.try_unset_media(key, done),
            ResourceKind::Bank => engine.unload_bank(key, done),
        };
        match gate {
            // Completion arrives as UnloadResolved.
            EngineStatus::Success => {}
            EngineStatus::InUse => self.defer_unload(key),
            status => {
                tracing::warn!("{}: engine refused unload: {}", key, status);
                self.resolve_unload(key);
            }
        }
    }

    fn handle_unload_resolved(&mut self, key: ResourceKey, status: EngineStatus) {
        let Some(entry) = self.entries.get_mut(&key) else {
            tracing::warn!("{}: unload completion for a dead record", key);
            return;
        };
        if !entry.unload_in_flight || entry.state() != FileState::Loaded {
            tracing::warn!("{}: stale unload completion while {}", key, entry.state());
            return;
        }
        match status {
            EngineStatus::Success => self.resolve_unload(key),
            EngineStatus::InUse => self.defer_unload(key),
            status => {
                tracing::warn!("{}: unload completed with {}", key, status);
                self.resolve_unload(key);
            }
        }
    }

    /// The engine is still playing from this file. The record stays `Loaded`
    /// so streamed reads keep serving, and the key parks for a retry.
    fn defer_unload(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        entry.unload_in_flight = false;
        entry.retry_attempts += 1;
        let cap = self.config.max_unload_retries;
        if cap != 0 && entry.retry_attempts >= cap {
            tracing::error!(
                "{}: still in use after {} attempts, forcing unload",
                key,
                entry.retry_attempts
            );
            self.resolve_unload(key);
            return;
        }
        self.metrics.record_unload_retry();
        tracing::debug!(
            "{}: engine busy, unload parked (attempt {})",
            key,
            entry.retry_attempts
        );
        self.retry.park(key);
    }

    fn resolve_unload(&mut self, key: ResourceKey) {
        self.retry.forget(key);
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        entry.unload_pending = false;
        entry.unload_in_flight = false;
        entry.retry_attempts = 0;
        entry.set_state(FileState::Unloading);
        if entry.is_streamed() {
            // The stream handle survives for a cheap reload; only the
            // published binding goes away with the loaded state.
            entry.slot.publish_binding(None);
        } else if entry.acquire_mode.is_copy() {
            entry.buffer = None;
        }
        entry.set_state(FileState::Opened);
        self.metrics.record_unload();
        entry.waiters.finish_unload();
        self.after_inflight(key);
    }

    fn handle_close(&mut self, key: ResourceKey, done: DoneCallback) {
        let Some(entry) = self.entries.get_mut(&key) else {
            // Never opened; nothing to tear down.
            done();
            return;
        };
        match entry.state() {
            FileState::Opened | FileState::OpenFailed | FileState::LoadFailed => {
                entry.waiters.push_close(done);
                self.begin_close(key);
            }
            FileState::Loaded => {
                entry.waiters.push_close(done);
                entry.close_deferred = true;
                if !entry.unload_pending {
                    self.begin_unload(key);
                }
            }
            FileState::Opening | FileState::Loading | FileState::Unloading => {
                entry.waiters.push_close(done);
                entry.close_deferred = true;
            }
            FileState::Closing => entry.waiters.push_close(done),
            FileState::Closed => {
                tracing::debug!("{}: close on a closed record", key);
                done();
            }
            FileState::Unknown => done(),
        }
    }

    fn begin_close(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        entry.close_deferred = false;
        entry.set_state(FileState::Closing);
        entry.drop_stream();
        entry.buffer = None;
        entry.file_size = 0;
        entry.set_state(FileState::Closed);
        self.metrics.record_close();
        entry.waiters.finish_close();
        self.maybe_remove(key);
    }

    /// Runs after an in-flight operation resolves: a deferred close picks up
    /// from whatever state the operation left behind.
    fn after_inflight(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if entry.close_deferred {
            match entry.state() {
                FileState::Loaded => {
                    if !entry.unload_pending {
                        self.begin_unload(key);
                    }
                    return;
                }
                FileState::Opened | FileState::OpenFailed | FileState::LoadFailed => {
                    self.begin_close(key);
                    return;
                }
                _ => {}
            }
        }
        self.maybe_remove(key);
    }

    fn maybe_remove(&mut self, key: ResourceKey) {
        let Some(entry) = self.entries.get(&key) else {
            return;
        };
        if entry.refs == 0 && entry.state() == FileState::Closed && entry.waiters.is_empty() {
            tracing::debug!("{}: record retired", key);
            self.entries.remove(&key);
            self.slots.remove(&key);
        }
    }

    /// Re-issues every parked unload. Runs on the retry tick and whenever the
    /// engine signals that resources were freed.
    pub fn pump_retries(&mut self) {
        if self.retry.is_empty() {
            return;
        }
        let keys = self.retry.take();
        for key in keys {
            let eligible = match self.entries.get(&key) {
                Some(entry) => {
                    entry.state() == FileState::Loaded
                        && entry.unload_pending
                        && !entry.unload_in_flight
                }
                None => false,
            };
            if eligible {
                self.begin_unload(key);
            }
        }
    }

    /// Tears every record down on shutdown. Pending opens and loads report
    /// failure; pending unloads and closes complete.
    pub fn shutdown_drain(&mut self) {
        let keys: Vec<ResourceKey> = self.entries.keys().copied().collect();
        for key in keys {
            let Some(mut entry) = self.entries.remove(&key) else {
                continue;
            };
            if !matches!(entry.state(), FileState::Closed | FileState::Unknown) {
                tracing::warn!("{}: still {} at shutdown", key, entry.state());
            }
            entry.drop_stream();
            entry.buffer = None;
            entry.force_state(FileState::Closed);
            entry.waiters.fail_all();
            self.slots.remove(&key);
        }
        let _ = self.retry.take();
    }
}
