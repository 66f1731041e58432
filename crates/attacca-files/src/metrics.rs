//! Lifecycle statistics for the file coordinator.
//!
//! Tracks operation counts, failure counts, and streamed read volume.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for file lifecycle operations.
pub struct FileMetrics {
    /// Successful opens
    opens: AtomicU64,
    /// Failed opens
    open_failures: AtomicU64,
    /// Successful engine loads
    loads: AtomicU64,
    /// Failed engine loads
    load_failures: AtomicU64,
    /// Completed unloads
    unloads: AtomicU64,
    /// Unload attempts deferred because the engine was busy
    unload_retries: AtomicU64,
    /// Completed closes
    closes: AtomicU64,
    /// Requests rejected for arriving in the wrong state
    contract_errors: AtomicU64,
    /// Bytes brought resident at open and load time
    bytes_read: AtomicU64,
    /// Streamed transfer count
    stream_reads: AtomicU64,
    /// Streamed transfer volume
    stream_bytes: AtomicU64,
}

impl Default for FileMetrics {
    fn default() -> Self {
        Self {
            opens: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            unloads: AtomicU64::new(0),
            unload_retries: AtomicU64::new(0),
            closes: AtomicU64::new(0),
            contract_errors: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            stream_reads: AtomicU64::new(0),
            stream_bytes: AtomicU64::new(0),
        }
    }
}

impl FileMetrics {
    /// Create new metrics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed open.
    #[inline]
    pub fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed open.
    #[inline]
    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed engine load.
    #[inline]
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed engine load.
    #[inline]
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed unload.
    #[inline]
    pub fn record_unload(&self) {
        self.unloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unload deferred by a busy engine.
    #[inline]
    pub fn record_unload_retry(&self) {
        self.unload_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed close.
    #[inline]
    pub fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected for arriving in the wrong state.
    #[inline]
    pub fn record_contract_error(&self) {
        self.contract_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes brought resident from the byte source.
    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a streamed transfer.
    #[inline]
    pub fn record_stream_read(&self, bytes: u64) {
        self.stream_reads.fetch_add(1, Ordering::Relaxed);
        self.stream_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take a snapshot of current metrics.
    pub fn snapshot(&self) -> FileMetricsSnapshot {
        FileMetricsSnapshot {
            opens: self.opens.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
            unload_retries: self.unload_retries.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            contract_errors: self.contract_errors.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            stream_reads: self.stream_reads.load(Ordering::Relaxed),
            stream_bytes: self.stream_bytes.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.opens.store(0, Ordering::Relaxed);
        self.open_failures.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        self.load_failures.store(0, Ordering::Relaxed);
        self.unloads.store(0, Ordering::Relaxed);
        self.unload_retries.store(0, Ordering::Relaxed);
        self.closes.store(0, Ordering::Relaxed);
        self.contract_errors.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.stream_reads.store(0, Ordering::Relaxed);
        self.stream_bytes.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of lifecycle metrics at a point in time.
#[derive(Debug, Clone, Default)]
pub struct FileMetricsSnapshot {
    /// Successful opens
    pub opens: u64,
    /// Failed opens
    pub open_failures: u64,
    /// Successful engine loads
    pub loads: u64,
    /// Failed engine loads
    pub load_failures: u64,
    /// Completed unloads
    pub unloads: u64,
    /// Unload attempts deferred because the engine was busy
    pub unload_retries: u64,
    /// Completed closes
    pub closes: u64,
    /// Requests rejected for arriving in the wrong state
    pub contract_errors: u64,
    /// Bytes brought resident at open and load time
    pub bytes_read: u64,
    /// Streamed transfer count
    pub stream_reads: u64,
    /// Streamed transfer volume
    pub stream_bytes: u64,
}

impl FileMetricsSnapshot {
    /// Fraction of unload attempts the engine answered busy (0.0 - 1.0).
    ///
    /// Returns 0.0 if no unloads have been attempted.
    pub fn unload_retry_rate(&self) -> f32 {
        let attempts = self.unloads + self.unload_retries;
        if attempts == 0 {
            0.0
        } else {
            self.unload_retries as f32 / attempts as f32
        }
    }

    /// Calculate average bytes per streamed transfer.
    pub fn avg_stream_read_size(&self) -> u64 {
        if self.stream_reads == 0 {
            0
        } else {
            self.stream_bytes / self.stream_reads
        }
    }
}
