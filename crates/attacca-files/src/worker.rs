//! Coordinator thread for file lifecycle operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use thread_priority::ThreadPriority;

use attacca_core::Result;

use crate::command::FileCommand;
use crate::registry::Registry;

/// Owns the coordinator thread. Stopping drains every record and joins.
pub(crate) struct FileWorker {
    tx: Sender<FileCommand>,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl FileWorker {
    pub fn spawn(
        registry: Registry,
        rx: Receiver<FileCommand>,
        tx: Sender<FileCommand>,
        tick: Duration,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name("attacca-files".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                worker_loop(registry, rx, thread_shutdown, tick);
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
            shutdown,
        })
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.tx.send(FileCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FileWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Coordinator main loop: commands in arrival order, retry sweeps on the
/// tick, full drain on shutdown.
fn worker_loop(
    mut registry: Registry,
    rx: Receiver<FileCommand>,
    shutdown: Arc<AtomicBool>,
    tick: Duration,
) {
    tracing::debug!("File coordinator thread started");

    loop {
        let mut stopping = false;
        match rx.recv_timeout(tick) {
            Ok(FileCommand::Shutdown) => stopping = true,
            Ok(cmd) => registry.handle_command(cmd),
            Err(RecvTimeoutError::Timeout) => registry.pump_retries(),
            Err(RecvTimeoutError::Disconnected) => stopping = true,
        }

        // Work queued behind the first command drains in the same pass.
        loop {
            match rx.try_recv() {
                Ok(FileCommand::Shutdown) => {
                    stopping = true;
                    break;
                }
                Ok(cmd) => registry.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    stopping = true;
                    break;
                }
            }
        }

        if stopping || shutdown.load(Ordering::SeqCst) {
            registry.shutdown_drain();
            break;
        }
    }

    tracing::debug!("File coordinator thread stopped");
}
