//! Caller continuations parked on a file record.
//!
//! Requests arriving while an operation is mid-flight queue here instead of
//! re-triggering I/O or engine calls; the resolution drains every queue in
//! arrival order, exactly once.

use smallvec::SmallVec;

/// Continuation for operations that report success or failure.
pub type StatusCallback = Box<dyn FnOnce(bool) + Send>;
/// Continuation for operations that only signal completion.
pub type DoneCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct Waiters {
    open: SmallVec<[StatusCallback; 2]>,
    load: SmallVec<[StatusCallback; 2]>,
    unload: SmallVec<[DoneCallback; 2]>,
    close: SmallVec<[DoneCallback; 2]>,
}

impl Waiters {
    pub fn push_open(&mut self, done: StatusCallback) {
        self.open.push(done);
    }

    pub fn push_load(&mut self, done: StatusCallback) {
        self.load.push(done);
    }

    pub fn push_unload(&mut self, done: DoneCallback) {
        self.unload.push(done);
    }

    pub fn push_close(&mut self, done: DoneCallback) {
        self.close.push(done);
    }

    pub fn finish_open(&mut self, success: bool) {
        for done in self.open.drain(..) {
            done(success);
        }
    }

    pub fn finish_load(&mut self, success: bool) {
        for done in self.load.drain(..) {
            done(success);
        }
    }

    pub fn finish_unload(&mut self) {
        for done in self.unload.drain(..) {
            done();
        }
    }

    pub fn finish_close(&mut self) {
        for done in self.close.drain(..) {
            done();
        }
    }

    /// Shutdown drain: pending opens and loads report failure, pending
    /// unloads and closes complete.
    pub fn fail_all(&mut self) {
        self.finish_open(false);
        self.finish_load(false);
        self.finish_unload();
        self.finish_close();
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.load.is_empty() && self.unload.is_empty() && self.close.is_empty()
    }
}
