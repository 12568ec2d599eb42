//! Task state and the per-resume context.

use super::reactor::{Interest, RawFd};
use crate::platform;
use crate::sync::{AtomicBool, Shared};

/// Scheduler-wide task identity.
pub type TaskId = u64;

/// What a resume function reports back to the scheduler.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Keep running: requeue immediately.
    Ready,
    /// Suspend. The disposition depends on the suspension key set on the
    /// context: none requeues (a fairness yield), an I/O key parks on the
    /// event loop, a deadline key parks on the timer heap.
    Yielded,
    /// Finished; the task is freed and never resumed again.
    Done,
}

/// Why a yielded task parked and how to unpark it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SuspendKey {
    None,
    Io { fd: RawFd, interest: Interest },
    Deadline { at_ns: u64 },
}

/// Handed to every resume call. Carries the suspension key out and the
/// cancellation signal in; valid only for the duration of the call.
pub struct Context {
    task_id: TaskId,
    worker: usize,
    cancelled: bool,
    key: SuspendKey,
}

impl Context {
    pub(super) fn new(task_id: TaskId, worker: usize, cancelled: bool) -> Self {
        Self {
            task_id,
            worker,
            cancelled,
            key: SuspendKey::None,
        }
    }

    /// This task's id.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Index of the worker running this resume.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Whether a cancellation signal was pending when this resume began.
    /// Cancellation is cooperative: the task decides how to wind down.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Park on `(fd, interest)` readiness after returning
    /// [`TaskStatus::Yielded`].
    pub fn await_io(&mut self, fd: RawFd, interest: Interest) {
        crate::rt_assert!(fd >= 0, "await_io with a negative fd");
        crate::rt_assert!(!interest.is_empty(), "await_io with an empty interest");
        self.key = SuspendKey::Io { fd, interest };
    }

    /// Park for `ms` milliseconds after returning [`TaskStatus::Yielded`].
    pub fn await_after(&mut self, ms: u64) {
        self.key = SuspendKey::Deadline {
            at_ns: platform::monotonic_ns() + ms * 1_000_000,
        };
    }

    /// The scheduler consumes the key after every resume; a fresh call
    /// always starts with none.
    pub(super) fn take_key(&mut self) -> SuspendKey {
        core::mem::replace(&mut self.key, SuspendKey::None)
    }
}

pub(super) struct Task {
    pub(super) id: TaskId,
    pub(super) resume: Box<dyn FnMut(&mut Context) -> TaskStatus + Send>,
    pub(super) cancelled: Shared<AtomicBool>,
}
