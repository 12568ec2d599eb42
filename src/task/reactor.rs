//! The event-loop bridge.
//!
//! The scheduler needs exactly four operations from an event loop:
//! register, tick, cancel, wakeup. Anything that can provide them (epoll,
//! kqueue, IOCP, io_uring, a user-space poller) slots in behind
//! [`EventSource`]. Two implementations ship here: [`PollReactor`], a
//! portable `poll(2)` loop with a self-pipe wakeup for every unix, and
//! [`NullReactor`], a timer-only stand-in for targets without readiness
//! I/O.
//!
//! Registrations are one-shot: a fired `(fd, interest)` is deregistered as
//! its event is delivered, and the task re-registers on its next await.

use super::TaskId;
use crate::sync::Mutex;
use bitflags::bitflags;

/// Raw file descriptor as the OS hands them out.
pub type RawFd = i32;

bitflags! {
    /// Readiness directions a task can wait on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Interest: u8 {
        const READABLE = 0b01;
        const WRITABLE = 0b10;
    }
}

/// One ready event out of [`EventSource::tick`].
#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub fd: RawFd,
    pub interest: Interest,
    pub task: TaskId,
}

/// The four-operation event-loop contract consumed by the scheduler.
pub trait EventSource: Send + Sync {
    /// Wait for readiness of `(fd, interest)` on behalf of `task`.
    /// Exactly one registration per `(fd, direction)` may exist for a
    /// task; re-registering replaces the previous one.
    fn register(&self, fd: RawFd, interest: Interest, task: TaskId);

    /// Block up to `timeout_ms` (`-1` forever) and append up to `max`
    /// ready events. Returns the number appended.
    fn tick(&self, events: &mut Vec<Event>, max: usize, timeout_ms: i32) -> usize;

    /// Drop any registration of `fd` for `task`. Idempotent.
    fn cancel(&self, fd: RawFd, task: TaskId);

    /// Unblock a concurrent [`tick`](Self::tick) promptly.
    fn wakeup(&self);
}

#[cfg(unix)]
struct Registration {
    fd: RawFd,
    interest: Interest,
    task: TaskId,
}

/// Portable `poll(2)` event loop with a self-pipe wakeup.
#[cfg(unix)]
pub struct PollReactor {
    regs: Mutex<Vec<Registration>>,
    wake_read: RawFd,
    wake_write: RawFd,
}

#[cfg(unix)]
impl PollReactor {
    pub fn new() -> std::io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        for fd in fds {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        }
        Ok(Self {
            regs: Mutex::new(Vec::new()),
            wake_read: fds[0],
            wake_write: fds[1],
        })
    }

    fn drain_wake_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(self.wake_read, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            };
            if n <= 0 {
                break;
            }
        }
    }
}

#[cfg(unix)]
impl EventSource for PollReactor {
    fn register(&self, fd: RawFd, interest: Interest, task: TaskId) {
        {
            let mut regs = self.regs.lock();
            if let Some(existing) = regs.iter_mut().find(|r| r.fd == fd && r.task == task) {
                if existing.interest.intersects(interest) {
                    log::warn!(
                        "reactor: task {} re-registered fd {} for {:?}; replacing",
                        task,
                        fd,
                        interest
                    );
                }
                existing.interest |= interest;
            } else {
                regs.push(Registration { fd, interest, task });
            }
        }
        // A concurrent tick snapshotted the old set; make it rebuild.
        self.wakeup();
    }

    fn tick(&self, events: &mut Vec<Event>, max: usize, timeout_ms: i32) -> usize {
        // Snapshot registrations; poll runs without the lock so register
        // and cancel stay non-blocking.
        let snapshot: Vec<(RawFd, Interest, TaskId)> = {
            let regs = self.regs.lock();
            regs.iter().map(|r| (r.fd, r.interest, r.task)).collect()
        };

        let mut pollfds: Vec<libc::pollfd> = Vec::with_capacity(snapshot.len() + 1);
        pollfds.push(libc::pollfd {
            fd: self.wake_read,
            events: libc::POLLIN,
            revents: 0,
        });
        for &(fd, interest, _) in &snapshot {
            let mut mask = 0i16;
            if interest.contains(Interest::READABLE) {
                mask |= libc::POLLIN;
            }
            if interest.contains(Interest::WRITABLE) {
                mask |= libc::POLLOUT;
            }
            pollfds.push(libc::pollfd {
                fd,
                events: mask,
                revents: 0,
            });
        }

        let rc = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if rc <= 0 {
            return 0;
        }

        if pollfds[0].revents != 0 {
            self.drain_wake_pipe();
        }

        let mut delivered = 0usize;
        for (slot, &(fd, interest, task)) in pollfds[1..].iter().zip(&snapshot) {
            if delivered >= max {
                break;
            }
            let revents = slot.revents;
            if revents == 0 {
                continue;
            }
            let mut ready = Interest::empty();
            if interest.contains(Interest::READABLE)
                && revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
            {
                ready |= Interest::READABLE;
            }
            if interest.contains(Interest::WRITABLE)
                && revents & (libc::POLLOUT | libc::POLLHUP | libc::POLLERR) != 0
            {
                ready |= Interest::WRITABLE;
            }
            if ready.is_empty() {
                continue;
            }
            events.push(Event {
                fd,
                interest: ready,
                task,
            });
            delivered += 1;
            // One-shot: consume the registration.
            self.cancel(fd, task);
        }
        delivered
    }

    fn cancel(&self, fd: RawFd, task: TaskId) {
        self.regs
            .lock()
            .retain(|r| !(r.fd == fd && r.task == task));
    }

    fn wakeup(&self) {
        let byte = 1u8;
        // EAGAIN means the pipe already holds a pending wakeup.
        unsafe { libc::write(self.wake_write, &byte as *const u8 as *const libc::c_void, 1) };
    }
}

#[cfg(unix)]
impl Drop for PollReactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_read);
            libc::close(self.wake_write);
        }
    }
}

/// Timer-only event source: `tick` just sleeps until the timeout or a
/// wakeup. Registering I/O interest is fatal.
pub struct NullReactor {
    state: Mutex<bool>,
    cvar: crate::sync::Condvar,
}

impl NullReactor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cvar: crate::sync::Condvar::new(),
        }
    }
}

impl Default for NullReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for NullReactor {
    fn register(&self, _fd: RawFd, _interest: Interest, _task: TaskId) {
        crate::panic::fatal("this scheduler was built without readiness I/O");
    }

    fn tick(&self, _events: &mut Vec<Event>, _max: usize, timeout_ms: i32) -> usize {
        let timeout = if timeout_ms < 0 {
            std::time::Duration::from_secs(3600)
        } else {
            std::time::Duration::from_millis(timeout_ms as u64)
        };
        let mut woken = self.state.lock();
        if !*woken {
            let (guard, _) = self.cvar.wait_timeout(woken, timeout);
            woken = guard;
        }
        *woken = false;
        0
    }

    fn cancel(&self, _fd: RawFd, _task: TaskId) {}

    fn wakeup(&self) {
        *self.state.lock() = true;
        self.cvar.notify_one();
    }
}
