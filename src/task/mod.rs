//! Work-stealing async task runtime.
//!
//! Tasks are stackless: a task is a resume closure returning
//! [`TaskStatus`], re-entered every time the scheduler runs it. Suspension
//! is explicit — the closure calls [`Context::await_io`] or
//! [`Context::await_after`] and returns [`TaskStatus::Yielded`]; with no
//! key set, a yield is a pure fairness yield and the task requeues.
//!
//! The scheduler runs one OS thread per worker. Each worker owns a
//! work-stealing deque; spawned tasks enter a global injector FIFO, and an
//! idle worker tries, in order: its own deque, the injector, stealing
//! from a random victim, and finally driving the shared event loop /
//! timer heap under a driver lock while the rest park on per-worker
//! condvars.
//!
//! A task is owned by exactly one worker at a time; ownership moves
//! through the queues with release/acquire transfers. Cancellation is
//! cooperative: [`Runtime::cancel`] raises a flag the task observes via
//! [`Context::cancelled`] on its next resume.

mod deque;
mod reactor;
mod task;
mod timer;

pub use reactor::{Event, EventSource, Interest, NullReactor, RawFd};
#[cfg(unix)]
pub use reactor::PollReactor;
pub use task::{Context, TaskId, TaskStatus};
pub use timer::TimerHandle;

use crate::config::{IDLE_BUDGET_MS, LOCAL_BATCH, WORKERS};
use crate::map::Map;
use crate::platform;
use crate::stat_inc;
use crate::sync::spin::SpinMutex;
use crate::sync::{AtomicBool, AtomicU64, Condvar, Mutex, Ordering, Shared};
use deque::{Deque, Steal};
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::time::Duration;
use task::{SuspendKey, Task};
use timer::{TimerHeap, TimerWake};

/// Ring capacity of each worker's local deque; overflow spills to the
/// injector.
const LOCAL_QUEUE_CAP: usize = 256;

/// Events drained from the reactor per driver tick.
const EVENT_BATCH: usize = 64;

struct Worker {
    deque: Deque,
    /// True when an unpark arrived while the worker was not waiting.
    unpark_pending: Mutex<bool>,
    cvar: Condvar,
}

struct Inner {
    workers: Vec<Worker>,
    injector: Mutex<VecDeque<Box<Task>>>,
    /// Tasks waiting on I/O readiness or a deadline, by id.
    parked: Mutex<Map<TaskId, Box<Task>>>,
    timers: Mutex<TimerHeap>,
    reactor: Box<dyn EventSource>,
    /// Only one worker blocks in `reactor.tick` at a time.
    driver: SpinMutex<()>,
    /// Cancellation flags for live tasks.
    cancels: Mutex<Map<TaskId, Shared<AtomicBool>>>,
    next_id: AtomicU64,
    live: AtomicU64,
    unpark_rr: AtomicU64,
    shutdown: AtomicBool,
    idle_lock: Mutex<()>,
    idle_cvar: Condvar,
    threads: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

/// Handle to a running scheduler. Dropping it shuts the workers down.
pub struct Runtime {
    inner: Shared<Inner>,
}

impl Runtime {
    /// A runtime with the configured worker count (one per CPU by
    /// default) and the platform event loop.
    pub fn new() -> Self {
        Self::with_workers(0)
    }

    /// A runtime with `n` workers; `0` means the configured default.
    pub fn with_workers(n: usize) -> Self {
        let reactor: Box<dyn EventSource> = {
            #[cfg(unix)]
            {
                match reactor::PollReactor::new() {
                    Ok(r) => Box::new(r),
                    Err(e) => crate::panic::fatal(&format!("event loop setup failed: {e}")),
                }
            }
            #[cfg(not(unix))]
            {
                Box::new(NullReactor::new())
            }
        };
        Self::with_event_source(n, reactor)
    }

    /// A runtime over a caller-provided event loop.
    pub fn with_event_source(n: usize, reactor: Box<dyn EventSource>) -> Self {
        let n = if n != 0 { n } else { WORKERS };
        let n = if n != 0 {
            n
        } else {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        };

        let workers = (0..n)
            .map(|_| Worker {
                deque: Deque::new(LOCAL_QUEUE_CAP),
                unpark_pending: Mutex::new(false),
                cvar: Condvar::new(),
            })
            .collect();

        let inner = Shared::new(Inner {
            workers,
            injector: Mutex::new(VecDeque::new()),
            parked: Mutex::new(Map::new()),
            timers: Mutex::new(TimerHeap::new()),
            reactor,
            driver: SpinMutex::new(()),
            cancels: Mutex::new(Map::new()),
            next_id: AtomicU64::new(1),
            live: AtomicU64::new(0),
            unpark_rr: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            idle_lock: Mutex::new(()),
            idle_cvar: Condvar::new(),
            threads: Mutex::new(Vec::new()),
        });

        {
            let mut threads = inner.threads.lock();
            for i in 0..n {
                let inner = inner.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("worker-{i}"))
                    .spawn(move || worker_loop(inner, i))
                    .unwrap_or_else(|e| {
                        crate::panic::fatal(&format!("failed to spawn worker thread: {e}"))
                    });
                threads.push(handle);
            }
        }

        log::debug!("scheduler: started {n} workers");
        Runtime { inner }
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.len()
    }

    /// Enqueue a new task. The closure is resumed repeatedly until it
    /// returns [`TaskStatus::Done`].
    pub fn spawn(
        &self,
        resume: impl FnMut(&mut Context) -> TaskStatus + Send + 'static,
    ) -> TaskId {
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Shared::new(AtomicBool::new(false));
        inner.cancels.lock().insert(id, cancelled.clone());
        let task = Box::new(Task {
            id,
            resume: Box::new(resume),
            cancelled,
        });
        inner.live.fetch_add(1, Ordering::AcqRel);
        stat_inc!(tasks_spawned);
        inner.injector.lock().push_back(task);
        unpark_one(inner);
        inner.reactor.wakeup();
        id
    }

    /// Raise the cancellation flag for `id`. Returns whether the task was
    /// still live. The flag is observed on the task's next resume.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.inner.cancels.lock().get(&id) {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Schedule `callback` to run on a worker after `after_ms`;
    /// re-arms every `period_ms` when nonzero.
    pub fn add_timer(
        &self,
        after_ms: u64,
        period_ms: u64,
        callback: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        let at = platform::monotonic_ns() + after_ms * 1_000_000;
        let handle =
            self.inner
                .timers
                .lock()
                .insert_callback(at, period_ms * 1_000_000, Box::new(callback));
        self.inner.reactor.wakeup();
        unpark_one(&self.inner);
        handle
    }

    /// Block until no task is live. Tasks spawned after the last one
    /// finishes are not waited for.
    pub fn wait_idle(&self) {
        let mut guard = self.inner.idle_lock.lock();
        while self.inner.live.load(Ordering::Acquire) != 0 {
            let (g, _) = self
                .inner
                .idle_cvar
                .wait_timeout(guard, Duration::from_millis(50));
            guard = g;
        }
    }

    /// Stop the workers and join them. Queued and parked tasks are
    /// dropped without further resumes.
    pub fn shutdown(self) {
        // Drop runs the teardown.
    }

    fn shutdown_impl(&self) {
        let inner = &self.inner;
        if inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        for worker in &inner.workers {
            *worker.unpark_pending.lock() = true;
            worker.cvar.notify_one();
        }
        inner.reactor.wakeup();
        let threads = core::mem::take(&mut *inner.threads.lock());
        for handle in threads {
            inner.reactor.wakeup();
            let _ = handle.join();
        }
        inner.injector.lock().clear();
        inner.parked.lock().clear();
        inner.cancels.lock().clear();
        log::debug!("scheduler: workers joined");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown_impl();
    }
}

static GLOBAL: Lazy<Runtime> = Lazy::new(Runtime::new);

/// The process-wide runtime, started on first use.
pub fn global() -> &'static Runtime {
    &GLOBAL
}

/// Spawn onto the process-wide runtime.
pub fn spawn(resume: impl FnMut(&mut Context) -> TaskStatus + Send + 'static) -> TaskId {
    global().spawn(resume)
}

// ---------------------------------------------------------------------------
// Worker internals
// ---------------------------------------------------------------------------

fn worker_loop(inner: Shared<Inner>, me: usize) {
    log::debug!("worker-{me}: up");
    let mut rng = (me as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;

    loop {
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }
        let mut did_work = false;

        for _ in 0..LOCAL_BATCH {
            match inner.workers[me].deque.pop() {
                Some(raw) => {
                    run_task(&inner, me, unsafe { Box::from_raw(raw) });
                    did_work = true;
                }
                None => break,
            }
        }

        if !did_work {
            let task = inner.injector.lock().pop_front();
            if let Some(task) = task {
                run_task(&inner, me, task);
                did_work = true;
            }
        }

        if !did_work {
            if let Some(task) = steal_task(&inner, me, &mut rng) {
                stat_inc!(steals);
                run_task(&inner, me, task);
                did_work = true;
            }
        }

        fire_timers(&inner, me);

        if did_work {
            continue;
        }

        // Idle: compute how long we may block, then either drive the
        // event loop or park until someone needs us.
        let now = platform::monotonic_ns();
        let timeout_ms = match inner.timers.lock().next_deadline() {
            Some(d) if d <= now => 0,
            Some(d) => ((d - now) / 1_000_000).min(IDLE_BUDGET_MS) as i32,
            None => IDLE_BUDGET_MS as i32,
        };

        if let Some(driver) = inner.driver.try_lock() {
            let mut events = Vec::with_capacity(EVENT_BATCH);
            inner.reactor.tick(&mut events, EVENT_BATCH, timeout_ms);
            drop(driver);
            for event in events {
                let task = inner.parked.lock().remove(&event.task);
                if let Some(task) = task {
                    enqueue_local(&inner, me, task);
                }
            }
        } else {
            park(&inner, me, timeout_ms);
        }
    }

    // Tasks still in the local ring die with the scheduler.
    while let Some(raw) = inner.workers[me].deque.pop() {
        drop(unsafe { Box::from_raw(raw) });
    }
    log::debug!("worker-{me}: down");
}

fn run_task(inner: &Shared<Inner>, me: usize, mut task: Box<Task>) {
    let mut ctx = Context::new(task.id, me, task.cancelled.load(Ordering::Acquire));
    let status = (task.resume)(&mut ctx);
    match status {
        TaskStatus::Done => {
            let id = task.id;
            drop(task);
            inner.cancels.lock().remove(&id);
            stat_inc!(tasks_completed);
            if inner.live.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _guard = inner.idle_lock.lock();
                inner.idle_cvar.notify_all();
            }
        }
        TaskStatus::Ready => enqueue_local(inner, me, task),
        TaskStatus::Yielded => match ctx.take_key() {
            SuspendKey::None => enqueue_local(inner, me, task),
            SuspendKey::Io { fd, interest } => {
                let id = task.id;
                // Park before registering so a fast readiness event finds
                // the task.
                inner.parked.lock().insert(id, task);
                inner.reactor.register(fd, interest, id);
            }
            SuspendKey::Deadline { at_ns } => {
                let id = task.id;
                inner.parked.lock().insert(id, task);
                inner.timers.lock().insert_task(at_ns, id);
                // The driver may be blocked past this deadline.
                inner.reactor.wakeup();
            }
        },
    }
}

/// Push onto our own deque, spilling to the injector when the ring is
/// full.
fn enqueue_local(inner: &Shared<Inner>, me: usize, task: Box<Task>) {
    let raw = Box::into_raw(task);
    if let Err(raw) = inner.workers[me].deque.push(raw) {
        inner
            .injector
            .lock()
            .push_back(unsafe { Box::from_raw(raw) });
        unpark_one(inner);
    }
}

fn steal_task(inner: &Shared<Inner>, me: usize, rng: &mut u64) -> Option<Box<Task>> {
    let n = inner.workers.len();
    if n <= 1 {
        return None;
    }
    // xorshift64*; cheap and good enough to spread victims.
    *rng ^= *rng << 13;
    *rng ^= *rng >> 7;
    *rng ^= *rng << 17;
    let start = (*rng as usize) % n;

    for i in 0..n {
        let victim = (start + i) % n;
        if victim == me {
            continue;
        }
        loop {
            match inner.workers[victim].deque.steal() {
                Steal::Success(raw) => return Some(unsafe { Box::from_raw(raw) }),
                Steal::Retry => platform::spin_hint(),
                Steal::Empty => break,
            }
        }
    }
    None
}

fn fire_timers(inner: &Shared<Inner>, me: usize) {
    let now = platform::monotonic_ns();
    let due = {
        let mut timers = inner.timers.lock();
        if timers.is_empty() {
            return;
        }
        timers.pop_due(now)
    };
    for mut entry in due {
        stat_inc!(timers_fired);
        let rearm = match &mut entry.wake {
            TimerWake::Task(id) => {
                let id = *id;
                let task = inner.parked.lock().remove(&id);
                if let Some(task) = task {
                    enqueue_local(inner, me, task);
                }
                false
            }
            TimerWake::Callback(callback) => {
                callback();
                entry.period_ns > 0
            }
        };
        if rearm && !entry.is_cancelled() {
            entry.at_ns += entry.period_ns;
            inner.timers.lock().push_entry(entry);
        }
    }
}

fn park(inner: &Shared<Inner>, me: usize, timeout_ms: i32) {
    let worker = &inner.workers[me];
    let mut pending = worker.unpark_pending.lock();
    if !*pending {
        let timeout = Duration::from_millis(timeout_ms.max(1) as u64);
        let (guard, _) = worker.cvar.wait_timeout(pending, timeout);
        pending = guard;
    }
    *pending = false;
}

fn unpark_one(inner: &Shared<Inner>) {
    let n = inner.workers.len();
    let i = (inner.unpark_rr.fetch_add(1, Ordering::Relaxed) as usize) % n;
    let worker = &inner.workers[i];
    *worker.unpark_pending.lock() = true;
    worker.cvar.notify_one();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as StdOrdering};
    use std::sync::Arc;

    #[test]
    fn test_spawn_runs_to_done() {
        let rt = Runtime::with_workers(2);
        let hits = Arc::new(AtomicU32::new(0));
        for _ in 0..100 {
            let hits = Arc::clone(&hits);
            rt.spawn(move |_ctx| {
                hits.fetch_add(1, StdOrdering::SeqCst);
                TaskStatus::Done
            });
        }
        rt.wait_idle();
        assert_eq!(hits.load(StdOrdering::SeqCst), 100);
    }

    #[test]
    fn test_fair_yield_reschedules() {
        let rt = Runtime::with_workers(1);
        let steps = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&steps);
        rt.spawn(move |_ctx| {
            if s.fetch_add(1, StdOrdering::SeqCst) < 9 {
                TaskStatus::Yielded
            } else {
                TaskStatus::Done
            }
        });
        rt.wait_idle();
        assert_eq!(steps.load(StdOrdering::SeqCst), 10);
    }

    #[test]
    fn test_ready_reruns() {
        let rt = Runtime::with_workers(1);
        let steps = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&steps);
        rt.spawn(move |_ctx| {
            if s.fetch_add(1, StdOrdering::SeqCst) < 2 {
                TaskStatus::Ready
            } else {
                TaskStatus::Done
            }
        });
        rt.wait_idle();
        assert_eq!(steps.load(StdOrdering::SeqCst), 3);
    }

    #[test]
    fn test_await_after_delays() {
        let rt = Runtime::with_workers(2);
        let start = platform::monotonic_ns();
        let mut fired = false;
        rt.spawn(move |ctx| {
            if fired {
                return TaskStatus::Done;
            }
            fired = true;
            ctx.await_after(50);
            TaskStatus::Yielded
        });
        rt.wait_idle();
        let elapsed_ms = (platform::monotonic_ns() - start) / 1_000_000;
        assert!(elapsed_ms >= 50, "completed after {elapsed_ms} ms");
    }

    #[test]
    fn test_cancellation_observed() {
        let rt = Runtime::with_workers(1);
        let observed = Arc::new(AtomicU32::new(0));
        let obs = Arc::clone(&observed);
        let id = rt.spawn(move |ctx| {
            if ctx.cancelled() {
                obs.store(1, StdOrdering::SeqCst);
                return TaskStatus::Done;
            }
            ctx.await_after(10);
            TaskStatus::Yielded
        });
        std::thread::sleep(Duration::from_millis(30));
        assert!(rt.cancel(id));
        rt.wait_idle();
        assert_eq!(observed.load(StdOrdering::SeqCst), 1);
        // A finished task is no longer cancellable.
        assert!(!rt.cancel(id));
    }

    #[test]
    fn test_periodic_timer_fires_until_cancelled() {
        let rt = Runtime::with_workers(1);
        let fires = Arc::new(AtomicU32::new(0));
        let f = Arc::clone(&fires);
        let handle = rt.add_timer(5, 5, move || {
            f.fetch_add(1, StdOrdering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(100));
        handle.cancel();
        let count = fires.load(StdOrdering::SeqCst);
        assert!(count >= 2, "periodic timer fired {count} times");
        std::thread::sleep(Duration::from_millis(30));
        let after = fires.load(StdOrdering::SeqCst);
        assert!(after <= count + 1, "timer kept firing after cancel");
    }

    #[test]
    fn test_many_tasks_across_workers() {
        let rt = Runtime::with_workers(4);
        let total = Arc::new(AtomicU32::new(0));
        for i in 0..500u32 {
            let total = Arc::clone(&total);
            let mut yields = i % 3;
            rt.spawn(move |_ctx| {
                if yields > 0 {
                    yields -= 1;
                    return TaskStatus::Yielded;
                }
                total.fetch_add(1, StdOrdering::SeqCst);
                TaskStatus::Done
            });
        }
        rt.wait_idle();
        assert_eq!(total.load(StdOrdering::SeqCst), 500);
    }
}
