//! Synchronization primitives.
//!
//! * [`Shared`] / [`SharedWeak`] — atomically reference-counted cell.
//! * [`Local`] / [`LocalWeak`] — single-threaded twin, plain counters.
//! * [`Mutex`] / [`RwLock`] — platform-primitive locks whose guards release
//!   on drop; acquiring a poisoned lock is fatal.
//! * [`Atomic*`] — thin atomic wrappers with an explicit [`Ordering`].
//! * [`Barrier`], [`Once`], [`Condvar`].
//! * [`spin`] — const-constructible spinlocks for runtime internals.

pub mod spin;

mod atomic;
mod barrier;
mod condvar;
mod local;
mod mutex;
mod once;
mod shared;

pub use atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicPtr, AtomicU32, AtomicU64, Ordering,
};
pub use barrier::{Barrier, BarrierWaitResult};
pub use condvar::Condvar;
pub use local::{Local, LocalWeak};
pub use mutex::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use once::Once;
pub use shared::{Shared, SharedWeak};
