//! Synchronization primitives.
//!
//! Async-aware channels and locks come from `tokio::sync`. Cooperative
//! cancellation comes from `tokio_util::sync`: a parent token is cancelled on
//! teardown and every in-flight fetch holds a child token, so cancelling the
//! parent reaches all of them without bookkeeping.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! let (tx, rx) = watch::channel(0u32);
//! tx.send_replace(1);
//! assert_eq!(*rx.borrow(), 1);
//!
//! let parent = CancellationToken::new();
//! let child = parent.child_token();
//! parent.cancel();
//! assert!(child.is_cancelled());
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
