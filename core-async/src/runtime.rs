//! Runtime utilities.
//!
//! Downstream crates use these instead of reaching for Tokio directly when
//! they need to detect or drive an executor from synchronous code (for
//! example the tracing layer that forwards events to a host logger).

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on the calling thread.
///
/// Only for synchronous call sites that are outside any runtime; inside a
/// runtime, spawn onto [`Handle::try_current`] instead.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    futures::executor::block_on(future)
}
