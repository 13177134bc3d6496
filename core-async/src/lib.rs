//! Async runtime facade for the music service core.
//!
//! Every core-* crate reaches tokio through this crate instead of depending on
//! it directly, so the executor, channel flavours and cancellation primitive
//! used across the workspace stay in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, timeouts, durations
//! - `sync`: Channels, locks and the cooperative [`sync::CancellationToken`]
//! - `runtime`: Executor detection and blocking bridge for sync call sites
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!
//!     let handle = task::spawn(async move {
//!         tokio::select! {
//!             _ = child.cancelled() => None,
//!             _ = sleep(Duration::from_secs(1)) => Some(42),
//!         }
//!     });
//!
//!     token.cancel();
//!     assert_eq!(handle.await.ok().flatten(), None);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

// Re-export commonly used types at crate root for convenience
pub use sync::CancellationToken;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};

// Macros, so callers never name tokio directly
pub use tokio::{join, select};
