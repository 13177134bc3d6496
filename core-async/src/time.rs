//! Time-related abstractions.
//!
//! Re-exports `tokio::time` so that paused-clock tests
//! (`#[tokio::test(start_paused = true)]`) drive every timer in the core.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(10));
//! }
//! ```

pub use tokio::time::{interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses_on_paused_clock() {
        let result = timeout(Duration::from_secs(5), sleep(Duration::from_secs(60))).await;
        assert!(result.is_err());
    }
}
