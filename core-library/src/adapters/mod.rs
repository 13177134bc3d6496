//! Database adapter implementations
//!
//! Concrete implementations of the `DatabaseAdapter` trait. Mobile hosts
//! inject their own adapter through the bridge instead.

pub mod sqlite_native;

pub use sqlite_native::SqliteAdapter;
