//! Storage Module
//!
//! The key/value side of the crate: a sharded concurrent map that reports
//! every write to a [`Janitor`]. Wire it to a
//! [`Deleter`](crate::deleter::Deleter) and old or surplus keys disappear on
//! their own.
//!
//! ## Example
//!
//! ```
//! use sweepkv::storage::TtlStore;
//!
//! # tokio_test::block_on(async {
//! // A store with no janitor keeps everything.
//! let store = TtlStore::new();
//! store.set("name", "Ariz").await;
//! assert_eq!(store.get(&"name"), Some("Ariz"));
//! assert!(store.delete(&"name"));
//! # });
//! ```

pub mod janitor;
pub mod store;

// Re-export commonly used types
pub use janitor::{Janitor, NoJanitor};
pub use store::{StoreStats, TtlStore};
