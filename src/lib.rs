//! # sweepkv - A Key/Value Store That Cleans Up After Itself
//!
//! sweepkv pairs a concurrent in-memory key/value store with a background
//! *deleter* that tracks when every key was last written and evicts keys
//! that are too old or too many.
//!
//! ## Features
//!
//! - **Age-Based Eviction**: keys not written for `max_age` are removed
//! - **Count-Based Eviction**: the table is trimmed to the `keep_num` most
//!   recently written keys once it overshoots by 10%
//! - **Top-K Selection**: the oldest keys are picked in `O(n log k)` with a
//!   bounded heap, no full sort
//! - **Backpressure**: writes feed a bounded queue; producers wait instead of
//!   buffering without limit
//! - **Clean Shutdown**: both background loops are joined and every queued
//!   update is applied before `stop` returns
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               sweepkv                                   │
//! │                                                                         │
//! │  ┌─────────────┐  set   ┌──────────────────────────────────────────────┐│
//! │  │ Application │──────> │                  TtlStore                    ││
//! │  └─────────────┘        │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ ││
//! │                         │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ ││
//! │                         │  └────────┘ └────────┘ └────────┘ └────────┘ ││
//! │                         └───────┬──────────────────────────▲───────────┘│
//! │                                 │ touch(key, now)          │ delete     │
//! │                                 ▼                          │            │
//! │                     ┌──────────────────────────────────────┴──────────┐ │
//! │                     │                   Deleter                       │ │
//! │                     │   ingestion task ──> LivenessTable <── sweeps   │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use sweepkv::deleter::{DeleterConfig, DeleterProvider};
//! use sweepkv::storage::TtlStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeleterConfig::default()
//!         .with_max_age(Duration::from_secs(600))
//!         .with_sweep_interval(Duration::from_secs(20))
//!         .with_keep_num(200_000);
//!     let provider = DeleterProvider::new(config)?;
//!
//!     // Store and deleter wired both ways
//!     let sessions = TtlStore::<String, Vec<u8>, _>::with_deleter(&provider, "sessions");
//!     sessions.deleter().start()?;
//!
//!     sessions.set("alice".to_string(), b"token".to_vec()).await;
//!
//!     sessions.deleter().stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the sharded store and the [`Janitor`](storage::Janitor)
//!   write-notification trait
//! - [`deleter`]: liveness tracking, eviction, and the bounded heap
//! - [`clock`]: injectable time sources
//!
//! ## Usage Contract
//!
//! The eviction hook runs while the deleter's table is locked. It must not
//! call back into the same deleter.

pub mod clock;
pub mod deleter;
pub mod storage;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use deleter::{
    BoundedMaxHeap, Deleter, DeleterConfig, DeleterError, DeleterProvider, EvictHook,
    SweepReport,
};
pub use storage::{Janitor, NoJanitor, TtlStore};

/// Version of sweepkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
