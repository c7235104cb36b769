//! Deleter Module
//!
//! Background eviction for keys tracked by last-write time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  touch   ┌───────────────────────────────────────────┐
//! │   TtlStore   │ ───────> │                 Deleter                   │
//! └──────────────┘          │  ┌─────────────┐     ┌─────────────────┐  │
//!        ▲                  │  │ event queue │ ──> │ ingestion task  │  │
//!        │                  │  └─────────────┘     └────────┬────────┘  │
//!        │                  │                               ▼           │
//!        │                  │                     ┌──────────────────┐  │
//!        │   EvictHook      │                     │  LivenessTable   │  │
//!        └───────────────── │                     │  (Mutex)         │  │
//!                           │                     └──────────────────┘  │
//!                           │                               ▲           │
//!                           │                     ┌─────────┴───────┐   │
//!                           │                     │   sweep task    │   │
//!                           │                     └─────────────────┘   │
//!                           └───────────────────────────────────────────┘
//! ```
//!
//! Every sweep evicts in two steps:
//!
//! 1. **Age**: keys last touched more than `max_age` ago.
//! 2. **Count**: once more than `keep_num * 1.1` keys remain, the oldest are
//!    dropped until exactly `keep_num` are left. The oldest are found with a
//!    [`BoundedMaxHeap`] in one pass rather than by sorting the table.

pub mod config;
pub mod heap;
pub mod liveness;
pub mod sweeper;

// Re-export commonly used types
pub use config::{ConfigError, DeleterConfig};
pub use heap::BoundedMaxHeap;
pub use liveness::{hysteresis_threshold, LivenessTable, TimestampEvent};
pub use sweeper::{Deleter, DeleterError, DeleterProvider, DeleterStats, EvictHook, SweepReport};
