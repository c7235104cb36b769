//! Write Notifications
//!
//! A [`Janitor`] is told about every successful write so it can keep track
//! of key liveness. The [`Deleter`](crate::deleter::Deleter) is the main
//! implementation; [`NoJanitor`] leaves keys untracked.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

/// Observer of store writes.
pub trait Janitor<K>: Send + Sync {
    /// Records that `key` was written at `at`.
    ///
    /// May wait (for example on a full queue); that wait is the store's only
    /// backpressure.
    fn touch(&self, key: K, at: SystemTime) -> impl Future<Output = ()> + Send;
}

/// A janitor that ignores every write. Nothing is ever evicted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJanitor;

impl<K: Send> Janitor<K> for NoJanitor {
    async fn touch(&self, _key: K, _at: SystemTime) {}
}

impl<K, J> Janitor<K> for Arc<J>
where
    J: Janitor<K>,
{
    fn touch(&self, key: K, at: SystemTime) -> impl Future<Output = ()> + Send {
        (**self).touch(key, at)
    }
}
