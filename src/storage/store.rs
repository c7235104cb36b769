//! Thread-Safe Key/Value Store with Write Notifications
//!
//! A concurrent map that tells its [`Janitor`] about every write. Paired
//! with a [`Deleter`], values that go unwritten for too long, or that fall
//! outside the retention target, are removed in the background.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TtlStore                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └──────────────┬───────────────────────────────▲──────────────┘
//!                │ touch(key, now)               │ delete(key)
//!                ▼                               │
//!           ┌─────────────────────────────────────────┐
//!           │                 Deleter                 │
//!           └─────────────────────────────────────────┘
//! ```
//!
//! The shard lock is released before the janitor is notified, so a slow
//! janitor never blocks readers.

use crate::clock::{Clock, SystemClock};
use crate::deleter::{Deleter, DeleterProvider, EvictHook};
use crate::storage::{Janitor, NoJanitor};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Number of shards in a store.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the key-value pairs.
struct Shard<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> Shard<K, V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of keys held
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
}

/// A sharded concurrent map that notifies a janitor on every write.
///
/// # Example
///
/// ```
/// use sweepkv::deleter::{DeleterConfig, DeleterProvider};
/// use sweepkv::storage::TtlStore;
///
/// # tokio_test::block_on(async {
/// let provider = DeleterProvider::new(DeleterConfig::default()).unwrap();
/// let store = TtlStore::<String, u32, _>::with_deleter(&provider, "users");
///
/// store.deleter().start().unwrap();
/// store.set("alice".to_string(), 42).await;
/// assert_eq!(store.get(&"alice".to_string()), Some(42));
///
/// store.deleter().stop().await.unwrap();
/// assert_eq!(store.deleter().len(), 1);
/// # });
/// ```
pub struct TtlStore<K, V, J = NoJanitor> {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard<K, V>>,

    /// Told about every successful write
    janitor: J,

    /// Source of the write timestamps handed to the janitor
    clock: Arc<dyn Clock>,

    /// Statistics: total number of keys
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,
}

impl<K, V, J> fmt::Debug for TtlStore<K, V, J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlStore")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for TtlStore<K, V, NoJanitor>
where
    K: Eq + Hash + Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlStore<K, V, NoJanitor>
where
    K: Eq + Hash + Clone + Send,
{
    /// Creates a store whose writes are not tracked.
    pub fn new() -> Self {
        Self::with_janitor(NoJanitor)
    }
}

impl<K, V> TtlStore<K, V, Arc<Deleter<K>>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a store and a deleter wired to each other.
    ///
    /// Writes feed the deleter; the deleter's evictions delete from the
    /// store. The deleter only holds a weak reference back, so dropping the
    /// store is not prevented by a running deleter.
    ///
    /// The deleter is returned stopped: call `store.deleter().start()`.
    pub fn with_deleter(provider: &DeleterProvider, name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this: &Weak<Self>| {
            let store = Weak::clone(this);
            let hook: EvictHook<K> = Arc::new(move |key: &K| {
                if let Some(store) = store.upgrade() {
                    store.delete(key);
                }
            });
            let deleter = Arc::new(provider.provide(name, Some(hook)));
            Self::with_janitor(deleter).with_clock(provider.clock())
        })
    }

    /// The deleter tracking this store.
    pub fn deleter(&self) -> &Arc<Deleter<K>> {
        &self.janitor
    }
}

impl<K, V, J> TtlStore<K, V, J>
where
    K: Eq + Hash + Clone + Send,
    J: Janitor<K>,
{
    /// Creates an empty store reporting writes to `janitor`.
    pub fn with_janitor(janitor: J) -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            janitor,
            clock: Arc::new(SystemClock),
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
        }
    }

    /// Replaces the clock used to timestamp writes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The janitor receiving write notifications.
    pub fn janitor(&self) -> &J {
        &self.janitor
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.shard_index(key)]
    }

    /// Stores a value, then tells the janitor the key was touched.
    ///
    /// Waits if the janitor applies backpressure.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub async fn set(&self, key: K, value: V) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let is_new = {
            let mut data = self.shard(&key).data.write();
            let is_new = data.insert(key.clone(), value).is_none();
            // Counted under the lock so a racing delete never sees it at zero.
            if is_new {
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
            is_new
        };

        self.janitor.touch(key, self.clock.now()).await;
        is_new
    }

    /// Gets a copy of the value for a key.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.shard(key).data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    pub fn has(&self, key: &K) -> bool {
        self.shard(key).data.read().contains_key(key)
    }

    /// Deletes a key.
    ///
    /// The janitor is not told; a deleter keeps tracking the key until its
    /// next eviction, which is then a no-op here.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &K) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        if self.shard(key).data.write().remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Returns the number of keys in the store.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
        }
    }
}
