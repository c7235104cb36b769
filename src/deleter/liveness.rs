//! Liveness Table
//!
//! The deleter's source of truth: for every tracked key, the most recent
//! timestamp ever observed. The table itself is not synchronised; the
//! [`Deleter`](super::Deleter) keeps it behind a single mutex and every
//! operation here runs inside that critical section.

use super::heap::BoundedMaxHeap;
use crate::clock::unix_nanos;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::SystemTime;

/// A liveness update travelling from the store to the deleter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampEvent<K> {
    /// The key that was touched
    pub key: K,
    /// When it was touched, in nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
}

impl<K> TimestampEvent<K> {
    /// Creates an event from a raw nanosecond timestamp.
    pub fn new(key: K, timestamp_ns: i64) -> Self {
        Self { key, timestamp_ns }
    }

    /// Creates an event for a key touched at `at`.
    pub fn at(key: K, at: SystemTime) -> Self {
        Self::new(key, unix_nanos(at))
    }
}

/// Population at which count-based eviction kicks in: `ceil(keep * 1.1)`.
///
/// Waiting for a 10% overage avoids sweeping on every insert once the table
/// sits at its cap.
#[inline]
pub fn hysteresis_threshold(keep: usize) -> usize {
    keep.saturating_add(keep.div_ceil(10))
}

/// A removal candidate, ordered by timestamp only.
#[derive(Debug)]
struct Candidate<'a, K> {
    timestamp_ns: i64,
    key: &'a K,
}

impl<K> PartialEq for Candidate<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp_ns == other.timestamp_ns
    }
}

impl<K> Eq for Candidate<'_, K> {}

impl<K> PartialOrd for Candidate<'_, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Candidate<'_, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp_ns.cmp(&other.timestamp_ns)
    }
}

/// Map from key to the largest timestamp seen for it.
#[derive(Debug, Clone)]
pub struct LivenessTable<K> {
    entries: HashMap<K, i64>,
}

impl<K> Default for LivenessTable<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LivenessTable<K> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one observation into the table.
    ///
    /// The stored timestamp only ever grows: a late-arriving older event is
    /// ignored, a newer one always wins.
    ///
    /// Returns `true` if the stored value changed.
    pub fn record(&mut self, key: K, timestamp_ns: i64) -> bool {
        match self.entries.get_mut(&key) {
            Some(stored) if *stored >= timestamp_ns => false,
            Some(stored) => {
                *stored = timestamp_ns;
                true
            }
            None => {
                self.entries.insert(key, timestamp_ns);
                true
            }
        }
    }

    /// Applies an event. See [`record`](Self::record).
    #[inline]
    pub fn apply(&mut self, event: TimestampEvent<K>) -> bool {
        self.record(event.key, event.timestamp_ns)
    }

    /// Returns the last-seen timestamp for a key.
    pub fn get(&self, key: &K) -> Option<i64> {
        self.entries.get(key).copied()
    }

    /// Stops tracking a key without notifying anyone.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry strictly older than `threshold_ns`.
    ///
    /// `on_evict` sees each key just before its entry is dropped.
    ///
    /// Returns the number of entries removed.
    pub fn evict_stale<F>(&mut self, threshold_ns: i64, mut on_evict: F) -> usize
    where
        F: FnMut(&K),
    {
        let before = self.entries.len();
        self.entries.retain(|key, timestamp_ns| {
            if *timestamp_ns < threshold_ns {
                on_evict(key);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    /// Trims the table down to the `keep` most recently seen keys.
    ///
    /// Does nothing until the population reaches
    /// [`hysteresis_threshold(keep)`](hysteresis_threshold). Past that point
    /// the `len - keep` oldest entries are selected in a single pass through
    /// a [`BoundedMaxHeap`], handed to `on_evict` oldest first, and removed.
    ///
    /// Entries sharing a timestamp at the cut-off are chosen arbitrarily.
    ///
    /// Returns the number of entries removed.
    pub fn evict_excess<F>(&mut self, keep: usize, mut on_evict: F) -> usize
    where
        F: FnMut(&K),
    {
        let population = self.entries.len();
        if population < hysteresis_threshold(keep) {
            return 0;
        }

        let to_remove = population.saturating_sub(keep);
        if to_remove == 0 {
            return 0;
        }

        let mut oldest = BoundedMaxHeap::new(to_remove);
        for (key, &timestamp_ns) in &self.entries {
            oldest.push(Candidate { timestamp_ns, key });
        }

        let victims: Vec<K> = oldest
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| candidate.key.clone())
            .collect();

        for key in &victims {
            on_evict(key);
            self.entries.remove(key);
        }

        victims.len()
    }

    /// Iterates over `(key, timestamp_ns)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, i64)> {
        self.entries.iter().map(|(key, ts)| (key, *ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SAMPLE: [(&str, i64); 7] = [
        ("1", 10),
        ("2", 20),
        ("3", 15),
        ("4", 25),
        ("5", 5),
        ("6", 17),
        ("7", 14),
    ];

    fn sample_table() -> LivenessTable<String> {
        let mut table = LivenessTable::new();
        for (key, ts) in SAMPLE {
            table.record(key.to_string(), ts);
        }
        table
    }

    fn keys(table: &LivenessTable<String>) -> HashSet<String> {
        table.iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_record_keeps_maximum_regardless_of_order() {
        let mut table = LivenessTable::new();

        assert!(table.record("k", 50));
        assert!(!table.record("k", 10));
        assert!(!table.record("k", 50));
        assert_eq!(table.get(&"k"), Some(50));

        assert!(table.record("k", 70));
        assert_eq!(table.get(&"k"), Some(70));

        let mut reversed = LivenessTable::new();
        for ts in [70, 10, 50] {
            reversed.record("k", ts);
        }
        assert_eq!(reversed.get(&"k"), Some(70));
    }

    #[test]
    fn test_apply_event() {
        let mut table = LivenessTable::new();
        table.apply(TimestampEvent::new(1u32, 5));
        table.apply(TimestampEvent::new(1u32, 3));
        assert_eq!(table.get(&1), Some(5));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_hysteresis_threshold() {
        assert_eq!(hysteresis_threshold(0), 0);
        assert_eq!(hysteresis_threshold(3), 4);
        assert_eq!(hysteresis_threshold(10), 11);
        assert_eq!(hysteresis_threshold(11), 13);
        assert_eq!(hysteresis_threshold(100), 110);
    }

    #[test]
    fn test_evict_excess_keeps_newest() {
        let mut table = sample_table();
        let mut evicted = HashSet::new();

        let removed = table.evict_excess(3, |k| {
            evicted.insert(k.clone());
        });

        assert_eq!(removed, 4);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&"2".to_string()), Some(20));
        assert_eq!(table.get(&"4".to_string()), Some(25));
        assert_eq!(table.get(&"6".to_string()), Some(17));

        let expected: HashSet<String> =
            ["1", "3", "5", "7"].iter().map(|s| s.to_string()).collect();
        assert_eq!(evicted, expected);
    }

    #[test]
    fn test_evict_excess_reports_oldest_first() {
        let mut table = sample_table();
        let mut order = Vec::new();
        table.evict_excess(3, |k| order.push(k.clone()));
        assert_eq!(order, vec!["5", "1", "7", "3"]);
    }

    #[test]
    fn test_evict_excess_below_hysteresis_is_noop() {
        let mut table = LivenessTable::new();
        for i in 0..10i64 {
            table.record(i, i);
        }

        // keep 10 -> threshold 11, population 10
        assert_eq!(table.evict_excess(10, |_| panic!("no eviction")), 0);
        // keep 9 -> threshold 10, population 10: trims one
        let mut evicted = Vec::new();
        assert_eq!(table.evict_excess(9, |k| evicted.push(*k)), 1);
        assert_eq!(evicted, vec![0]);

        // keep 9 with population 9: threshold 10 not reached
        assert_eq!(table.evict_excess(9, |_| panic!("no eviction")), 0);
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn test_evict_excess_zero_keep_clears_table() {
        let mut table = sample_table();
        assert_eq!(table.evict_excess(0, |_| {}), 7);
        assert!(table.is_empty());

        assert_eq!(table.evict_excess(0, |_| panic!("empty")), 0);
    }

    #[test]
    fn test_evict_excess_retains_exactly_largest_set() {
        let mut table = LivenessTable::new();
        // Distinct scrambled timestamps.
        for i in 0..500u64 {
            table.record(i, ((i * 7919) % 500) as i64);
        }

        let removed = table.evict_excess(200, |_| {});
        assert_eq!(removed, 300);
        assert_eq!(table.len(), 200);
        assert!(table.iter().all(|(_, ts)| ts >= 300));
    }

    #[test]
    fn test_evict_excess_with_ties_still_hits_target() {
        let mut table = LivenessTable::new();
        for i in 0..20u32 {
            table.record(i, if i < 15 { 1 } else { 2 });
        }

        assert_eq!(table.evict_excess(10, |_| {}), 10);
        assert_eq!(table.len(), 10);
        // All five newest survive; the rest are an arbitrary pick of the ties.
        for i in 15..20u32 {
            assert_eq!(table.get(&i), Some(2));
        }
    }

    #[test]
    fn test_evict_stale() {
        let mut table = sample_table();
        table.record("8".to_string(), 10_000);

        let mut evicted = HashSet::new();
        let removed = table.evict_stale(16, |k| {
            evicted.insert(k.clone());
        });

        assert_eq!(removed, 4);
        let expected: HashSet<String> =
            ["1", "3", "5", "7"].iter().map(|s| s.to_string()).collect();
        assert_eq!(evicted, expected);
        assert!(table.iter().all(|(_, ts)| ts >= 16));
        assert_eq!(
            keys(&table),
            ["2", "4", "6", "8"]
                .iter()
                .map(|s| s.to_string())
                .collect::<HashSet<String>>()
        );
    }

    #[test]
    fn test_evict_stale_is_idempotent() {
        let mut table = sample_table();
        assert_eq!(table.evict_stale(15, |_| {}), 3);
        assert_eq!(table.evict_stale(15, |_| panic!("already swept")), 0);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_evict_stale_threshold_is_exclusive() {
        let mut table = LivenessTable::new();
        table.record("edge", 100);
        assert_eq!(table.evict_stale(100, |_| {}), 0);
        assert_eq!(table.evict_stale(101, |_| {}), 1);
    }

    #[test]
    fn test_remove() {
        let mut table = sample_table();
        assert!(table.remove(&"1".to_string()));
        assert!(!table.remove(&"1".to_string()));
        assert_eq!(table.len(), 6);
    }
}
