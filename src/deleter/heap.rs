//! Bounded Max Heap (Top-K Accumulator)
//!
//! Selects the `k` smallest items from a stream in one pass, touching the
//! heap `O(log k)` times per item instead of sorting everything.
//!
//! ## How It Works
//!
//! ```text
//!   push ──> [ filling: plain Vec, no ordering ]
//!                     │  len reaches k
//!                     ▼  heapify once, O(k)
//!            [ armed: BinaryHeap, largest on top ]
//!                     │  every further push
//!                     ▼
//!        new < top ?  replace top and sift down : reject new
//! ```
//!
//! Between pops, the heap holds the `k` smallest items pushed so far. The
//! item on top is the largest of those, so it is the first to be displaced.
//! A `pop` frees a slot, and the next push fills it without comparing.

use std::collections::BinaryHeap;
use std::mem;

/// Storage for the accumulator.
#[derive(Debug)]
enum Slots<T> {
    /// Fewer than `capacity` items; no heap order is maintained yet.
    Filling(Vec<T>),
    /// Full at least once; heap order holds.
    Armed(BinaryHeap<T>),
}

/// A max heap that never holds more than `capacity` items.
///
/// Pushing into a full heap keeps the smaller of the new item and the
/// current maximum, so after any sequence of pushes the heap contains the
/// `capacity` smallest items seen.
///
/// Items that compare equal are interchangeable; which of them survives is
/// unspecified.
///
/// # Example
///
/// ```
/// use sweepkv::deleter::BoundedMaxHeap;
///
/// let mut oldest = BoundedMaxHeap::new(3);
/// for ts in [10, 20, 15, 25, 5, 17, 14] {
///     oldest.push(ts);
/// }
/// assert_eq!(oldest.peek(), Some(&14));
/// assert_eq!(oldest.into_sorted_vec(), vec![5, 10, 14]);
/// ```
#[derive(Debug)]
pub struct BoundedMaxHeap<T> {
    slots: Slots<T>,
    capacity: usize,
}

impl<T: Ord> BoundedMaxHeap<T> {
    /// Creates an empty heap that keeps at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Slots::Filling(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of items retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::Filling(items) => items.len(),
            Slots::Armed(heap) => heap.len(),
        }
    }

    /// Returns true if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once `capacity` items are held.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Offers an item.
    ///
    /// Returns the item that did not make the cut: `None` while the heap has
    /// room (including room freed by [`pop`](Self::pop)), otherwise either
    /// `item` itself or the previous maximum it displaced.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }

        match &mut self.slots {
            Slots::Filling(items) => {
                items.push(item);
                if items.len() >= self.capacity {
                    self.arm();
                }
                None
            }
            Slots::Armed(heap) if heap.len() < self.capacity => {
                heap.push(item);
                None
            }
            Slots::Armed(heap) => match heap.peek_mut() {
                Some(mut top) if item < *top => Some(mem::replace(&mut *top, item)),
                _ => Some(item),
            },
        }
    }

    /// Returns the largest item held.
    pub fn peek(&self) -> Option<&T> {
        match &self.slots {
            Slots::Filling(items) => items.iter().max(),
            Slots::Armed(heap) => heap.peek(),
        }
    }

    /// Removes and returns the largest item held.
    pub fn pop(&mut self) -> Option<T> {
        self.arm();
        match &mut self.slots {
            Slots::Armed(heap) => heap.pop(),
            Slots::Filling(_) => None,
        }
    }

    /// Consumes the heap, returning the held items in arbitrary order.
    pub fn into_vec(self) -> Vec<T> {
        match self.slots {
            Slots::Filling(items) => items,
            Slots::Armed(heap) => heap.into_vec(),
        }
    }

    /// Consumes the heap, returning the held items in ascending order.
    pub fn into_sorted_vec(self) -> Vec<T> {
        match self.slots {
            Slots::Filling(mut items) => {
                items.sort_unstable();
                items
            }
            Slots::Armed(heap) => heap.into_sorted_vec(),
        }
    }

    /// Switches from filling to heap order (a single `O(len)` heapify).
    fn arm(&mut self) {
        if let Slots::Filling(items) = &mut self.slots {
            let items = mem::take(items);
            self.slots = Slots::Armed(BinaryHeap::from(items));
        }
    }
}
