//! Single-producer / single-consumer ring of fixed-size records.
//!
//! Head and tail are monotonically increasing counters on separate cache
//! lines; masking by `N - 1` gives the slot. The producer acquire-loads
//! the tail before deciding free capacity and release-stores the head
//! after writing records; the consumer mirrors with head/tail swapped. No
//! other synchronisation exists between the two sides.
//!
//! The ring never blocks: a full ring is reported to the producer by a
//! short (possibly zero) write, an empty ring to the consumer by a
//! zero-length pop.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(align(64))]
struct CachePadded<T>(T);

/// Bounded lock-free SPSC queue with compile-time power-of-two capacity.
///
/// Exactly one thread may push and exactly one thread may pop; both take
/// `&self` so the book can own the ring while a consumer drains it.
pub struct SpscRing<T, const N: usize> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Producer position; only the producer stores it.
    head: CachePadded<AtomicUsize>,
    /// Consumer position; only the consumer stores it.
    tail: CachePadded<AtomicUsize>,
}

// Safety: slot (head..tail) ownership is handed over exclusively through
// the release/acquire pairs on head and tail; with one producer and one
// consumer no slot is ever accessed from two threads at once.
unsafe impl<T: Send, const N: usize> Send for SpscRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscRing<T, N> {}

impl<T: Copy, const N: usize> SpscRing<T, N> {
    const MASK: usize = N - 1;

    pub fn new() -> Self {
        assert!(N.is_power_of_two(), "ring capacity must be a power of two");
        let mut slots = Vec::with_capacity(N);
        slots.resize_with(N, || UnsafeCell::new(MaybeUninit::uninit()));
        Self {
            slots: slots.into_boxed_slice(),
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
        }
    }

    /// Write up to `src.len()` records, bounded by free capacity.
    /// Returns the number written; the caller accounts the shortfall.
    pub fn push_batch(&self, src: &[T]) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);
        let free = N - head.wrapping_sub(tail);
        let n = src.len().min(free);

        for (i, item) in src[..n].iter().enumerate() {
            let slot = head.wrapping_add(i) & Self::MASK;
            // Safety: slots in [head, head + free) are owned by the producer.
            unsafe {
                (*self.slots[slot].get()).write(*item);
            }
        }

        self.head.0.store(head.wrapping_add(n), Ordering::Release);
        n
    }

    /// Push a single record; `false` if the ring is full.
    pub fn try_push(&self, item: T) -> bool {
        self.push_batch(std::slice::from_ref(&item)) == 1
    }

    /// Pop a single record; `None` if the ring is empty.
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let head = self.head.0.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // Safety: slots in [tail, head) hold initialised records owned by
        // the consumer.
        let item = unsafe { (*self.slots[tail & Self::MASK].get()).assume_init_read() };
        self.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Pop up to `max` records into `out`. Returns the number popped.
    pub fn pop_batch(&self, out: &mut Vec<T>, max: usize) -> usize {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let head = self.head.0.load(Ordering::Acquire);
        let n = head.wrapping_sub(tail).min(max);

        for i in 0..n {
            let slot = tail.wrapping_add(i) & Self::MASK;
            // Safety: as in try_pop.
            let item = unsafe { (*self.slots[slot].get()).assume_init_read() };
            out.push(item);
        }

        self.tail.0.store(tail.wrapping_add(n), Ordering::Release);
        n
    }

    /// Approximate occupancy; both indices read relaxed.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T: Copy, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
