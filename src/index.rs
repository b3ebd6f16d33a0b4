//! Order index - dense map from external order id to book location.
//!
//! Ids are dense enough that direct indexing is acceptable; the vector
//! doubles on demand. Entries persist for the lifetime of the process and
//! only their `active` flag and payload change, so lookups never allocate.

use crate::pool::PoolIndex;

const LOC_BUY: u8 = 0x01;
const LOC_ACTIVE: u8 = 0x02;

/// Where a live order currently lives.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderLocation {
    /// Resting price in ticks.
    pub price: i64,
    /// Slot in the order pool.
    pub pool_idx: PoolIndex,
    flags: u8,
}

impl OrderLocation {
    #[inline]
    pub fn is_buy(&self) -> bool {
        self.flags & LOC_BUY != 0
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags & LOC_ACTIVE != 0
    }

    #[inline]
    pub fn set_buy(&mut self, v: bool) {
        if v {
            self.flags |= LOC_BUY;
        } else {
            self.flags &= !LOC_BUY;
        }
    }

    #[inline]
    pub fn set_active(&mut self, v: bool) {
        if v {
            self.flags |= LOC_ACTIVE;
        } else {
            self.flags &= !LOC_ACTIVE;
        }
    }
}

/// Growable direct-indexed vector of order locations.
pub struct OrderIndex {
    slots: Vec<OrderLocation>,
    max_order_id: u64,
}

impl OrderIndex {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            slots: vec![OrderLocation::default(); initial_capacity.max(1)],
            max_order_id: 0,
        }
    }

    /// Grow so `order_id` is addressable; doubles at minimum.
    #[inline]
    pub fn ensure_capacity(&mut self, order_id: u64) {
        let id = order_id as usize;
        if id >= self.slots.len() {
            let new_len = (id + 1).max(self.slots.len() * 2);
            self.slots.resize(new_len, OrderLocation::default());
        }
        if order_id > self.max_order_id {
            self.max_order_id = order_id;
        }
    }

    /// Location of an id, if it is in range and currently active.
    #[inline]
    pub fn get_active(&self, order_id: u64) -> Option<&OrderLocation> {
        self.slots
            .get(order_id as usize)
            .filter(|loc| loc.is_active())
    }

    /// Mutable access without the active filter; `None` if out of range.
    ///
    /// No allocation happens on this path - callers referencing unknown
    /// ids get a silent no-op.
    #[inline]
    pub fn get_mut(&mut self, order_id: u64) -> Option<&mut OrderLocation> {
        self.slots.get_mut(order_id as usize)
    }

    /// Record where a resting order lives and mark it active.
    #[inline]
    pub fn assign(&mut self, order_id: u64, price: i64, pool_idx: PoolIndex, is_buy: bool) {
        self.ensure_capacity(order_id);
        let loc = &mut self.slots[order_id as usize];
        loc.price = price;
        loc.pool_idx = pool_idx;
        loc.flags = 0;
        loc.set_buy(is_buy);
        loc.set_active(true);
    }

    /// Deactivate every assigned entry; capacity is retained.
    pub fn deactivate_all(&mut self) {
        let upto = (self.max_order_id as usize + 1).min(self.slots.len());
        for loc in &mut self.slots[..upto] {
            loc.set_active(false);
        }
    }

    /// All currently active `(order_id, location)` pairs.
    pub fn active_entries(&self) -> impl Iterator<Item = (u64, &OrderLocation)> + '_ {
        let upto = (self.max_order_id as usize + 1).min(self.slots.len());
        self.slots[..upto]
            .iter()
            .enumerate()
            .filter(|(_, loc)| loc.is_active())
            .map(|(id, loc)| (id as u64, loc))
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
