//! Order book - dense price-level arrays, bitmap best tracking, and the
//! public operation surface.
//!
//! One book per instance, single writer. Every mutator takes `&mut self`;
//! [`SharedBook`] wraps the same core behind a reader-writer lock for
//! mixed deployments, so the inner matching code exists exactly once.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::bitmap::SideBitmap;
use crate::command::{AcceptEvent, CancelEvent, OutputEvent, Side, Tif, TradeEvent, BATCH_SIZE};
use crate::index::OrderIndex;
use crate::level::PriceLevel;
use crate::pool::{OrderPool, PoolIndex, NULL_INDEX};
use crate::ring::SpscRing;

/// Sentinel best-bid price when no bid is resting.
pub const NO_BID: i64 = -1;
/// Sentinel best-ask price when no ask is resting.
pub const NO_ASK: i64 = i64::MAX;

/// Offset subtracted from a price to obtain its level-array index.
pub const PRICE_OFFSET: i64 = 0;

/// Output ring capacity in records (compile-time power of two).
pub const OUTPUT_RING_SIZE: usize = 1 << 20;

/// The book's market-data output queue.
pub type OutputRing = SpscRing<OutputEvent, OUTPUT_RING_SIZE>;

/// Construction parameters. The core reads no environment or files.
#[derive(Clone, Copy, Debug)]
pub struct BookConfig {
    /// Initial order pool capacity; the pool doubles if exceeded.
    pub pool_capacity: u32,
    /// Price domain size per side; must be a non-zero multiple of 64.
    /// Prices are valid in `0 .. price_levels`.
    pub price_levels: usize,
    /// Stage events and push them into the output ring.
    pub use_output_ring: bool,
    /// Emit order-accepted events.
    pub emit_accepts: bool,
    /// Emit order-cancelled events.
    pub emit_cancels: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 1 << 20,
            price_levels: 1 << 25,
            use_output_ring: true,
            emit_accepts: true,
            emit_cancels: true,
        }
    }
}

impl BookConfig {
    /// Config with an explicit pool size and price domain, events on.
    pub fn sized(pool_capacity: u32, price_levels: usize) -> Self {
        Self {
            pool_capacity,
            price_levels,
            ..Self::default()
        }
    }
}

/// Enumerated result of a mutating operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpOutcome {
    /// The order rests in the book with no fills.
    Rested,
    /// Matching produced fills; nothing rested afterwards.
    Executed { trades: u32 },
    /// Matching produced fills and the residual rested.
    ExecutedAndRested { trades: u32 },
    /// A resting order was removed; `quantity` is visible + hidden.
    Cancelled { quantity: i64 },
    /// Client error or infeasible request; book state unchanged.
    NoOp,
}

/// The matching core. Single writer; observers are `&self`.
pub struct OrderBook {
    pub(crate) bid_levels: Box<[PriceLevel]>,
    pub(crate) ask_levels: Box<[PriceLevel]>,
    pub(crate) bid_bitmap: SideBitmap,
    pub(crate) ask_bitmap: SideBitmap,

    pub(crate) best_bid: i64,
    pub(crate) best_ask: i64,
    /// Word of the current best bid; an upper bound for the rescan.
    pub(crate) best_bid_word: i64,
    /// Word of the current best ask; a lower bound for the rescan.
    pub(crate) best_ask_word: usize,

    pub(crate) bid_level_count: u32,
    pub(crate) ask_level_count: u32,

    pub(crate) pool: OrderPool,
    pub(crate) index: OrderIndex,
    pub(crate) active_orders: usize,
    pub(crate) price_levels: usize,

    output: Arc<OutputRing>,
    use_output_ring: bool,
    emit_accepts: bool,
    emit_cancels: bool,
    batch: Vec<OutputEvent>,

    pub(crate) timestamp: u64,
    pub(crate) trades_executed: u64,
    pub(crate) messages_dropped: u64,
}

impl OrderBook {
    /// # Panics
    /// Panics if `config.price_levels` is zero or not a multiple of 64.
    pub fn new(config: BookConfig) -> Self {
        assert!(
            config.price_levels > 0 && config.price_levels % 64 == 0,
            "price domain must be a non-zero multiple of 64"
        );
        tracing::debug!(
            pool_capacity = config.pool_capacity,
            price_levels = config.price_levels,
            "constructing order book"
        );

        Self {
            bid_levels: vec![PriceLevel::new(); config.price_levels].into_boxed_slice(),
            ask_levels: vec![PriceLevel::new(); config.price_levels].into_boxed_slice(),
            bid_bitmap: SideBitmap::new(config.price_levels),
            ask_bitmap: SideBitmap::new(config.price_levels),
            best_bid: NO_BID,
            best_ask: NO_ASK,
            best_bid_word: -1,
            best_ask_word: 0,
            bid_level_count: 0,
            ask_level_count: 0,
            pool: OrderPool::new(config.pool_capacity),
            index: OrderIndex::new(config.pool_capacity as usize),
            active_orders: 0,
            price_levels: config.price_levels,
            output: Arc::new(OutputRing::new()),
            use_output_ring: config.use_output_ring,
            emit_accepts: config.emit_accepts,
            emit_cancels: config.emit_cancels,
            batch: Vec::with_capacity(BATCH_SIZE),
            timestamp: 0,
            trades_executed: 0,
            messages_dropped: 0,
        }
    }

    #[inline]
    pub(crate) fn price_to_index(price: i64) -> usize {
        (price - PRICE_OFFSET) as usize
    }

    #[inline]
    pub(crate) fn index_to_price(idx: usize) -> i64 {
        idx as i64 + PRICE_OFFSET
    }

    #[inline]
    pub(crate) fn in_domain(&self, price: i64) -> bool {
        price >= PRICE_OFFSET && ((price - PRICE_OFFSET) as usize) < self.price_levels
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Add a limit order. Aggressive iff it would cross the opposite best,
    /// in which case it is matched with GTC semantics; otherwise it rests.
    pub fn add_order(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        user_id: u64,
    ) -> OpOutcome {
        if quantity <= 0 || !self.in_domain(price) {
            return OpOutcome::NoOp;
        }

        let aggressive = match side {
            Side::Buy => self.best_ask != NO_ASK && price >= self.best_ask,
            Side::Sell => self.best_bid != NO_BID && price <= self.best_bid,
        };

        let outcome = if aggressive {
            self.match_incoming(order_id, user_id, side, price, quantity, Tif::Gtc)
        } else {
            self.rest(order_id, user_id, side, price, quantity, 0, 0, false);
            OpOutcome::Rested
        };
        self.note_if_crossed();
        outcome
    }

    /// Rest an iceberg order: `visible_quantity` displayed at a time, the
    /// remainder held in hidden reserve.
    pub fn add_iceberg(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        total_quantity: i64,
        visible_quantity: i64,
        user_id: u64,
    ) -> OpOutcome {
        if total_quantity <= 0 || visible_quantity <= 0 || !self.in_domain(price) {
            return OpOutcome::NoOp;
        }

        let display = visible_quantity.min(total_quantity);
        let hidden = total_quantity - display;
        self.rest(order_id, user_id, side, price, display, hidden, visible_quantity, false);
        OpOutcome::Rested
    }

    /// Rest an all-or-none order.
    pub fn add_aon(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        user_id: u64,
    ) -> OpOutcome {
        if quantity <= 0 || !self.in_domain(price) {
            return OpOutcome::NoOp;
        }
        self.rest(order_id, user_id, side, price, quantity, 0, 0, true);
        OpOutcome::Rested
    }

    /// Cancel a resting order. Unknown or inactive ids are a silent no-op.
    /// Returns the cancelled quantity (visible + hidden).
    pub fn cancel_order(&mut self, order_id: u64) -> Option<i64> {
        let loc = *self.index.get_active(order_id)?;
        let pidx = Self::price_to_index(loc.price);
        let side = Side::from_buy(loc.is_buy());
        let rec = *self.pool.get(loc.pool_idx);
        let cancelled = rec.total();

        {
            let level = match side {
                Side::Buy => &mut self.bid_levels[pidx],
                Side::Sell => &mut self.ask_levels[pidx],
            };
            level.remove_volume(&rec);
            level.unlink(&mut self.pool, loc.pool_idx);
        }
        self.pool.free(loc.pool_idx);

        let emptied = match side {
            Side::Buy => self.bid_levels[pidx].is_empty(),
            Side::Sell => self.ask_levels[pidx].is_empty(),
        };
        if emptied {
            match side {
                Side::Buy => {
                    self.bid_level_count -= 1;
                    self.update_best_bid_after_remove(loc.price);
                }
                Side::Sell => {
                    self.ask_level_count -= 1;
                    self.update_best_ask_after_remove(loc.price);
                }
            }
        }

        if let Some(loc) = self.index.get_mut(order_id) {
            loc.set_active(false);
        }
        self.active_orders -= 1;

        self.emit_cancelled(order_id, cancelled);
        Some(cancelled)
    }

    /// Modify a resting order.
    ///
    /// Same price and a quantity at or below the current visible mutate in
    /// place, preserving FIFO position. Anything else is cancel-then-add
    /// under the same id; the re-add matches immediately if it crosses,
    /// and time priority is lost. The whole policy lives here so an
    /// alternate one can be substituted without touching the matching walk.
    pub fn modify_order(&mut self, order_id: u64, new_price: i64, new_quantity: i64) -> OpOutcome {
        if new_quantity <= 0 {
            return OpOutcome::NoOp;
        }
        let loc = match self.index.get_active(order_id) {
            Some(loc) => *loc,
            None => return OpOutcome::NoOp,
        };
        let side = Side::from_buy(loc.is_buy());
        let (visible, user_id, aon) = {
            let rec = self.pool.get(loc.pool_idx);
            (rec.visible, rec.user_id, rec.is_aon())
        };

        if new_price == loc.price && new_quantity <= visible {
            let delta = new_quantity - visible;
            let pidx = Self::price_to_index(loc.price);
            let level = match side {
                Side::Buy => &mut self.bid_levels[pidx],
                Side::Sell => &mut self.ask_levels[pidx],
            };
            level.adjust_volume(delta, 0, aon);
            self.pool.get_mut(loc.pool_idx).visible = new_quantity;
            return OpOutcome::Rested;
        }

        self.cancel_order(order_id);
        if !self.in_domain(new_price) {
            return OpOutcome::NoOp;
        }
        self.add_order(order_id, side, new_price, new_quantity, user_id)
    }

    /// Aggress the book with an explicit time-in-force. See the matching
    /// walk for FOK/AON feasibility semantics.
    pub fn execute(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
        user_id: u64,
    ) -> OpOutcome {
        if quantity <= 0 {
            return OpOutcome::NoOp;
        }
        let outcome = self.match_incoming(order_id, user_id, side, price, quantity, tif);
        if tif != Tif::Aon {
            self.note_if_crossed();
        }
        outcome
    }

    /// Return the book to the empty state. Arrays are not shrunk.
    pub fn reset(&mut self) {
        for level in self.bid_levels.iter_mut() {
            level.reset();
        }
        for level in self.ask_levels.iter_mut() {
            level.reset();
        }
        self.bid_bitmap.clear_all();
        self.ask_bitmap.clear_all();
        self.best_bid = NO_BID;
        self.best_ask = NO_ASK;
        self.best_bid_word = -1;
        self.best_ask_word = 0;
        self.bid_level_count = 0;
        self.ask_level_count = 0;
        self.pool.reset();
        self.index.deactivate_all();
        self.active_orders = 0;
        self.batch.clear();
        tracing::debug!("book reset");
    }

    // ========================================================================
    // Resting and best-price maintenance (shared by add and matching)
    // ========================================================================

    /// Link a new record into its level and index. The caller has already
    /// validated price and quantity.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn rest(
        &mut self,
        order_id: u64,
        user_id: u64,
        side: Side,
        price: i64,
        visible: i64,
        hidden: i64,
        peak: i64,
        aon: bool,
    ) {
        let pidx = Self::price_to_index(price);
        let idx = self.pool.allocate();
        {
            let rec = self.pool.get_mut(idx);
            rec.order_id = order_id;
            rec.user_id = user_id;
            rec.price = price;
            rec.visible = visible;
            rec.hidden = hidden;
            rec.peak = peak;
            rec.flags = 0;
            rec.set_buy(side.is_buy());
            rec.set_aon(aon);
            rec.next = NULL_INDEX;
            rec.prev = NULL_INDEX;
        }

        let was_empty;
        {
            let level = match side {
                Side::Buy => &mut self.bid_levels[pidx],
                Side::Sell => &mut self.ask_levels[pidx],
            };
            was_empty = level.is_empty();
            level.push_back(&mut self.pool, idx);
            let snap = *self.pool.get(idx);
            level.add_volume(&snap);
        }

        if was_empty {
            match side {
                Side::Buy => {
                    self.bid_level_count += 1;
                    self.update_best_bid_after_add(price);
                }
                Side::Sell => {
                    self.ask_level_count += 1;
                    self.update_best_ask_after_add(price);
                }
            }
        }

        let was_active = self.index.get_active(order_id).is_some();
        self.index.assign(order_id, price, idx, side.is_buy());
        if !was_active {
            self.active_orders += 1;
        }

        self.emit_accepted(order_id, side, price, visible);
    }

    #[inline]
    pub(crate) fn update_best_bid_after_add(&mut self, price: i64) {
        let idx = Self::price_to_index(price);
        self.bid_bitmap.set(idx);
        if self.best_bid == NO_BID || price > self.best_bid {
            self.best_bid = price;
            self.best_bid_word = (idx / 64) as i64;
        }
    }

    #[inline]
    pub(crate) fn update_best_ask_after_add(&mut self, price: i64) {
        let idx = Self::price_to_index(price);
        self.ask_bitmap.set(idx);
        if self.best_ask == NO_ASK || price < self.best_ask {
            self.best_ask = price;
            self.best_ask_word = idx / 64;
        }
    }

    pub(crate) fn update_best_bid_after_remove(&mut self, removed_price: i64) {
        let idx = Self::price_to_index(removed_price);
        if self.bid_levels[idx].is_empty() {
            self.bid_bitmap.clear(idx);
        }
        if removed_price == self.best_bid {
            match self.bid_bitmap.highest_set_from(self.best_bid_word) {
                Some(bit) => {
                    self.best_bid = Self::index_to_price(bit);
                    self.best_bid_word = (bit / 64) as i64;
                }
                None => {
                    self.best_bid = NO_BID;
                    self.best_bid_word = -1;
                }
            }
        }
    }

    pub(crate) fn update_best_ask_after_remove(&mut self, removed_price: i64) {
        let idx = Self::price_to_index(removed_price);
        if self.ask_levels[idx].is_empty() {
            self.ask_bitmap.clear(idx);
        }
        if removed_price == self.best_ask {
            match self.ask_bitmap.lowest_set_from(self.best_ask_word) {
                Some(bit) => {
                    self.best_ask = Self::index_to_price(bit);
                    self.best_ask_word = bit / 64;
                }
                None => {
                    self.best_ask = NO_ASK;
                    self.best_ask_word = 0;
                }
            }
        }
    }

    fn note_if_crossed(&self) {
        if self.best_bid != NO_BID && self.best_ask != NO_ASK && self.best_bid >= self.best_ask {
            debug_assert!(
                false,
                "crossed book: best_bid={} best_ask={}",
                self.best_bid, self.best_ask
            );
            tracing::error!(
                best_bid = self.best_bid,
                best_ask = self.best_ask,
                "crossed book detected"
            );
        }
    }

    // ========================================================================
    // Event emission
    // ========================================================================

    #[inline]
    pub(crate) fn emit_trade(&mut self, buy_order_id: u64, sell_order_id: u64, price: i64, quantity: i64) {
        self.trades_executed += 1;
        if !self.use_output_ring {
            return;
        }
        self.batch.push(OutputEvent::Trade(TradeEvent {
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            timestamp: self.timestamp,
        }));
        if self.batch.len() >= BATCH_SIZE {
            self.flush_batch();
        }
    }

    #[inline]
    fn emit_accepted(&mut self, order_id: u64, side: Side, price: i64, quantity: i64) {
        if !self.use_output_ring || !self.emit_accepts {
            return;
        }
        self.batch.push(OutputEvent::Accepted(AcceptEvent {
            order_id,
            side,
            price,
            quantity,
            timestamp: self.timestamp,
        }));
        if self.batch.len() >= BATCH_SIZE {
            self.flush_batch();
        }
    }

    #[inline]
    fn emit_cancelled(&mut self, order_id: u64, cancelled_quantity: i64) {
        if !self.use_output_ring || !self.emit_cancels {
            return;
        }
        self.batch.push(OutputEvent::Cancelled(CancelEvent {
            order_id,
            cancelled_quantity,
            timestamp: self.timestamp,
        }));
        if self.batch.len() >= BATCH_SIZE {
            self.flush_batch();
        }
    }

    fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let pushed = self.output.push_batch(&self.batch);
        if pushed < self.batch.len() {
            // Dropping never alters book state; consumers resync from snapshots.
            self.messages_dropped += (self.batch.len() - pushed) as u64;
        }
        self.batch.clear();
    }

    /// Drain the partial event batch into the output ring.
    pub fn flush_output(&mut self) {
        self.flush_batch();
    }

    // ========================================================================
    // Configuration toggles
    // ========================================================================

    pub fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    pub fn use_ring_output(&mut self, enable: bool) {
        self.use_output_ring = enable;
    }

    pub fn set_emit_accepts(&mut self, enable: bool) {
        self.emit_accepts = enable;
    }

    pub fn set_emit_cancels(&mut self, enable: bool) {
        self.emit_cancels = enable;
    }

    /// Trades-only mode for benchmarks: suppress accepts and cancels.
    pub fn set_benchmark_mode(&mut self, trades_only: bool) {
        self.emit_accepts = !trades_only;
        self.emit_cancels = !trades_only;
    }

    // ========================================================================
    // Observers
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> i64 {
        self.best_bid
    }

    #[inline]
    pub fn best_ask(&self) -> i64 {
        self.best_ask
    }

    /// Visible volume at the best bid, 0 when no bid rests.
    pub fn best_bid_volume(&self) -> i64 {
        if self.best_bid == NO_BID {
            return 0;
        }
        self.bid_levels[Self::price_to_index(self.best_bid)].visible_volume
    }

    /// Visible volume at the best ask, 0 when no ask rests.
    pub fn best_ask_volume(&self) -> i64 {
        if self.best_ask == NO_ASK {
            return 0;
        }
        self.ask_levels[Self::price_to_index(self.best_ask)].visible_volume
    }

    /// Non-empty bid levels as `(price, visible_volume)`, best first.
    /// Walks the bitmap, so cost is proportional to non-empty levels.
    pub fn bids_snapshot(&self) -> Vec<(i64, i64)> {
        let mut out = Vec::with_capacity(self.bid_level_count as usize);
        let mut probe = self.bid_bitmap.next_set_leq(self.price_levels - 1);
        while let Some(i) = probe {
            out.push((Self::index_to_price(i), self.bid_levels[i].visible_volume));
            if i == 0 {
                break;
            }
            probe = self.bid_bitmap.next_set_leq(i - 1);
        }
        out
    }

    /// Non-empty ask levels as `(price, visible_volume)`, best first.
    pub fn asks_snapshot(&self) -> Vec<(i64, i64)> {
        let mut out = Vec::with_capacity(self.ask_level_count as usize);
        let mut probe = self.ask_bitmap.next_set_geq(0);
        while let Some(i) = probe {
            out.push((Self::index_to_price(i), self.ask_levels[i].visible_volume));
            if i + 1 >= self.price_levels {
                break;
            }
            probe = self.ask_bitmap.next_set_geq(i + 1);
        }
        out
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.active_orders
    }

    #[inline]
    pub fn bid_level_count(&self) -> usize {
        self.bid_level_count as usize
    }

    #[inline]
    pub fn ask_level_count(&self) -> usize {
        self.ask_level_count as usize
    }

    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.trades_executed
    }

    #[inline]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped
    }

    #[inline]
    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    #[inline]
    pub fn pool_used(&self) -> usize {
        self.pool.used()
    }

    #[inline]
    pub fn price_domain(&self) -> usize {
        self.price_levels
    }

    /// Handle to the output ring for a consumer thread.
    pub fn output_ring(&self) -> Arc<OutputRing> {
        Arc::clone(&self.output)
    }

    #[inline]
    pub fn output_ring_len(&self) -> usize {
        self.output.len()
    }

    /// Pre-fault the pool, level arrays, and bitmaps so the hot path takes
    /// no page faults.
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
        self.bid_bitmap.warm_up();
        self.ask_bitmap.warm_up();
        for level in self.bid_levels.iter_mut() {
            unsafe {
                let v = std::ptr::read_volatile(&level.count);
                std::ptr::write_volatile(&mut level.count, v);
            }
        }
        for level in self.ask_levels.iter_mut() {
            unsafe {
                let v = std::ptr::read_volatile(&level.count);
                std::ptr::write_volatile(&mut level.count, v);
            }
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Full-state consistency check: bitmap/level agreement, volume sums,
    /// FIFO linkage, index/pool agreement, best-price caches, crossed book.
    ///
    /// O(price domain + orders); intended for tests and incident triage,
    /// never the hot path.
    pub fn validate(&self) -> Result<(), String> {
        use std::collections::HashSet;

        if self.best_bid != NO_BID && self.best_ask != NO_ASK && self.best_bid >= self.best_ask {
            return Err(format!(
                "crossed book: best_bid={} best_ask={}",
                self.best_bid, self.best_ask
            ));
        }

        let expect_bid = self
            .bid_bitmap
            .next_set_leq(self.price_levels - 1)
            .map(Self::index_to_price)
            .unwrap_or(NO_BID);
        if expect_bid != self.best_bid {
            return Err(format!(
                "best bid cache {} disagrees with bitmap {}",
                self.best_bid, expect_bid
            ));
        }
        let expect_ask = self
            .ask_bitmap
            .next_set_geq(0)
            .map(Self::index_to_price)
            .unwrap_or(NO_ASK);
        if expect_ask != self.best_ask {
            return Err(format!(
                "best ask cache {} disagrees with bitmap {}",
                self.best_ask, expect_ask
            ));
        }

        let mut linked: HashSet<PoolIndex> = HashSet::new();
        let bid_nonempty =
            validate_side("bid", &self.bid_levels, &self.bid_bitmap, &self.pool, &mut linked)?;
        let ask_nonempty =
            validate_side("ask", &self.ask_levels, &self.ask_bitmap, &self.pool, &mut linked)?;

        if bid_nonempty != self.bid_level_count {
            return Err(format!(
                "bid level count {} != non-empty levels {}",
                self.bid_level_count, bid_nonempty
            ));
        }
        if ask_nonempty != self.ask_level_count {
            return Err(format!(
                "ask level count {} != non-empty levels {}",
                self.ask_level_count, ask_nonempty
            ));
        }

        let mut active = 0usize;
        for (id, loc) in self.index.active_entries() {
            active += 1;
            let rec = self.pool.get(loc.pool_idx);
            if rec.order_id != id {
                return Err(format!("index id {} points at record id {}", id, rec.order_id));
            }
            if rec.price != loc.price {
                return Err(format!("index price {} != record price {}", loc.price, rec.price));
            }
            if rec.is_buy() != loc.is_buy() {
                return Err(format!("index side mismatch for id {}", id));
            }
            if !linked.contains(&loc.pool_idx) {
                return Err(format!("active id {} not linked into any level", id));
            }
        }
        if active != self.active_orders {
            return Err(format!(
                "active order counter {} != active index entries {}",
                self.active_orders, active
            ));
        }
        if linked.len() != self.active_orders {
            return Err(format!(
                "{} linked records but {} active orders",
                linked.len(),
                self.active_orders
            ));
        }
        if self.pool.used() != self.active_orders {
            return Err(format!(
                "pool used {} != active orders {}",
                self.pool.used(),
                self.active_orders
            ));
        }

        Ok(())
    }
}

fn validate_side(
    name: &str,
    levels: &[PriceLevel],
    bitmap: &SideBitmap,
    pool: &OrderPool,
    linked: &mut std::collections::HashSet<PoolIndex>,
) -> Result<u32, String> {
    let is_bid = name == "bid";
    let mut nonempty = 0u32;

    for (idx, level) in levels.iter().enumerate() {
        let bit = bitmap.test(idx);
        if level.is_empty() {
            if bit {
                return Err(format!("{} bitmap bit set on empty level {}", name, idx));
            }
            if level.count != 0 || level.total_volume != 0 {
                return Err(format!("{} empty level {} has residual state", name, idx));
            }
            continue;
        }
        if !bit {
            return Err(format!("{} bitmap bit clear on non-empty level {}", name, idx));
        }
        nonempty += 1;

        let price = OrderBook::index_to_price(idx);
        let mut curr = level.head;
        let mut prev = NULL_INDEX;
        let mut count = 0u32;
        let (mut total, mut visible, mut aon, mut non_aon) = (0i64, 0i64, 0i64, 0i64);

        while curr != NULL_INDEX {
            let rec = pool.get(curr);
            if rec.prev != prev {
                return Err(format!("{} level {} broken prev link at {}", name, idx, curr));
            }
            if rec.price != price {
                return Err(format!(
                    "{} level {} holds order at price {}",
                    name, idx, rec.price
                ));
            }
            if rec.is_buy() != is_bid {
                return Err(format!("{} level {} holds wrong-side order", name, idx));
            }
            if rec.visible < 0 || rec.hidden < 0 || rec.total() == 0 {
                return Err(format!(
                    "{} level {} order {} has invalid quantities",
                    name, idx, rec.order_id
                ));
            }
            if !linked.insert(curr) {
                return Err(format!("record {} linked twice", curr));
            }
            count += 1;
            total += rec.total();
            visible += rec.visible;
            if rec.is_aon() {
                aon += rec.total();
            } else {
                non_aon += rec.total();
            }
            prev = curr;
            curr = rec.next;
        }

        if prev != level.tail {
            return Err(format!("{} level {} tail mismatch", name, idx));
        }
        if count != level.count {
            return Err(format!("{} level {} count {} != FIFO length {}", name, idx, level.count, count));
        }
        if total != level.total_volume
            || visible != level.visible_volume
            || aon != level.aon_volume
            || non_aon != level.non_aon_volume
        {
            return Err(format!("{} level {} volume sums disagree", name, idx));
        }
        if level.total_volume != level.aon_volume + level.non_aon_volume {
            return Err(format!("{} level {} aon partition broken", name, idx));
        }
    }

    Ok(nonempty)
}

/// The locked entry surface: the same book behind a reader-writer lock for
/// deployments where observers run concurrently with the writer.
pub struct SharedBook {
    inner: RwLock<OrderBook>,
}

impl SharedBook {
    pub fn new(config: BookConfig) -> Self {
        Self {
            inner: RwLock::new(OrderBook::new(config)),
        }
    }

    pub fn add_order(&self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u64) -> OpOutcome {
        self.inner.write().add_order(order_id, side, price, quantity, user_id)
    }

    pub fn add_iceberg(
        &self,
        order_id: u64,
        side: Side,
        price: i64,
        total_quantity: i64,
        visible_quantity: i64,
        user_id: u64,
    ) -> OpOutcome {
        self.inner
            .write()
            .add_iceberg(order_id, side, price, total_quantity, visible_quantity, user_id)
    }

    pub fn add_aon(&self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u64) -> OpOutcome {
        self.inner.write().add_aon(order_id, side, price, quantity, user_id)
    }

    pub fn cancel_order(&self, order_id: u64) -> Option<i64> {
        self.inner.write().cancel_order(order_id)
    }

    pub fn modify_order(&self, order_id: u64, new_price: i64, new_quantity: i64) -> OpOutcome {
        self.inner.write().modify_order(order_id, new_price, new_quantity)
    }

    pub fn execute(
        &self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
        user_id: u64,
    ) -> OpOutcome {
        self.inner.write().execute(order_id, side, price, quantity, tif, user_id)
    }

    pub fn reset(&self) {
        self.inner.write().reset()
    }

    pub fn flush_output(&self) {
        self.inner.write().flush_output()
    }

    pub fn best_bid(&self) -> i64 {
        self.inner.read().best_bid()
    }

    pub fn best_ask(&self) -> i64 {
        self.inner.read().best_ask()
    }

    pub fn best_bid_volume(&self) -> i64 {
        self.inner.read().best_bid_volume()
    }

    pub fn best_ask_volume(&self) -> i64 {
        self.inner.read().best_ask_volume()
    }

    pub fn order_count(&self) -> usize {
        self.inner.read().order_count()
    }

    pub fn trades_executed(&self) -> u64 {
        self.inner.read().trades_executed()
    }

    pub fn bids_snapshot(&self) -> Vec<(i64, i64)> {
        self.inner.read().bids_snapshot()
    }

    pub fn asks_snapshot(&self) -> Vec<(i64, i64)> {
        self.inner.read().asks_snapshot()
    }

    pub fn output_ring(&self) -> Arc<OutputRing> {
        self.inner.read().output_ring()
    }

    /// Shared lease for multiple observer calls under one acquisition.
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, OrderBook> {
        self.inner.read()
    }

    /// Exclusive access for batched mutation.
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, OrderBook> {
        self.inner.write()
    }
}
