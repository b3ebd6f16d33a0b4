//! The matching walk: aggressive orders against resting liquidity under
//! price-time priority, with FOK/AON feasibility probing and iceberg
//! refresh.
//!
//! All-or-none book orders are skipped (not disturbed) when the aggressor
//! cannot absorb them whole; a level left non-empty only by such skips is
//! stepped over so deeper levels can still trade.

use crate::book::{OpOutcome, OrderBook, NO_ASK, NO_BID};
use crate::command::{Side, Tif};
use crate::pool::{PoolIndex, NULL_INDEX};

impl OrderBook {
    /// Match `quantity` at up to `limit_price`, then apply the
    /// time-in-force residual rule.
    pub(crate) fn match_incoming(
        &mut self,
        order_id: u64,
        user_id: u64,
        side: Side,
        limit_price: i64,
        quantity: i64,
        tif: Tif,
    ) -> OpOutcome {
        // Feasibility probe before any mutation.
        match tif {
            Tif::Fok => {
                if self.available_quantity(side, limit_price, quantity) < quantity {
                    return OpOutcome::NoOp;
                }
            }
            Tif::Aon => {
                if self.available_quantity(side, limit_price, quantity) < quantity {
                    if self.in_domain(limit_price) {
                        self.rest(order_id, user_id, side, limit_price, quantity, 0, 0, true);
                        return OpOutcome::Rested;
                    }
                    return OpOutcome::NoOp;
                }
            }
            Tif::Gtc | Tif::Ioc => {}
        }

        let mut remaining = quantity;
        let mut trades: u32 = 0;

        let start = match side {
            Side::Buy if self.best_ask != NO_ASK => Some(Self::price_to_index(self.best_ask)),
            Side::Sell if self.best_bid != NO_BID => Some(Self::price_to_index(self.best_bid)),
            _ => None,
        };

        if let Some(mut scan_idx) = start {
            while remaining > 0 {
                let level_idx = match side {
                    Side::Buy => self.ask_bitmap.next_set_geq(scan_idx),
                    Side::Sell => self.bid_bitmap.next_set_leq(scan_idx),
                };
                let level_idx = match level_idx {
                    Some(i) => i,
                    None => break,
                };
                let level_price = Self::index_to_price(level_idx);
                let crosses = match side {
                    Side::Buy => level_price <= limit_price,
                    Side::Sell => level_price >= limit_price,
                };
                if !crosses {
                    break;
                }

                // Stale bit (best-index update ordering): restore and move on.
                let stale = match side {
                    Side::Buy => self.ask_levels[level_idx].is_empty(),
                    Side::Sell => self.bid_levels[level_idx].is_empty(),
                };
                if stale {
                    match side {
                        Side::Buy => self.update_best_ask_after_remove(level_price),
                        Side::Sell => self.update_best_bid_after_remove(level_price),
                    }
                    continue;
                }

                // Re-walk while the level keeps yielding fills; an iceberg
                // refresh re-arms the level mid-walk.
                loop {
                    let made = self.walk_level(order_id, side, level_idx, level_price, &mut remaining);
                    trades += made;

                    let emptied = match side {
                        Side::Buy => self.ask_levels[level_idx].is_empty(),
                        Side::Sell => self.bid_levels[level_idx].is_empty(),
                    };
                    if emptied {
                        match side {
                            Side::Buy => {
                                self.ask_level_count -= 1;
                                self.update_best_ask_after_remove(level_price);
                            }
                            Side::Sell => {
                                self.bid_level_count -= 1;
                                self.update_best_bid_after_remove(level_price);
                            }
                        }
                        break;
                    }
                    if remaining == 0 || made == 0 {
                        break;
                    }
                }

                if remaining == 0 {
                    break;
                }
                // The level is gone or holds only AON orders the aggressor
                // cannot absorb; step past it.
                match side {
                    Side::Buy => {
                        scan_idx = level_idx + 1;
                        if scan_idx >= self.price_levels {
                            break;
                        }
                    }
                    Side::Sell => {
                        if level_idx == 0 {
                            break;
                        }
                        scan_idx = level_idx - 1;
                    }
                }
            }
        }

        if remaining > 0 {
            match tif {
                Tif::Gtc => {
                    if self.in_domain(limit_price) {
                        self.rest(order_id, user_id, side, limit_price, remaining, 0, 0, false);
                        return if trades > 0 {
                            OpOutcome::ExecutedAndRested { trades }
                        } else {
                            OpOutcome::Rested
                        };
                    }
                }
                Tif::Aon => {
                    // Probe said feasible but the walk fell short; rest whole.
                    if self.in_domain(limit_price) {
                        self.rest(order_id, user_id, side, limit_price, remaining, 0, 0, true);
                        return if trades > 0 {
                            OpOutcome::ExecutedAndRested { trades }
                        } else {
                            OpOutcome::Rested
                        };
                    }
                }
                Tif::Ioc | Tif::Fok => {}
            }
        }

        if trades > 0 {
            OpOutcome::Executed { trades }
        } else {
            OpOutcome::NoOp
        }
    }

    /// One head-to-tail pass over a level. Returns the number of fills.
    fn walk_level(
        &mut self,
        taker_id: u64,
        taker_side: Side,
        level_idx: usize,
        level_price: i64,
        remaining: &mut i64,
    ) -> u32 {
        let mut trades = 0u32;
        let mut curr = match taker_side {
            Side::Buy => self.ask_levels[level_idx].head,
            Side::Sell => self.bid_levels[level_idx].head,
        };

        while curr != NULL_INDEX && *remaining > 0 {
            let (next, maker_id, maker_visible, maker_total, maker_aon, maker_hidden) = {
                let rec = self.pool.get(curr);
                (
                    rec.next,
                    rec.order_id,
                    rec.visible,
                    rec.total(),
                    rec.is_aon(),
                    rec.hidden,
                )
            };

            // AON book orders fill whole or not at all; skipping does not
            // disturb their FIFO position.
            if maker_aon && *remaining < maker_total {
                curr = next;
                continue;
            }

            let trade_qty = (*remaining).min(maker_visible);
            let (buy_id, sell_id) = match taker_side {
                Side::Buy => (taker_id, maker_id),
                Side::Sell => (maker_id, taker_id),
            };
            self.emit_trade(buy_id, sell_id, level_price, trade_qty);
            trades += 1;
            *remaining -= trade_qty;

            let now_visible = maker_visible - trade_qty;
            {
                let level = match taker_side {
                    Side::Buy => &mut self.ask_levels[level_idx],
                    Side::Sell => &mut self.bid_levels[level_idx],
                };
                level.adjust_volume(-trade_qty, 0, maker_aon);
            }
            self.pool.get_mut(curr).visible = now_visible;

            if now_visible == 0 {
                if maker_hidden > 0 {
                    self.refresh_iceberg(taker_side, level_idx, curr);
                } else {
                    // Fully consumed: unlink, deactivate, release the slot.
                    {
                        let level = match taker_side {
                            Side::Buy => &mut self.ask_levels[level_idx],
                            Side::Sell => &mut self.bid_levels[level_idx],
                        };
                        level.unlink(&mut self.pool, curr);
                    }
                    if let Some(loc) = self.index.get_mut(maker_id) {
                        if loc.is_active() {
                            loc.set_active(false);
                            self.active_orders -= 1;
                        }
                    }
                    self.pool.free(curr);
                }
            }

            curr = next;
        }

        trades
    }

    /// Expose a fresh display chunk and requeue at the tail of the same
    /// level. The refreshed order loses its FIFO position.
    fn refresh_iceberg(&mut self, taker_side: Side, level_idx: usize, idx: PoolIndex) {
        let level = match taker_side {
            Side::Buy => &mut self.ask_levels[level_idx],
            Side::Sell => &mut self.bid_levels[level_idx],
        };

        let snap = *self.pool.get(idx);
        level.remove_volume(&snap);
        level.unlink(&mut self.pool, idx);

        let order_id;
        {
            let rec = self.pool.get_mut(idx);
            let replenish = if rec.peak > 0 {
                rec.peak.min(rec.hidden)
            } else {
                rec.hidden
            };
            rec.visible = replenish;
            rec.hidden -= replenish;
            order_id = rec.order_id;
        }

        level.push_back(&mut self.pool, idx);
        let snap = *self.pool.get(idx);
        level.add_volume(&snap);

        // Same slot; re-assert the mapping.
        if let Some(loc) = self.index.get_mut(order_id) {
            loc.pool_idx = idx;
        }
    }

    /// Quantity an aggressor could fill at or better than `limit_price`,
    /// honouring AON book orders, without mutating anything.
    ///
    /// Levels with no AON volume contribute from their aggregate; levels
    /// holding AON orders are walked order by order.
    pub(crate) fn available_quantity(&self, taker_side: Side, limit_price: i64, quantity: i64) -> i64 {
        let mut available: i64 = 0;
        let mut remaining = quantity;

        match taker_side {
            Side::Buy => {
                if self.best_ask == NO_ASK {
                    return 0;
                }
                let mut scan = Self::price_to_index(self.best_ask);
                while remaining > 0 {
                    let i = match self.ask_bitmap.next_set_geq(scan) {
                        Some(i) => i,
                        None => break,
                    };
                    if Self::index_to_price(i) > limit_price {
                        break;
                    }
                    let (fillable, used) =
                        level_available(&self.ask_levels[i], &self.pool, remaining);
                    available += fillable;
                    remaining -= used;
                    if i + 1 >= self.price_levels {
                        break;
                    }
                    scan = i + 1;
                }
            }
            Side::Sell => {
                if self.best_bid == NO_BID {
                    return 0;
                }
                let mut scan = Self::price_to_index(self.best_bid);
                while remaining > 0 {
                    let i = match self.bid_bitmap.next_set_leq(scan) {
                        Some(i) => i,
                        None => break,
                    };
                    if Self::index_to_price(i) < limit_price {
                        break;
                    }
                    let (fillable, used) =
                        level_available(&self.bid_levels[i], &self.pool, remaining);
                    available += fillable;
                    remaining -= used;
                    if i == 0 {
                        break;
                    }
                    scan = i - 1;
                }
            }
        }

        available
    }
}

/// Contribution of one level to the feasibility probe given the remaining
/// budget; returns `(fillable, budget_used)`.
fn level_available(
    level: &crate::level::PriceLevel,
    pool: &crate::pool::OrderPool,
    budget: i64,
) -> (i64, i64) {
    if level.aon_volume == 0 {
        // The aggregate short-circuits the FIFO walk.
        let fillable = budget.min(level.total_volume);
        return (fillable, fillable);
    }

    let mut remaining = budget;
    let mut fillable = 0i64;
    let mut curr = level.head;
    while curr != NULL_INDEX && remaining > 0 {
        let rec = pool.get(curr);
        let total = rec.total();
        if rec.is_aon() {
            if remaining >= total {
                fillable += total;
                remaining -= total;
            }
        } else {
            let take = remaining.min(total);
            fillable += take;
            remaining -= take;
        }
        curr = rec.next;
    }
    (fillable, budget - remaining)
}
