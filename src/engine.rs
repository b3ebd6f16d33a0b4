//! Engine - command dispatch and the single-writer event loop.
//!
//! All mutating operations execute on one logical actor; clients observe
//! a total order identical to the order the writer applied, and the event
//! stream in the output ring preserves it exactly.

use crate::book::{BookConfig, OpOutcome, OrderBook};
use crate::command::Command;

/// Wraps the book with command dispatch, warm-up, and (with the `runtime`
/// feature) a pinned busy-wait loop fed by an SPSC command queue.
pub struct Engine {
    pub book: OrderBook,
    messages_processed: u64,
}

impl Engine {
    pub fn new(config: BookConfig) -> Self {
        Self {
            book: OrderBook::new(config),
            messages_processed: 0,
        }
    }

    /// Apply one fully-parsed command at the given frame timestamp.
    #[inline]
    pub fn apply(&mut self, timestamp: u64, cmd: Command) -> OpOutcome {
        self.messages_processed += 1;
        self.book.set_timestamp(timestamp);
        match cmd {
            Command::Add(o) => self
                .book
                .add_order(o.order_id, o.side, o.price, o.quantity, o.user_id),
            Command::AddIceberg(o) => self.book.add_iceberg(
                o.order_id,
                o.side,
                o.price,
                o.total_quantity,
                o.visible_quantity,
                o.user_id,
            ),
            Command::AddAon(o) => self
                .book
                .add_aon(o.order_id, o.side, o.price, o.quantity, o.user_id),
            Command::Cancel(c) => match self.book.cancel_order(c.order_id) {
                Some(quantity) => OpOutcome::Cancelled { quantity },
                None => OpOutcome::NoOp,
            },
            Command::Modify(m) => self.book.modify_order(m.order_id, m.new_price, m.new_quantity),
            Command::Execute(e) => self
                .book
                .execute(e.order_id, e.side, e.price, e.quantity, e.tif, e.user_id),
            Command::Heartbeat => OpOutcome::NoOp,
            Command::Reset => {
                self.book.reset();
                OpOutcome::NoOp
            }
        }
    }

    /// Busy-wait loop: drain the command queue, flush the partial event
    /// batch whenever the queue goes idle. Runs until the process exits.
    #[cfg(feature = "runtime")]
    pub fn run(&mut self, input: &mut rtrb::Consumer<(u64, Command)>, pin_to_core: bool) {
        if pin_to_core {
            self.pin_to_core();
        }
        self.warm_up();

        loop {
            let mut drained = false;
            while let Ok((ts, cmd)) = input.pop() {
                self.apply(ts, cmd);
                drained = true;
            }
            if drained {
                self.book.flush_output();
            }
            std::hint::spin_loop();
        }
    }

    /// Pin the current thread to the last core; the last core is the one
    /// typically isolated from OS interrupts.
    #[cfg(feature = "runtime")]
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last) = core_ids.last() {
                core_affinity::set_for_current(*last);
            }
        }
    }

    /// Pre-fault every hot structure.
    pub fn warm_up(&mut self) {
        self.book.warm_up();
    }

    #[inline]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }

    /// Hash of the externally observable state, for determinism tests.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.book.best_bid().hash(&mut hasher);
        self.book.best_ask().hash(&mut hasher);
        self.book.order_count().hash(&mut hasher);
        self.book.pool_used().hash(&mut hasher);
        self.book.trades_executed().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AddOrder, CancelOrder, ExecuteOrder, Side, Tif};

    fn engine() -> Engine {
        Engine::new(BookConfig::sized(256, 1024))
    }

    fn add(order_id: u64, side: Side, price: i64, quantity: i64) -> Command {
        Command::Add(AddOrder {
            order_id,
            user_id: 1,
            side,
            price,
            quantity,
        })
    }

    #[test]
    fn test_apply_add_and_cancel() {
        let mut eng = engine();
        assert_eq!(eng.apply(1, add(1, Side::Buy, 100, 10)), OpOutcome::Rested);
        assert_eq!(eng.book.best_bid(), 100);

        let outcome = eng.apply(2, Command::Cancel(CancelOrder { order_id: 1 }));
        assert_eq!(outcome, OpOutcome::Cancelled { quantity: 10 });
        assert_eq!(eng.book.order_count(), 0);
        assert_eq!(eng.messages_processed(), 2);
    }

    #[test]
    fn test_apply_execute() {
        let mut eng = engine();
        eng.apply(1, add(1, Side::Sell, 100, 10));
        let outcome = eng.apply(
            2,
            Command::Execute(ExecuteOrder {
                order_id: 2,
                user_id: 2,
                side: Side::Buy,
                price: 100,
                quantity: 10,
                tif: Tif::Ioc,
            }),
        );
        assert_eq!(outcome, OpOutcome::Executed { trades: 1 });
    }

    #[test]
    fn test_apply_reset() {
        let mut eng = engine();
        eng.apply(1, add(1, Side::Buy, 100, 10));
        eng.apply(2, Command::Reset);
        assert_eq!(eng.book.order_count(), 0);
        assert_eq!(eng.book.best_bid(), crate::book::NO_BID);
    }

    #[test]
    fn test_heartbeat_refreshes_timestamp_only() {
        let mut eng = engine();
        assert_eq!(eng.apply(5, Command::Heartbeat), OpOutcome::NoOp);
        assert_eq!(eng.book.order_count(), 0);
    }

    #[test]
    fn test_state_hash_is_deterministic() {
        let mut a = engine();
        let mut b = engine();
        for i in 0..100u64 {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            let price = if i % 2 == 0 { 100 - (i as i64 % 10) } else { 101 + (i as i64 % 10) };
            let cmd = add(i, side, price, 10);
            a.apply(i, cmd);
            b.apply(i, cmd);
        }
        assert_eq!(a.state_hash(), b.state_hash());
    }
}
