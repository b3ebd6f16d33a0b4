//! Stress tests - correctness under extreme conditions: pool growth past
//! the initial capacity, deep single-level FIFO contention, rapid churn,
//! and heavy TIF/iceberg traffic.

use densebook::{BookConfig, OpOutcome, OrderBook, Side, Tif, NO_ASK, NO_BID};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn quiet_book(pool: u32, levels: usize) -> OrderBook {
    OrderBook::new(BookConfig {
        pool_capacity: pool,
        price_levels: levels,
        use_output_ring: false,
        emit_accepts: false,
        emit_cancels: false,
    })
}

// ============================================================================
// Pool capacity
// ============================================================================

#[test]
fn pool_grows_past_initial_capacity() {
    let mut book = quiet_book(100, 65536);

    // Rest 400 orders against a 100-slot pool; it must double as needed.
    for i in 0..400u64 {
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, 8_000 + (i % 100) as i64 * 10)
        } else {
            (Side::Sell, 10_000 + (i % 100) as i64 * 10)
        };
        assert_eq!(book.add_order(i, side, price, 100, 1), OpOutcome::Rested, "order {}", i);
    }

    assert_eq!(book.order_count(), 400);
    assert!(book.pool_capacity() >= 400);
    assert!(book.validate().is_ok());
}

#[test]
fn pool_slots_are_reused_after_cancel() {
    let mut book = quiet_book(128, 65536);

    for round in 0..5 {
        for i in 0..128u64 {
            let id = round * 1_000 + i;
            assert_eq!(
                book.add_order(id, Side::Buy, 9_000 + (i % 50) as i64, 100, 1),
                OpOutcome::Rested
            );
        }
        for i in 0..128u64 {
            assert!(book.cancel_order(round * 1_000 + i).is_some());
        }
        assert_eq!(book.order_count(), 0);
        // no growth needed: freed slots cycle back
        assert_eq!(book.pool_capacity(), 128);
    }
    assert!(book.validate().is_ok());
}

// ============================================================================
// Single-level contention
// ============================================================================

#[test]
fn thousand_deep_fifo_matches_in_arrival_order() {
    const ORDERS: u64 = 1_000;
    let mut book = quiet_book(2_048, 65536);

    for i in 0..ORDERS {
        book.add_order(i, Side::Sell, 10_000, 100, i % 100);
    }
    assert_eq!(book.order_count(), ORDERS as usize);

    let outcome = book.add_order(ORDERS, Side::Buy, 10_000, (ORDERS * 100) as i64, 999);
    assert_eq!(outcome, OpOutcome::Executed { trades: ORDERS as u32 });
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.best_ask(), NO_ASK);
    assert!(book.validate().is_ok());
}

#[test]
fn partial_sweep_leaves_later_arrivals() {
    let mut book = quiet_book(256, 65536);

    for i in 0..100u64 {
        book.add_order(i, Side::Sell, 10_000, 10, i);
    }

    // consume the first 50 orders exactly
    book.add_order(1_000, Side::Buy, 10_000, 500, 999);

    assert_eq!(book.order_count(), 50);
    assert_eq!(book.best_ask_volume(), 500);
    // order 50 is now at the head
    let snapshot = book.asks_snapshot();
    assert_eq!(snapshot, vec![(10_000, 500)]);
    assert!(book.validate().is_ok());
}

// ============================================================================
// Rapid churn
// ============================================================================

#[test]
fn rapid_add_cancel_cycles() {
    const CYCLES: u64 = 10_000;
    let mut book = quiet_book(64, 65536);

    for cycle in 0..CYCLES {
        let side = if cycle % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if cycle % 2 == 0 { 9_000 } else { 11_000 };
        assert_eq!(book.add_order(cycle, side, price, 100, 1), OpOutcome::Rested);
        assert_eq!(book.cancel_order(cycle), Some(100));
    }

    assert_eq!(book.order_count(), 0);
    assert_eq!(book.pool_capacity(), 64);
    assert!(book.validate().is_ok());
}

#[test]
fn rapid_match_cycles() {
    const CYCLES: u64 = 5_000;
    let mut book = quiet_book(64, 65536);

    for cycle in 0..CYCLES {
        book.add_order(cycle * 2, Side::Sell, 10_000, 100, 1);
        let outcome = book.add_order(cycle * 2 + 1, Side::Buy, 10_000, 100, 2);
        assert_eq!(outcome, OpOutcome::Executed { trades: 1 });
    }

    assert_eq!(book.trades_executed(), CYCLES);
    assert_eq!(book.order_count(), 0);
    assert!(book.validate().is_ok());
}

// ============================================================================
// TIF stress
// ============================================================================

#[test]
fn non_crossing_ioc_flood_leaves_book_untouched() {
    let mut book = quiet_book(256, 65536);

    for i in 0..100u64 {
        book.add_order(i, Side::Sell, 10_000 + (i % 20) as i64, 10, 1);
    }
    let before = book.order_count();

    for i in 100..200u64 {
        let outcome = book.execute(i, Side::Buy, 9_000, 100, Tif::Ioc, 2);
        assert_eq!(outcome, OpOutcome::NoOp);
    }

    assert_eq!(book.order_count(), before);
    assert_eq!(book.trades_executed(), 0);
    assert!(book.validate().is_ok());
}

#[test]
fn fok_mixed_feasibility() {
    let mut book = quiet_book(256, 65536);

    for i in 0..100u64 {
        book.add_order(i, Side::Sell, 10_000, 100, 1);
    }

    let mut filled = 0u32;
    let mut killed = 0u32;
    let mut wanted = 10i64;
    for i in 100..140u64 {
        match book.execute(i, Side::Buy, 10_000, wanted, Tif::Fok, 2) {
            OpOutcome::Executed { .. } => filled += 1,
            OpOutcome::NoOp => killed += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
        wanted += 500;
    }

    assert!(filled > 0, "some FOK orders must fill");
    assert!(killed > 0, "oversized FOK orders must kill");
    assert!(book.validate().is_ok());
}

#[test]
fn large_ioc_sweep_across_levels() {
    let mut book = quiet_book(2_048, 65536);

    for i in 0..1_000u64 {
        book.add_order(i, Side::Sell, 10_000 + (i % 10) as i64, 10, 1);
    }

    let outcome = book.execute(10_000, Side::Buy, 10_009, 50_000, Tif::Ioc, 2);
    match outcome {
        OpOutcome::Executed { trades } => assert_eq!(trades, 1_000),
        other => panic!("unexpected outcome {:?}", other),
    }
    // residual discarded, nothing rests
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.best_bid(), NO_BID);
    assert!(book.validate().is_ok());
}

#[test]
fn aon_churn_fills_whole_or_rests() {
    let mut book = quiet_book(512, 65536);
    let mut rng = ChaCha8Rng::seed_from_u64(0xA0A0);

    for i in 0..500u64 {
        book.add_order(i, Side::Sell, 10_000 + (i % 5) as i64, 10, 1);
    }
    let supply = 5_000i64;

    let mut consumed = 0i64;
    for i in 1_000..1_050u64 {
        let qty = rng.gen_range(1..40) * 10;
        match book.execute(i, Side::Buy, 10_004, qty, Tif::Aon, 2) {
            OpOutcome::Executed { .. } => consumed += qty,
            OpOutcome::Rested => {
                // infeasible: rests whole on the bid side
                assert_eq!(book.best_bid(), 10_004);
                book.cancel_order(i);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        if consumed >= supply {
            break;
        }
    }

    assert!(book.validate().is_ok());
}

// ============================================================================
// Iceberg stress
// ============================================================================

#[test]
fn iceberg_wall_absorbs_many_sweeps() {
    let mut book = quiet_book(64, 65536);
    book.add_iceberg(1, Side::Sell, 10_000, 10_000, 100, 1);

    for i in 0..99u64 {
        let outcome = book.execute(100 + i, Side::Buy, 10_000, 100, Tif::Ioc, 2);
        assert_eq!(outcome, OpOutcome::Executed { trades: 1 }, "sweep {}", i);
        assert_eq!(book.best_ask_volume(), 100);
        assert_eq!(book.order_count(), 1);
    }

    // the hundredth sweep consumes the final chunk
    let outcome = book.execute(500, Side::Buy, 10_000, 100, Tif::Ioc, 2);
    assert_eq!(outcome, OpOutcome::Executed { trades: 1 });
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.best_ask(), NO_ASK);
    assert!(book.validate().is_ok());
}

// ============================================================================
// Boundary prices
// ============================================================================

#[test]
fn boundary_prices() {
    let mut book = quiet_book(64, 4096);

    assert_eq!(book.add_order(1, Side::Buy, 0, 100, 1), OpOutcome::Rested);
    assert_eq!(book.best_bid(), 0);

    assert_eq!(book.add_order(2, Side::Sell, 4_095, 100, 1), OpOutcome::Rested);
    assert_eq!(book.best_ask(), 4_095);

    assert_eq!(book.add_order(3, Side::Sell, 4_096, 100, 1), OpOutcome::NoOp);
    assert_eq!(book.add_order(4, Side::Buy, -1, 100, 1), OpOutcome::NoOp);
    assert_eq!(book.order_count(), 2);
    assert!(book.validate().is_ok());
}

// ============================================================================
// Large random workload
// ============================================================================

#[test]
fn large_random_workload() {
    const SEED: u64 = 0xABCDEF123456;
    const OPS: usize = 50_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut book = quiet_book(4_096, 65536);

    let mut next_id = 1u64;
    let mut resting: Vec<u64> = Vec::new();
    let mut cancels = 0u64;

    for _ in 0..OPS {
        let roll = rng.gen_range(0..100);
        if roll < 60 || resting.is_empty() {
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let outcome = book.add_order(
                next_id,
                side,
                rng.gen_range(9_000..11_000),
                rng.gen_range(1..500),
                rng.gen_range(1..1_000),
            );
            match outcome {
                OpOutcome::Rested | OpOutcome::ExecutedAndRested { .. } => resting.push(next_id),
                _ => {}
            }
            next_id += 1;
        } else if roll < 90 {
            let pick = rng.gen_range(0..resting.len());
            let id = resting.swap_remove(pick);
            if book.cancel_order(id).is_some() {
                cancels += 1;
            }
        } else {
            let pick = rng.gen_range(0..resting.len());
            let id = resting.swap_remove(pick);
            let outcome = book.modify_order(id, rng.gen_range(9_000..11_000), rng.gen_range(1..500));
            match outcome {
                OpOutcome::Rested | OpOutcome::ExecutedAndRested { .. } => resting.push(id),
                _ => {}
            }
        }
    }

    assert!(cancels > 0);
    assert!(book.validate().is_ok());
}
