//! End-to-end scenarios driven through the public operations, checking
//! both the resulting book and the emitted event stream.

use densebook::{
    BookConfig, OpOutcome, OrderBook, OutputEvent, Side, Tif, NO_ASK, NO_BID,
};

fn book() -> OrderBook {
    OrderBook::new(BookConfig::sized(1024, 4096))
}

fn drain_events(book: &mut OrderBook) -> Vec<OutputEvent> {
    book.flush_output();
    let ring = book.output_ring();
    let mut out = Vec::new();
    while ring.pop_batch(&mut out, 1024) > 0 {}
    out
}

fn trades(events: &[OutputEvent]) -> Vec<(u64, u64, i64, i64)> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Trade(t) => Some((t.buy_order_id, t.sell_order_id, t.price, t.quantity)),
            _ => None,
        })
        .collect()
}

#[test]
fn simple_cross_partial_fill() {
    let mut book = book();
    book.add_order(1, Side::Buy, 100, 10, 1);
    book.add_order(2, Side::Sell, 100, 4, 2);

    let events = drain_events(&mut book);
    assert_eq!(trades(&events), vec![(1, 2, 100, 4)]);

    assert_eq!(book.best_bid(), 100);
    assert_eq!(book.best_bid_volume(), 6);
    assert_eq!(book.best_ask(), NO_ASK);
    assert!(book.validate().is_ok());
}

#[test]
fn aggressive_buy_walks_two_levels() {
    let mut book = book();
    book.add_order(1, Side::Sell, 101, 3, 1);
    book.add_order(2, Side::Sell, 102, 5, 1);
    drain_events(&mut book);

    let outcome = book.add_order(10, Side::Buy, 102, 6, 2);
    assert_eq!(outcome, OpOutcome::Executed { trades: 2 });

    let events = drain_events(&mut book);
    assert_eq!(trades(&events), vec![(10, 1, 101, 3), (10, 2, 102, 3)]);

    assert_eq!(book.best_ask(), 102);
    assert_eq!(book.best_ask_volume(), 2);
    assert!(book.validate().is_ok());
}

#[test]
fn fifo_priority_within_level() {
    let mut book = book();
    book.add_order(1, Side::Buy, 100, 5, 1);
    book.add_order(2, Side::Buy, 100, 5, 1);
    book.add_order(3, Side::Buy, 100, 5, 1);
    drain_events(&mut book);

    book.execute(9, Side::Sell, 100, 7, Tif::Ioc, 2);

    let events = drain_events(&mut book);
    assert_eq!(trades(&events), vec![(1, 9, 100, 5), (2, 9, 100, 2)]);

    // id 2 remains at the head with 3 visible
    assert_eq!(book.best_bid_volume(), 8);
    let snapshot = book.bids_snapshot();
    assert_eq!(snapshot, vec![(100, 8)]);
    assert_eq!(book.order_count(), 2);
    assert!(book.validate().is_ok());
}

#[test]
fn fok_infeasible_leaves_book_and_stream_unchanged() {
    let mut book = book();
    book.add_order(1, Side::Sell, 99, 1, 1);
    book.add_order(2, Side::Sell, 100, 3, 1);
    drain_events(&mut book);

    let outcome = book.execute(9, Side::Buy, 100, 5, Tif::Fok, 2);
    assert_eq!(outcome, OpOutcome::NoOp);

    let events = drain_events(&mut book);
    assert!(events.is_empty());
    assert_eq!(book.best_ask(), 99);
    assert_eq!(book.order_count(), 2);
    assert_eq!(book.trades_executed(), 0);
    assert!(book.validate().is_ok());
}

#[test]
fn iceberg_refreshes_until_reserve_exhausts() {
    let mut book = book();
    book.add_iceberg(1, Side::Buy, 100, 50, 10, 1);
    drain_events(&mut book);

    for i in 0..4u64 {
        let outcome = book.execute(10 + i, Side::Sell, 100, 10, Tif::Ioc, 2);
        assert_eq!(outcome, OpOutcome::Executed { trades: 1 }, "sell {}", i);
        assert_eq!(book.best_bid(), 100);
        assert_eq!(book.best_bid_volume(), 10, "refresh {}", i);
        assert!(book.validate().is_ok());
    }

    let events = drain_events(&mut book);
    assert_eq!(
        trades(&events),
        vec![
            (1, 10, 100, 10),
            (1, 11, 100, 10),
            (1, 12, 100, 10),
            (1, 13, 100, 10),
        ]
    );

    // hidden is exhausted; the final 10 are plain visible quantity
    let outcome = book.execute(14, Side::Sell, 100, 10, Tif::Ioc, 2);
    assert_eq!(outcome, OpOutcome::Executed { trades: 1 });
    assert_eq!(book.best_bid(), NO_BID);
    assert_eq!(book.order_count(), 0);
    assert!(book.validate().is_ok());
}

#[test]
fn aon_resting_order_is_skipped_not_disturbed() {
    let mut book = book();
    book.add_order(1, Side::Buy, 100, 5, 1);
    book.add_aon(2, Side::Buy, 100, 20, 1);
    book.add_order(3, Side::Buy, 100, 10, 1);
    drain_events(&mut book);

    let outcome = book.execute(9, Side::Sell, 100, 12, Tif::Ioc, 2);
    assert_eq!(outcome, OpOutcome::Executed { trades: 2 });

    let events = drain_events(&mut book);
    assert_eq!(trades(&events), vec![(1, 9, 100, 5), (3, 9, 100, 7)]);

    // AON id 2 untouched at 20; id 3 keeps 3
    assert_eq!(book.best_bid_volume(), 23);
    assert_eq!(book.order_count(), 2);
    assert!(book.validate().is_ok());
}

#[test]
fn accepts_carry_displayed_quantity_only() {
    let mut book = book();
    book.set_timestamp(99);
    book.add_iceberg(7, Side::Sell, 500, 120, 30, 3);
    let events = drain_events(&mut book);
    match events.as_slice() {
        [OutputEvent::Accepted(a)] => {
            assert_eq!(a.order_id, 7);
            assert_eq!(a.side, Side::Sell);
            assert_eq!(a.price, 500);
            assert_eq!(a.quantity, 30);
            assert_eq!(a.timestamp, 99);
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn cancel_reports_full_hidden_reserve() {
    let mut book = book();
    book.add_iceberg(7, Side::Sell, 500, 120, 30, 3);
    drain_events(&mut book);

    assert_eq!(book.cancel_order(7), Some(120));
    let events = drain_events(&mut book);
    match events.as_slice() {
        [OutputEvent::Cancelled(c)] => {
            assert_eq!(c.order_id, 7);
            assert_eq!(c.cancelled_quantity, 120);
        }
        other => panic!("unexpected events {:?}", other),
    }
    assert!(book.validate().is_ok());
}

#[test]
fn market_sweep_through_protocol_frames() {
    use densebook::{protocol, Engine};

    let mut engine = Engine::new(BookConfig::sized(1024, 4096));
    let frames: Vec<Vec<u8>> = vec![
        protocol::encode_add_order(1, 1, 9, Side::Sell, 101, 5).to_vec(),
        protocol::encode_add_order(2, 2, 9, Side::Sell, 102, 5).to_vec(),
        protocol::market_buy(3, 100, 8, 20).to_vec(),
    ];

    for frame in &frames {
        let (ts, cmd) = protocol::decode(frame).expect("valid frame");
        engine.apply(ts, cmd);
    }

    assert_eq!(engine.book.trades_executed(), 2);
    assert_eq!(engine.book.best_ask(), NO_ASK);
    // market-order residual is discarded, never rests
    assert_eq!(engine.book.order_count(), 0);
    assert!(engine.book.validate().is_ok());
}
