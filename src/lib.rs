//! # densebook
//!
//! A dense-price limit order book matching engine.
//!
//! ## Design principles
//!
//! - **Single-writer**: one thread owns the book; observers either share
//!   it through [`SharedBook`] or are the same thread.
//! - **O(1) hot path**: add, cancel, and modify are constant time; the
//!   best-price search is one word scan per 64 prices from a cached word.
//! - **Cache-resident**: 64-byte pooled order records addressed by `u32`
//!   indices, direct-indexed price levels, no hashing.
//! - **Allocation-free after warm-up**: the pool, level arrays, bitmaps,
//!   and event batch are sized up front.
//!
//! ## Architecture
//!
//! ```text
//! [Driver] --> (u64, Command) --> [Engine (pinned)] --> [Output ring]
//!                                        |                    |
//!                                  [OrderBook]          [Consumer thread]
//! ```

pub mod bitmap;
pub mod book;
pub mod command;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod level;
mod matching;
pub mod pool;
pub mod protocol;
pub mod ring;

// Re-exports for convenience
pub use book::{
    BookConfig, OpOutcome, OrderBook, OutputRing, SharedBook, NO_ASK, NO_BID, OUTPUT_RING_SIZE,
};
pub use command::{
    AcceptEvent, AddAon, AddIceberg, AddOrder, CancelEvent, CancelOrder, Command, ExecuteOrder,
    ModifyOrder, OutputEvent, Side, Tif, TradeEvent, BATCH_SIZE,
};
pub use engine::Engine;
pub use level::PriceLevel;
pub use pool::{OrderPool, OrderRec, PoolIndex, NULL_INDEX};
pub use ring::SpscRing;
