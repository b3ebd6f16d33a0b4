//! Command and event types for the matching engine.
//!
//! Commands are the fully-parsed logical operations a driver feeds the
//! engine; events are the fixed-size records the engine writes to the
//! output ring for market-data consumers.

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    #[inline]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    #[inline]
    pub const fn from_buy(is_buy: bool) -> Self {
        if is_buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

/// Time-in-force of an aggressing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Tif {
    /// Good-til-cancel: residual rests in the book.
    #[default]
    Gtc = 0,
    /// Immediate-or-cancel: residual is discarded.
    Ioc = 1,
    /// Fill-or-kill: fills in full immediately or does nothing.
    Fok = 2,
    /// All-or-none: fills in full or rests whole.
    Aon = 3,
}

impl Tif {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Tif::Gtc),
            1 => Some(Tif::Ioc),
            2 => Some(Tif::Fok),
            3 => Some(Tif::Aon),
            _ => None,
        }
    }
}

// ============================================================================
// Input commands
// ============================================================================

/// Add a plain limit order.
#[derive(Clone, Copy, Debug)]
pub struct AddOrder {
    pub order_id: u64,
    pub user_id: u64,
    pub side: Side,
    /// Limit price in integer ticks.
    pub price: i64,
    pub quantity: i64,
}

/// Add an iceberg order: only `visible_quantity` is displayed at a time.
#[derive(Clone, Copy, Debug)]
pub struct AddIceberg {
    pub order_id: u64,
    pub user_id: u64,
    pub side: Side,
    pub price: i64,
    pub total_quantity: i64,
    pub visible_quantity: i64,
}

/// Add an all-or-none order.
#[derive(Clone, Copy, Debug)]
pub struct AddAon {
    pub order_id: u64,
    pub user_id: u64,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
}

/// Cancel a resting order.
#[derive(Clone, Copy, Debug)]
pub struct CancelOrder {
    pub order_id: u64,
}

/// Modify a resting order's price and/or quantity.
#[derive(Clone, Copy, Debug)]
pub struct ModifyOrder {
    pub order_id: u64,
    pub new_price: i64,
    pub new_quantity: i64,
}

/// Aggress the book with an explicit time-in-force.
#[derive(Clone, Copy, Debug)]
pub struct ExecuteOrder {
    pub order_id: u64,
    pub user_id: u64,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
    pub tif: Tif,
}

/// Fully-parsed logical operations the engine applies in arrival order.
#[derive(Clone, Copy, Debug)]
pub enum Command {
    Add(AddOrder),
    AddIceberg(AddIceberg),
    AddAon(AddAon),
    Cancel(CancelOrder),
    Modify(ModifyOrder),
    Execute(ExecuteOrder),
    Heartbeat,
    Reset,
}

// ============================================================================
// Output events
// ============================================================================

/// Number of events staged before a batched push into the output ring.
pub const BATCH_SIZE: usize = 64;

/// A fill between two orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradeEvent {
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub price: i64,
    pub quantity: i64,
    pub timestamp: u64,
}

/// An order rested in the book. For icebergs the quantity is the
/// displayed portion only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptEvent {
    pub order_id: u64,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
    pub timestamp: u64,
}

/// An order left the book by cancellation; quantity is visible + hidden
/// at cancel time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelEvent {
    pub order_id: u64,
    pub cancelled_quantity: i64,
    pub timestamp: u64,
}

/// Fixed-size market-data record pushed through the output ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    Trade(TradeEvent),
    Accepted(AcceptEvent),
    Cancelled(CancelEvent),
}

const _: () = assert!(
    std::mem::size_of::<OutputEvent>() <= 64,
    "OutputEvent must fit in a cache line"
);
