//! L3 feed ingest - translates recorded market-data rows into engine
//! commands.
//!
//! Feeds identify orders by UUID strings; the normaliser remaps them to
//! dense u64 ids so the order index stays direct-indexable. Decimal
//! prices and sizes become integer ticks via configurable multipliers.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::command::{AddOrder, CancelOrder, Command, ModifyOrder, Side};

/// One row of a recorded L3 feed (Tardis CSV column layout).
#[derive(Debug, Deserialize)]
pub struct L3Row {
    pub r#type: String,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub order_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Stateful row-to-command translator.
pub struct L3Normalizer {
    price_mult: Decimal,
    qty_mult: Decimal,
    ids: FxHashMap<String, u64>,
    next_id: u64,
}

impl L3Normalizer {
    /// `price_mult` converts quote units to ticks (e.g. 100 for cents);
    /// `qty_mult` converts base units to lots.
    pub fn new(price_mult: u64, qty_mult: u64) -> Self {
        Self {
            price_mult: Decimal::from(price_mult),
            qty_mult: Decimal::from(qty_mult),
            ids: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Number of distinct external ids seen so far.
    pub fn known_ids(&self) -> usize {
        self.ids.len()
    }

    fn dense_id(&mut self, raw: &str) -> u64 {
        if let Some(&id) = self.ids.get(raw) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(raw.to_string(), id);
        id
    }

    fn ticks(&self, d: Decimal) -> i64 {
        (d * self.price_mult).to_i64().unwrap_or(0)
    }

    fn lots(&self, d: Decimal) -> i64 {
        (d * self.qty_mult).to_i64().unwrap_or(0)
    }

    /// Translate one row. Trades and unknown row types are dropped; the
    /// book derives its own trades from the order flow.
    pub fn normalize(&mut self, row: &L3Row) -> Option<(u64, Command)> {
        let ts = row
            .timestamp
            .and_then(|t| t.timestamp_nanos_opt())
            .unwrap_or(0) as u64;
        let order_id = self.dense_id(row.order_id.as_deref().unwrap_or("0"));

        match row.r#type.as_str() {
            "open" | "received" => {
                let side = match row.side.as_deref() {
                    Some("buy") | Some("bid") => Side::Buy,
                    Some("sell") | Some("ask") => Side::Sell,
                    _ => return None,
                };
                let price = self.ticks(row.price?);
                let quantity = self.lots(row.amount?);
                if quantity <= 0 {
                    return None;
                }
                Some((
                    ts,
                    Command::Add(AddOrder {
                        order_id,
                        user_id: 0,
                        side,
                        price,
                        quantity,
                    }),
                ))
            }
            "done" | "canceled" => Some((ts, Command::Cancel(CancelOrder { order_id }))),
            "change" => {
                let new_price = self.ticks(row.price?);
                let new_quantity = self.lots(row.amount?);
                Some((
                    ts,
                    Command::Modify(ModifyOrder {
                        order_id,
                        new_price,
                        new_quantity,
                    }),
                ))
            }
            _ => None,
        }
    }
}
