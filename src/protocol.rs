//! Inbound wire protocol - fixed-layout packed records, little-endian.
//!
//! Every frame starts with an 11-byte header: type tag (1-byte ASCII),
//! total length (u16, header included), timestamp (u64 nanoseconds).
//! Stop-order and snapshot-request tags exist on the wire but have no
//! matching-engine semantics; they decode to `None` and the caller counts
//! them.

use crate::command::{
    AddAon, AddIceberg, AddOrder, CancelOrder, Command, ExecuteOrder, ModifyOrder, Side, Tif,
};

pub const TAG_ADD_ORDER: u8 = b'A';
pub const TAG_ADD_ICEBERG: u8 = b'I';
pub const TAG_ADD_AON: u8 = b'N';
pub const TAG_CANCEL: u8 = b'X';
pub const TAG_MODIFY: u8 = b'M';
pub const TAG_EXECUTE: u8 = b'E';
pub const TAG_HEARTBEAT: u8 = b'H';
pub const TAG_RESET: u8 = b'R';

pub const SIDE_BUY: u8 = b'B';
pub const SIDE_SELL: u8 = b'S';

pub const HEADER_LEN: usize = 11;
pub const ADD_ORDER_LEN: usize = 44;
pub const ADD_ICEBERG_LEN: usize = 52;
pub const ADD_AON_LEN: usize = 44;
pub const CANCEL_LEN: usize = 19;
pub const MODIFY_LEN: usize = 35;
pub const EXECUTE_LEN: usize = 45;
pub const HEARTBEAT_LEN: usize = 11;
pub const RESET_LEN: usize = 11;

#[inline]
fn u16_at(buf: &[u8], off: usize) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&buf[off..off + 2]);
    u16::from_le_bytes(b)
}

#[inline]
fn u64_at(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

#[inline]
fn i64_at(buf: &[u8], off: usize) -> i64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    i64::from_le_bytes(b)
}

#[inline]
fn side_from(b: u8) -> Option<Side> {
    match b {
        SIDE_BUY => Some(Side::Buy),
        SIDE_SELL => Some(Side::Sell),
        _ => None,
    }
}

#[inline]
fn side_byte(side: Side) -> u8 {
    match side {
        Side::Buy => SIDE_BUY,
        Side::Sell => SIDE_SELL,
    }
}

/// Expected total frame length for a tag, `None` for unrecognised tags.
pub fn frame_len(tag: u8) -> Option<usize> {
    match tag {
        TAG_ADD_ORDER => Some(ADD_ORDER_LEN),
        TAG_ADD_ICEBERG => Some(ADD_ICEBERG_LEN),
        TAG_ADD_AON => Some(ADD_AON_LEN),
        TAG_CANCEL => Some(CANCEL_LEN),
        TAG_MODIFY => Some(MODIFY_LEN),
        TAG_EXECUTE => Some(EXECUTE_LEN),
        TAG_HEARTBEAT => Some(HEARTBEAT_LEN),
        TAG_RESET => Some(RESET_LEN),
        _ => None,
    }
}

/// Decode one frame into `(timestamp, command)`. Short frames, length
/// mismatches, bad side/TIF bytes, and unknown tags all yield `None`.
pub fn decode(frame: &[u8]) -> Option<(u64, Command)> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    let tag = frame[0];
    let length = u16_at(frame, 1) as usize;
    let expected = frame_len(tag)?;
    if length != expected || frame.len() < length {
        return None;
    }
    let ts = u64_at(frame, 3);

    let cmd = match tag {
        TAG_ADD_ORDER => Command::Add(AddOrder {
            order_id: u64_at(frame, 11),
            user_id: u64_at(frame, 19),
            side: side_from(frame[27])?,
            price: i64_at(frame, 28),
            quantity: i64_at(frame, 36),
        }),
        TAG_ADD_ICEBERG => Command::AddIceberg(AddIceberg {
            order_id: u64_at(frame, 11),
            user_id: u64_at(frame, 19),
            side: side_from(frame[27])?,
            price: i64_at(frame, 28),
            total_quantity: i64_at(frame, 36),
            visible_quantity: i64_at(frame, 44),
        }),
        TAG_ADD_AON => Command::AddAon(AddAon {
            order_id: u64_at(frame, 11),
            user_id: u64_at(frame, 19),
            side: side_from(frame[27])?,
            price: i64_at(frame, 28),
            quantity: i64_at(frame, 36),
        }),
        TAG_CANCEL => Command::Cancel(CancelOrder {
            order_id: u64_at(frame, 11),
        }),
        TAG_MODIFY => Command::Modify(ModifyOrder {
            order_id: u64_at(frame, 11),
            new_price: i64_at(frame, 19),
            new_quantity: i64_at(frame, 27),
        }),
        TAG_EXECUTE => Command::Execute(ExecuteOrder {
            order_id: u64_at(frame, 11),
            user_id: u64_at(frame, 19),
            side: side_from(frame[27])?,
            price: i64_at(frame, 28),
            quantity: i64_at(frame, 36),
            tif: Tif::from_u8(frame[44])?,
        }),
        TAG_HEARTBEAT => Command::Heartbeat,
        TAG_RESET => Command::Reset,
        _ => return None,
    };
    Some((ts, cmd))
}

fn write_header(buf: &mut [u8], tag: u8, ts: u64) {
    buf[0] = tag;
    let len = buf.len() as u16;
    buf[1..3].copy_from_slice(&len.to_le_bytes());
    buf[3..11].copy_from_slice(&ts.to_le_bytes());
}

pub fn encode_add_order(
    ts: u64,
    order_id: u64,
    user_id: u64,
    side: Side,
    price: i64,
    quantity: i64,
) -> [u8; ADD_ORDER_LEN] {
    let mut buf = [0u8; ADD_ORDER_LEN];
    write_header(&mut buf, TAG_ADD_ORDER, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf[19..27].copy_from_slice(&user_id.to_le_bytes());
    buf[27] = side_byte(side);
    buf[28..36].copy_from_slice(&price.to_le_bytes());
    buf[36..44].copy_from_slice(&quantity.to_le_bytes());
    buf
}

#[allow(clippy::too_many_arguments)]
pub fn encode_add_iceberg(
    ts: u64,
    order_id: u64,
    user_id: u64,
    side: Side,
    price: i64,
    total_quantity: i64,
    visible_quantity: i64,
) -> [u8; ADD_ICEBERG_LEN] {
    let mut buf = [0u8; ADD_ICEBERG_LEN];
    write_header(&mut buf, TAG_ADD_ICEBERG, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf[19..27].copy_from_slice(&user_id.to_le_bytes());
    buf[27] = side_byte(side);
    buf[28..36].copy_from_slice(&price.to_le_bytes());
    buf[36..44].copy_from_slice(&total_quantity.to_le_bytes());
    buf[44..52].copy_from_slice(&visible_quantity.to_le_bytes());
    buf
}

pub fn encode_add_aon(
    ts: u64,
    order_id: u64,
    user_id: u64,
    side: Side,
    price: i64,
    quantity: i64,
) -> [u8; ADD_AON_LEN] {
    let mut buf = [0u8; ADD_AON_LEN];
    write_header(&mut buf, TAG_ADD_AON, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf[19..27].copy_from_slice(&user_id.to_le_bytes());
    buf[27] = side_byte(side);
    buf[28..36].copy_from_slice(&price.to_le_bytes());
    buf[36..44].copy_from_slice(&quantity.to_le_bytes());
    buf
}

pub fn encode_cancel(ts: u64, order_id: u64) -> [u8; CANCEL_LEN] {
    let mut buf = [0u8; CANCEL_LEN];
    write_header(&mut buf, TAG_CANCEL, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf
}

pub fn encode_modify(ts: u64, order_id: u64, new_price: i64, new_quantity: i64) -> [u8; MODIFY_LEN] {
    let mut buf = [0u8; MODIFY_LEN];
    write_header(&mut buf, TAG_MODIFY, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf[19..27].copy_from_slice(&new_price.to_le_bytes());
    buf[27..35].copy_from_slice(&new_quantity.to_le_bytes());
    buf
}

#[allow(clippy::too_many_arguments)]
pub fn encode_execute(
    ts: u64,
    order_id: u64,
    user_id: u64,
    side: Side,
    price: i64,
    quantity: i64,
    tif: Tif,
) -> [u8; EXECUTE_LEN] {
    let mut buf = [0u8; EXECUTE_LEN];
    write_header(&mut buf, TAG_EXECUTE, ts);
    buf[11..19].copy_from_slice(&order_id.to_le_bytes());
    buf[19..27].copy_from_slice(&user_id.to_le_bytes());
    buf[27] = side_byte(side);
    buf[28..36].copy_from_slice(&price.to_le_bytes());
    buf[36..44].copy_from_slice(&quantity.to_le_bytes());
    buf[44] = tif as u8;
    buf
}

pub fn encode_heartbeat(ts: u64) -> [u8; HEARTBEAT_LEN] {
    let mut buf = [0u8; HEARTBEAT_LEN];
    write_header(&mut buf, TAG_HEARTBEAT, ts);
    buf
}

pub fn encode_reset(ts: u64) -> [u8; RESET_LEN] {
    let mut buf = [0u8; RESET_LEN];
    write_header(&mut buf, TAG_RESET, ts);
    buf
}

/// A market buy: EXECUTE at the maximum price, IOC.
pub fn market_buy(ts: u64, order_id: u64, user_id: u64, quantity: i64) -> [u8; EXECUTE_LEN] {
    encode_execute(ts, order_id, user_id, Side::Buy, i64::MAX, quantity, Tif::Ioc)
}

/// A market sell: EXECUTE at the minimum price, IOC.
pub fn market_sell(ts: u64, order_id: u64, user_id: u64, quantity: i64) -> [u8; EXECUTE_LEN] {
    encode_execute(ts, order_id, user_id, Side::Sell, 0, quantity, Tif::Ioc)
}
