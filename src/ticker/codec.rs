//! Decoder for the Kite ticker's binary frames.
//!
//! A frame is a big-endian `i16` packet count followed by that many
//! `i16`-length-prefixed packets. The packet length tells the mode:
//!
//! | length | layout                                 |
//! |--------|----------------------------------------|
//! | 8      | LTP                                    |
//! | 28     | index quote                            |
//! | 32     | index full (adds exchange timestamp)   |
//! | 44     | quote                                  |
//! | 184    | full (adds OI, timestamps and depth)   |
//!
//! A single-byte frame is a heartbeat.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BrokerError, Result};
use crate::types::{Depth, DepthLevel, Ohlc, Segment, Tick, TickMode};

const LTP_LEN: usize = 8;
const INDEX_QUOTE_LEN: usize = 28;
const INDEX_FULL_LEN: usize = 32;
const QUOTE_LEN: usize = 44;
const FULL_LEN: usize = 184;

const DEPTH_OFFSET: usize = 64;
const DEPTH_LEVELS: usize = 5;
const DEPTH_ENTRY_LEN: usize = 12;

/// Decode one binary frame. Heartbeats yield no ticks; packets of an
/// unknown length are skipped.
pub fn parse_frame(data: &[u8]) -> Result<Vec<Tick>> {
    if data.len() < 2 {
        return Ok(Vec::new());
    }
    let count = BigEndian::read_i16(&data[0..2]).max(0) as usize;
    let mut ticks = Vec::with_capacity(count);
    let mut offset = 2;

    for index in 0..count {
        let header = data.get(offset..offset + 2).ok_or_else(|| truncated(index))?;
        let len = BigEndian::read_i16(header).max(0) as usize;
        offset += 2;
        let packet = data.get(offset..offset + len).ok_or_else(|| truncated(index))?;
        offset += len;

        match parse_packet(packet) {
            Some(tick) => ticks.push(tick),
            None => debug!(len, "skipping ticker packet of unknown length"),
        }
    }
    Ok(ticks)
}

fn truncated(index: usize) -> BrokerError {
    BrokerError::Stream(format!("ticker frame truncated at packet {index}"))
}

fn parse_packet(packet: &[u8]) -> Option<Tick> {
    if packet.len() < LTP_LEN {
        return None;
    }
    let instrument_token = BigEndian::read_u32(&packet[0..4]);
    let segment = Segment::from_token(instrument_token);
    let divisor = segment.map_or(100.0, Segment::price_divisor);
    let tradable = segment != Some(Segment::Indices);
    let price = |at: usize| BigEndian::read_i32(&packet[at..at + 4]) as f64 / divisor;
    let uint = |at: usize| BigEndian::read_u32(&packet[at..at + 4]);

    let mut tick = Tick {
        instrument_token,
        tradable,
        last_price: price(4),
        ..Tick::default()
    };

    match packet.len() {
        LTP_LEN => tick.mode = TickMode::Ltp,
        INDEX_QUOTE_LEN | INDEX_FULL_LEN => {
            tick.mode = if packet.len() == INDEX_FULL_LEN {
                TickMode::Full
            } else {
                TickMode::Quote
            };
            let ohlc = Ohlc {
                high: price(8),
                low: price(12),
                open: price(16),
                close: price(20),
            };
            tick.change = Some(percent_change(tick.last_price, ohlc.close));
            tick.ohlc = Some(ohlc);
            if packet.len() == INDEX_FULL_LEN {
                tick.exchange_timestamp = timestamp(uint(28));
            }
        }
        QUOTE_LEN | FULL_LEN => {
            tick.mode = if packet.len() == FULL_LEN {
                TickMode::Full
            } else {
                TickMode::Quote
            };
            tick.last_traded_quantity = Some(uint(8));
            tick.average_traded_price = Some(price(12));
            tick.volume_traded = Some(uint(16));
            tick.total_buy_quantity = Some(uint(20));
            tick.total_sell_quantity = Some(uint(24));
            let ohlc = Ohlc {
                open: price(28),
                high: price(32),
                low: price(36),
                close: price(40),
            };
            tick.change = Some(percent_change(tick.last_price, ohlc.close));
            tick.ohlc = Some(ohlc);

            if packet.len() == FULL_LEN {
                tick.last_trade_time = timestamp(uint(44));
                tick.oi = Some(uint(48));
                tick.oi_day_high = Some(uint(52));
                tick.oi_day_low = Some(uint(56));
                tick.exchange_timestamp = timestamp(uint(60));
                tick.depth = Some(parse_depth(packet, divisor));
            }
        }
        _ => return None,
    }
    Some(tick)
}

fn parse_depth(packet: &[u8], divisor: f64) -> Depth {
    let level = |i: usize| {
        let at = DEPTH_OFFSET + i * DEPTH_ENTRY_LEN;
        DepthLevel {
            quantity: BigEndian::read_u32(&packet[at..at + 4]),
            price: BigEndian::read_i32(&packet[at + 4..at + 8]) as f64 / divisor,
            orders: BigEndian::read_u16(&packet[at + 8..at + 10]),
        }
    };
    Depth {
        buy: (0..DEPTH_LEVELS).map(level).collect(),
        sell: (DEPTH_LEVELS..2 * DEPTH_LEVELS).map(level).collect(),
    }
}

fn percent_change(last: f64, close: f64) -> f64 {
    if close == 0.0 {
        0.0
    } else {
        (last - close) * 100.0 / close
    }
}

fn timestamp(secs: u32) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(i64::from(secs), 0)
}
