//! OHLC candles as returned by both brokers' historical endpoints.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BrokerError, Result};

/// One OHLCV bar. `oi` is present only when open interest was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi: Option<u64>,
}

impl Candle {
    /// Decode a `[timestamp, open, high, low, close, volume(, oi)]` row.
    ///
    /// Timestamps are RFC 3339, with or without a colon in the offset
    /// (`+0530` from Kite, `+05:30` from SmartAPI).
    pub fn from_row(row: &Value) -> Result<Self> {
        let fields = row
            .as_array()
            .ok_or_else(|| BrokerError::InvalidState(format!("candle is not an array: {row}")))?;
        if fields.len() < 6 {
            return Err(BrokerError::InvalidState(format!(
                "candle has {} fields, expected at least 6",
                fields.len()
            )));
        }
        let raw_ts = fields[0]
            .as_str()
            .ok_or_else(|| BrokerError::InvalidState("candle timestamp is not a string".into()))?;
        Ok(Self {
            timestamp: parse_timestamp(raw_ts)?,
            open: number(&fields[1], "open")?,
            high: number(&fields[2], "high")?,
            low: number(&fields[3], "low")?,
            close: number(&fields[4], "close")?,
            volume: number(&fields[5], "volume")? as u64,
            oi: fields.get(6).and_then(Value::as_f64).map(|oi| oi as u64),
        })
    }

    pub fn from_rows(rows: &[Value]) -> Result<Vec<Self>> {
        rows.iter().map(Self::from_row).collect()
    }
}

fn number(value: &Value, field: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| BrokerError::InvalidState(format!("candle {field} is not a number: {value}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .map_err(|err| BrokerError::InvalidState(format!("bad candle timestamp {raw}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_kite_row_with_oi() {
        let candle =
            Candle::from_row(&json!(["2024-01-05T09:15:00+0530", 1500.5, 1510, 1495.25, 1505, 12000, 340]))
                .unwrap();
        assert_eq!(candle.high, 1510.0);
        assert_eq!(candle.volume, 12000);
        assert_eq!(candle.oi, Some(340));
        assert_eq!(candle.timestamp.offset().local_minus_utc(), 19800);
    }

    #[test]
    fn decodes_smartapi_row_without_oi() {
        let candle =
            Candle::from_row(&json!(["2025-04-02T09:30:00+05:30", 771.1, 772.0, 770.0, 771.5, 90112]))
                .unwrap();
        assert_eq!(candle.oi, None);
        assert_eq!(candle.timestamp.to_rfc3339(), "2025-04-02T09:30:00+05:30");
    }

    #[test]
    fn rejects_short_rows() {
        assert!(Candle::from_row(&json!(["2025-04-02T09:30:00+05:30", 1, 2])).is_err());
        assert!(Candle::from_row(&json!({"open": 1})).is_err());
    }
}
