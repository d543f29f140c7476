//! Kite Connect market data types.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::error::{BrokerError, Result};

/// Candle interval accepted by the historical endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
pub enum KiteInterval {
    #[strum(serialize = "minute")]
    #[serde(rename = "minute")]
    Minute,
    #[strum(serialize = "3minute")]
    #[serde(rename = "3minute")]
    ThreeMinute,
    #[strum(serialize = "5minute")]
    #[serde(rename = "5minute")]
    FiveMinute,
    #[strum(serialize = "10minute")]
    #[serde(rename = "10minute")]
    TenMinute,
    #[strum(serialize = "15minute")]
    #[serde(rename = "15minute")]
    FifteenMinute,
    #[strum(serialize = "30minute")]
    #[serde(rename = "30minute")]
    ThirtyMinute,
    #[strum(serialize = "60minute")]
    #[serde(rename = "60minute")]
    SixtyMinute,
    #[strum(serialize = "day")]
    #[serde(rename = "day")]
    Day,
}

/// Exchange segment, encoded in the low byte of an instrument token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Segment {
    Nse,
    Nfo,
    Cds,
    Bse,
    Bfo,
    Bcd,
    Mcx,
    Mcxsx,
    Indices,
}

impl Segment {
    pub fn from_token(instrument_token: u32) -> Option<Self> {
        match instrument_token & 0xff {
            1 => Some(Self::Nse),
            2 => Some(Self::Nfo),
            3 => Some(Self::Cds),
            4 => Some(Self::Bse),
            5 => Some(Self::Bfo),
            6 => Some(Self::Bcd),
            7 => Some(Self::Mcx),
            8 => Some(Self::Mcxsx),
            9 => Some(Self::Indices),
            _ => None,
        }
    }

    /// Divisor turning a wire price into rupees.
    pub fn price_divisor(self) -> f64 {
        match self {
            Self::Cds => 10_000_000.0,
            Self::Bcd => 10_000.0,
            _ => 100.0,
        }
    }
}

/// Last traded price for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ltp {
    pub instrument_token: u32,
    pub last_price: f64,
}

/// A row of the instruments dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: u32,
    pub exchange_token: u32,
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "default_if_blank")]
    pub last_price: f64,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    #[serde(deserialize_with = "default_if_blank")]
    pub strike: f64,
    #[serde(deserialize_with = "default_if_blank")]
    pub tick_size: f64,
    #[serde(deserialize_with = "default_if_blank")]
    pub lot_size: u32,
    pub instrument_type: String,
    pub segment: String,
    pub exchange: String,
}

impl Instrument {
    /// Parse the CSV body of `GET /instruments[/<exchange>]`.
    ///
    /// Columns are matched by header name, so extra or reordered columns are
    /// tolerated. Blank numeric fields read as zero and a blank expiry as
    /// `None`.
    pub fn parse_csv(body: &str) -> Result<Vec<Self>> {
        if body.trim().is_empty() {
            return Err(BrokerError::InvalidState("empty instruments dump".into()));
        }
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes())
            .deserialize()
            .enumerate()
            .map(|(row, record)| {
                record.map_err(|err| {
                    BrokerError::InvalidState(format!("instruments row {}: {err}", row + 1))
                })
            })
            .collect()
    }
}

fn default_if_blank<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse().map_err(de::Error::custom)
}
