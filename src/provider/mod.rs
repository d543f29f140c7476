//! Authenticated REST clients for each broker.

pub mod http;

#[cfg(feature = "kite")]
pub mod kite;

#[cfg(feature = "angel")]
pub mod angel;

#[cfg(feature = "kite")]
pub use kite::{HistoricalQuery, KiteClient};

#[cfg(feature = "angel")]
pub use angel::AngelClient;
