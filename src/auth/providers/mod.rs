//! Broker-specific login implementations.

#[cfg(feature = "angel")]
pub mod angel;
#[cfg(feature = "kite")]
pub mod kite;
