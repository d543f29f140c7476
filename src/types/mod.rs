//! Broker data types shared by the clients, the ticker and the CLI.

pub mod angel;
pub mod candle;
pub mod kite;
pub mod tick;

pub use candle::Candle;
pub use kite::{Instrument, KiteInterval, Ltp, Segment};
pub use tick::{Depth, DepthLevel, Ohlc, Tick, TickMode};
