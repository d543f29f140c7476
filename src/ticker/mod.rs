//! Streaming market data over the Kite ticker WebSocket.

pub mod codec;
pub mod handler;
pub mod session;

pub use codec::parse_frame;
pub use handler::TickHandler;
pub use session::{KiteTicker, TickerHandle, TickerOptions, TickerTransport};
