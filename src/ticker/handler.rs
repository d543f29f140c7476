use serde_json::Value;

use crate::error::BrokerError;
use crate::types::Tick;

/// Receives ticker events. One object replaces the separate callback slots;
/// only [`on_tick`](TickHandler::on_tick) is required.
///
/// Callbacks run on the ticker's supervisor task, so they should return
/// quickly and hand heavy work off elsewhere.
pub trait TickHandler: Send + 'static {
    /// The socket is open and subscriptions have been sent.
    fn on_connect(&mut self) {}

    fn on_tick(&mut self, ticks: &[Tick]);

    /// The socket closed. `code` is the WebSocket close code when the server
    /// sent one.
    fn on_close(&mut self, _code: Option<u16>, _reason: &str) {}

    fn on_error(&mut self, _error: &BrokerError) {}

    /// About to make reconnect attempt number `attempt` (1-based).
    fn on_reconnect(&mut self, _attempt: u32) {}

    /// Reconnect attempts are exhausted; the ticker has stopped.
    fn on_noreconnect(&mut self) {}

    /// Order postback pushed over the socket as `{"type":"order","data":{..}}`.
    fn on_order_update(&mut self, _order: &Value) {}
}
