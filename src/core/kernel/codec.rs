use crate::core::errors::ExchangeError;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for the exchange's WebSocket wire format
///
/// Converts between raw WebSocket messages and typed events. Outbound
/// messages carry a correlation id assigned by the session, which owns
/// the counter; the codec only knows how to put it on the wire.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed inbound messages
    type Message: Send;

    /// The type describing a logical subscription request
    type Subscribe: Send + Sync;

    /// Encode an arbitrary outbound message
    fn encode_message(
        &self,
        destination: &str,
        payload: Value,
        correlation_id: u64,
    ) -> Result<Message, ExchangeError>;

    /// Encode a subscription request
    fn encode_subscription(
        &self,
        spec: &Self::Subscribe,
        correlation_id: u64,
    ) -> Result<Message, ExchangeError>;

    /// Encode an application-level liveness probe
    fn encode_ping(&self, correlation_id: u64) -> Result<Message, ExchangeError>;

    /// Decode a raw WebSocket message into a typed event
    ///
    /// Control frames (ping, pong, close) are handled at the transport
    /// level and never reach the codec.
    ///
    /// # Returns
    /// - `Ok(Some(event))` - Successfully decoded message
    /// - `Ok(None)` - Message was ignored/discarded by the codec
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: &Message) -> Result<Option<Self::Message>, ExchangeError>;
}
