use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::exchanges::currencycom::subscription::SubscriptionSpec;
use crate::exchanges::currencycom::types::QuoteUpdate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Destination of the application-level liveness probe
pub const PING_DESTINATION: &str = "ping";

/// Destination carried by quote stream events
pub const QUOTE_DESTINATION: &str = "internal.quote";

/// Wire-level message wrapper
///
/// Every frame in either direction is a JSON object with a destination,
/// a per-connection correlation id and an arbitrary payload. Inbound
/// frames occasionally capitalize the keys, hence the aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(alias = "Destination")]
    pub destination: String,
    #[serde(default)]
    pub correlation_id: u64,
    #[serde(default, alias = "Payload")]
    pub payload: Value,
}

/// Inbound stream events
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencycomWsEvent {
    /// A quote update on a subscribed symbol
    Quote(QuoteUpdate),
    /// Any other destination, surfaced as the raw envelope
    Raw(Envelope),
}

/// Codec for the currency.com `/connect` WebSocket endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrencycomCodec;

impl CurrencycomCodec {
    fn encode_envelope(
        destination: &str,
        payload: Value,
        correlation_id: u64,
    ) -> Result<Message, ExchangeError> {
        let envelope = Envelope {
            destination: destination.to_string(),
            correlation_id,
            payload,
        };
        let text = serde_json::to_string(&envelope).map_err(|e| {
            ExchangeError::SerializationError(format!("Failed to encode envelope: {}", e))
        })?;
        Ok(Message::Text(text))
    }
}

impl WsCodec for CurrencycomCodec {
    type Message = CurrencycomWsEvent;
    type Subscribe = SubscriptionSpec;

    fn encode_message(
        &self,
        destination: &str,
        payload: Value,
        correlation_id: u64,
    ) -> Result<Message, ExchangeError> {
        Self::encode_envelope(destination, payload, correlation_id)
    }

    fn encode_subscription(
        &self,
        spec: &SubscriptionSpec,
        correlation_id: u64,
    ) -> Result<Message, ExchangeError> {
        Self::encode_envelope(spec.destination(), spec.payload(), correlation_id)
    }

    fn encode_ping(&self, correlation_id: u64) -> Result<Message, ExchangeError> {
        Self::encode_envelope(PING_DESTINATION, json!({}), correlation_id)
    }

    fn decode_message(&self, message: &Message) -> Result<Option<Self::Message>, ExchangeError> {
        let Message::Text(text) = message else {
            return Ok(None);
        };

        // Malformed frames are not fatal and not reported
        let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
            return Ok(None);
        };

        if envelope.destination == QUOTE_DESTINATION {
            if let Ok(quote) = serde_json::from_value::<QuoteUpdate>(envelope.payload.clone()) {
                return Ok(Some(CurrencycomWsEvent::Quote(quote)));
            }
        }

        Ok(Some(CurrencycomWsEvent::Raw(envelope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_round_trip_preserves_symbols() {
        let codec = CurrencycomCodec;
        let spec = SubscriptionSpec::market_data(vec![
            "BTC/USD".to_string(),
            "ETH/USD".to_string(),
        ]);

        let encoded = codec.encode_subscription(&spec, 1).unwrap();
        let Message::Text(text) = encoded else {
            panic!("expected a text frame");
        };

        let envelope: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope.destination, "marketData.subscribe");
        assert_eq!(envelope.correlation_id, 1);
        assert_eq!(
            envelope.payload["symbols"],
            serde_json::json!(["BTC/USD", "ETH/USD"])
        );
    }

    #[test]
    fn test_ping_frame_shape() {
        let codec = CurrencycomCodec;
        let Message::Text(text) = codec.encode_ping(7).unwrap() else {
            panic!("expected a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["destination"], "ping");
        assert_eq!(value["correlationId"], 7);
        assert_eq!(value["payload"], serde_json::json!({}));
    }

    #[test]
    fn test_decode_quote_event() {
        let codec = CurrencycomCodec;
        let frame = Message::Text(
            r#"{
                "status": "OK",
                "destination": "internal.quote",
                "payload": {
                    "symbolName": "BTC/USD",
                    "bid": 10000.5,
                    "bidQty": 1.0,
                    "ofr": 10001.0,
                    "ofrQty": 2.0,
                    "timestamp": 1597850971558
                }
            }"#
            .to_string(),
        );

        match codec.decode_message(&frame).unwrap() {
            Some(CurrencycomWsEvent::Quote(quote)) => {
                assert_eq!(quote.symbol_name, "BTC/USD");
                assert_eq!(quote.timestamp, 1_597_850_971_558);
            }
            other => panic!("expected a quote event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_capitalized_keys() {
        let codec = CurrencycomCodec;
        let frame = Message::Text(
            r#"{"Destination": "marketData.subscribe", "Payload": {"status": "PROCESSED"}}"#
                .to_string(),
        );
        match codec.decode_message(&frame).unwrap() {
            Some(CurrencycomWsEvent::Raw(envelope)) => {
                assert_eq!(envelope.destination, "marketData.subscribe");
            }
            other => panic!("expected a raw envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_frame_discarded() {
        let codec = CurrencycomCodec;
        let frame = Message::Text("not json at all".to_string());
        assert!(codec.decode_message(&frame).unwrap().is_none());
    }

    #[test]
    fn test_binary_frame_discarded() {
        let codec = CurrencycomCodec;
        let frame = Message::Binary(vec![0x01, 0x02]);
        assert!(codec.decode_message(&frame).unwrap().is_none());
    }
}
