use crate::core::errors::ExchangeError;
use crate::exchanges::currencycom::codec::CurrencycomWsEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Consumer of decoded stream events
///
/// One handler is injected at stream construction and receives every
/// decoded inbound message synchronously, in receive order. There is no
/// internal buffering: a slow handler blocks the receive loop. An error
/// returned here ends the session and is routed through the normal
/// reconnect path.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, event: CurrencycomWsEvent) -> Result<(), ExchangeError>;
}

/// Handler that forwards events into a bounded channel
///
/// Decouples consumption from the receive loop for callers that prefer a
/// `Receiver` over implementing `MessageHandler`. If the receiver is
/// dropped, the handler reports a connection error and the stream winds
/// down through its usual failure path.
pub struct ChannelHandler {
    tx: mpsc::Sender<CurrencycomWsEvent>,
}

impl ChannelHandler {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<CurrencycomWsEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageHandler for ChannelHandler {
    async fn on_message(&self, event: CurrencycomWsEvent) -> Result<(), ExchangeError> {
        self.tx.send(event).await.map_err(|_| {
            ExchangeError::ConnectionError("event consumer dropped".to_string())
        })
    }
}
