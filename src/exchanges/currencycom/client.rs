use crate::core::config::ExchangeConfig;
use crate::core::kernel::{ReqwestRest, RestClient, TungsteniteWs};
use crate::exchanges::currencycom::codec::CurrencycomWsEvent;
use crate::exchanges::currencycom::constants;
use crate::exchanges::currencycom::handler::{ChannelHandler, MessageHandler};
use crate::exchanges::currencycom::rest::CurrencycomRestClient;
use crate::exchanges::currencycom::websocket::{MarketStream, StreamConfig, StreamHandle};
use tokio::sync::mpsc;

/// Currency.com connector: REST transport plus the market-data stream
pub struct CurrencycomConnector<R = ReqwestRest> {
    rest: CurrencycomRestClient<R>,
    config: ExchangeConfig,
}

impl<R: RestClient> CurrencycomConnector<R> {
    pub fn new(rest: CurrencycomRestClient<R>, config: ExchangeConfig) -> Self {
        Self { rest, config }
    }

    /// The REST transport collaborator
    pub fn rest(&self) -> &CurrencycomRestClient<R> {
        &self.rest
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// WebSocket endpoint URL for the configured environment
    pub fn ws_url(&self) -> String {
        self.config.ws_url.clone().unwrap_or_else(|| {
            if self.config.demo {
                constants::DEMO_BASE_WSS_URL.to_string()
            } else {
                constants::BASE_WSS_URL.to_string()
            }
        })
    }

    /// Start a market-data stream delivering events to `handler`
    pub fn market_stream<H: MessageHandler + 'static>(&self, handler: H) -> StreamHandle {
        MarketStream::spawn(TungsteniteWs::new(self.ws_url()), handler)
    }

    /// Start a market-data stream with a custom configuration
    pub fn market_stream_with_config<H: MessageHandler + 'static>(
        &self,
        handler: H,
        config: StreamConfig,
    ) -> StreamHandle {
        MarketStream::spawn_with_config(TungsteniteWs::new(self.ws_url()), handler, config)
    }

    /// Start a market-data stream and consume events through a channel
    pub fn event_stream(
        &self,
        buffer: usize,
    ) -> (StreamHandle, mpsc::Receiver<CurrencycomWsEvent>) {
        let (handler, rx) = ChannelHandler::new(buffer);
        (self.market_stream(handler), rx)
    }
}
