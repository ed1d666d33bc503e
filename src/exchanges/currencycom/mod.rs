pub mod builder;
pub mod client;
pub mod codec;
pub mod constants;
pub mod handler;
pub mod rest;
pub mod subscription;
pub mod types;
pub mod websocket;

// Re-export main types for easier importing
pub use builder::build_connector;
pub use client::CurrencycomConnector;
pub use codec::{CurrencycomCodec, CurrencycomWsEvent, Envelope};
pub use handler::{ChannelHandler, MessageHandler};
pub use rest::CurrencycomRestClient;
pub use subscription::{SubscriptionRegistry, SubscriptionSpec};
pub use types::{KlineInterval, QuoteUpdate};
pub use websocket::{Access, MarketStream, SessionState, StreamConfig, StreamHandle};
