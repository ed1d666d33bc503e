pub mod core;
pub mod exchanges;

pub use crate::core::config::ExchangeConfig;
pub use crate::core::errors::ExchangeError;
pub use crate::exchanges::currencycom::{
    build_connector, CurrencycomConnector, CurrencycomWsEvent, MessageHandler, SessionState,
    StreamHandle, SubscriptionSpec,
};
