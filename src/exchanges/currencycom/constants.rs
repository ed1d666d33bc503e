//! Endpoint URLs and parameter caps for the currency.com API

pub const BASE_URL: &str = "https://api-adapter.backend.currency.com/api/v1";
pub const DEMO_BASE_URL: &str = "https://demo-api-adapter.backend.currency.com/api/v1";

pub const BASE_WSS_URL: &str = "wss://api-adapter.backend.currency.com/connect";
pub const DEMO_BASE_WSS_URL: &str = "wss://demo-api-adapter.backend.currency.com/connect";

pub const DEPTH_MAX_LIMIT: u32 = 1000;
pub const AGG_TRADES_MAX_LIMIT: u32 = 1000;
pub const KLINES_MAX_LIMIT: u32 = 1000;
pub const RECV_WINDOW_MAX_LIMIT: u64 = 60_000;
