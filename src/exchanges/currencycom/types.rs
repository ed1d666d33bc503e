use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Candlestick chart intervals accepted by the klines endpoint and the
/// OHLC subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineInterval {
    Minute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    Hour,
    FourHours,
    Day,
    Week,
}

impl KlineInterval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::Hour => "1h",
            Self::FourHours => "4h",
            Self::Day => "1d",
            Self::Week => "1w",
        }
    }
}

impl std::fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub server_time: i64,
    #[serde(default)]
    pub rate_limits: Vec<Value>,
    #[serde(default)]
    pub exchange_filters: Vec<Value>,
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub base_asset: Option<String>,
    #[serde(default)]
    pub quote_asset: Option<String>,
    #[serde(default)]
    pub quote_asset_precision: Option<u32>,
    #[serde(default)]
    pub market_type: Option<String>,
    #[serde(default)]
    pub filters: Vec<Value>,
}

/// Order book snapshot from the `depth` endpoint; price levels are
/// `[price, quantity]` pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub last_update_id: i64,
    pub bids: Vec<[Decimal; 2]>,
    pub asks: Vec<[Decimal; 2]>,
}

/// A single aggregate trade; the exchange uses Binance's compressed keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggTrade {
    #[serde(rename = "a")]
    pub trade_id: Option<i64>,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "q")]
    pub quantity: Decimal,
    #[serde(rename = "T")]
    pub timestamp: i64,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

/// One candlestick as returned by the klines endpoint:
/// `[open_time, open, high, low, close, volume]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline(
    pub i64,
    pub Decimal,
    pub Decimal,
    pub Decimal,
    pub Decimal,
    pub Decimal,
);

impl Kline {
    pub const fn open_time(&self) -> i64 {
        self.0
    }
    pub const fn open(&self) -> Decimal {
        self.1
    }
    pub const fn high(&self) -> Decimal {
        self.2
    }
    pub const fn low(&self) -> Decimal {
        self.3
    }
    pub const fn close(&self) -> Decimal {
        self.4
    }
    pub const fn volume(&self) -> Decimal {
        self.5
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange24h {
    pub symbol: String,
    #[serde(default)]
    pub price_change: Option<Decimal>,
    #[serde(default)]
    pub price_change_percent: Option<Decimal>,
    #[serde(default)]
    pub prev_close_price: Option<Decimal>,
    #[serde(default)]
    pub last_price: Option<Decimal>,
    #[serde(default)]
    pub bid_price: Option<Decimal>,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
    #[serde(default)]
    pub open_price: Option<Decimal>,
    #[serde(default)]
    pub high_price: Option<Decimal>,
    #[serde(default)]
    pub low_price: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub quote_volume: Option<Decimal>,
    #[serde(default)]
    pub open_time: i64,
    #[serde(default)]
    pub close_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub can_withdraw: bool,
    #[serde(default)]
    pub can_deposit: bool,
    #[serde(default)]
    pub update_time: i64,
    pub balances: Vec<Balance>,
}

/// Payload of an `internal.quote` stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteUpdate {
    pub symbol_name: String,
    pub bid: f64,
    pub bid_qty: f64,
    pub ofr: f64,
    pub ofr_qty: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}
