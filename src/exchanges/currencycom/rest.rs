use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient};
use crate::exchanges::currencycom::constants;
use crate::exchanges::currencycom::types::{
    AccountInfo, AggTrade, ExchangeInfo, Kline, KlineInterval, OrderBook, PriceChange24h,
    ServerTime,
};

/// Typed wrappers over the exchange's REST endpoints
///
/// Public market-data endpoints plus the signed account endpoint. Order
/// management is deliberately not wrapped here.
pub struct CurrencycomRestClient<R = ReqwestRest> {
    rest: R,
}

impl<R: RestClient> CurrencycomRestClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    /// Test connectivity and get the current server time
    pub async fn get_server_time(&self) -> Result<ServerTime, ExchangeError> {
        self.rest.get_json("/time", &[], false).await
    }

    /// Current exchange trading rules and symbol information
    pub async fn get_exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.rest.get_json("/exchangeInfo", &[], false).await
    }

    /// Order book snapshot for a symbol
    pub async fn get_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<OrderBook, ExchangeError> {
        let limit = limit.unwrap_or(100);
        if limit == 0 || limit > constants::DEPTH_MAX_LIMIT {
            return Err(ExchangeError::InvalidParameters(format!(
                "depth limit {} outside 1..={}",
                limit,
                constants::DEPTH_MAX_LIMIT
            )));
        }

        let limit = limit.to_string();
        self.rest
            .get_json("/depth", &[("symbol", symbol), ("limit", &limit)], false)
            .await
    }

    /// Compressed aggregate trades; if both bounds are given the window
    /// must be under one hour (server-enforced)
    pub async fn get_agg_trades(
        &self,
        symbol: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<AggTrade>, ExchangeError> {
        let limit = limit.unwrap_or(500);
        if limit == 0 || limit > constants::AGG_TRADES_MAX_LIMIT {
            return Err(ExchangeError::InvalidParameters(format!(
                "aggTrades limit {} outside 1..={}",
                limit,
                constants::AGG_TRADES_MAX_LIMIT
            )));
        }

        let limit = limit.to_string();
        let start_time = start_time.map(|t| t.to_string());
        let end_time = end_time.map(|t| t.to_string());

        let mut params = vec![("symbol", symbol), ("limit", limit.as_str())];
        if let Some(start) = start_time.as_deref() {
            params.push(("startTime", start));
        }
        if let Some(end) = end_time.as_deref() {
            params.push(("endTime", end));
        }

        self.rest.get_json("/aggTrades", &params, false).await
    }

    /// Candlestick bars for a symbol
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>, ExchangeError> {
        let limit = limit.unwrap_or(500);
        if limit == 0 || limit > constants::KLINES_MAX_LIMIT {
            return Err(ExchangeError::InvalidParameters(format!(
                "klines limit {} outside 1..={}",
                limit,
                constants::KLINES_MAX_LIMIT
            )));
        }

        let limit = limit.to_string();
        let start_time = start_time.map(|t| t.to_string());
        let end_time = end_time.map(|t| t.to_string());

        let mut params = vec![
            ("symbol", symbol),
            ("interval", interval.as_str()),
            ("limit", limit.as_str()),
        ];
        if let Some(start) = start_time.as_deref() {
            params.push(("startTime", start));
        }
        if let Some(end) = end_time.as_deref() {
            params.push(("endTime", end));
        }

        self.rest.get_json("/klines", &params, false).await
    }

    /// 24 hour rolling window price change statistics for one symbol
    pub async fn get_24h_price_change(
        &self,
        symbol: &str,
    ) -> Result<PriceChange24h, ExchangeError> {
        self.rest
            .get_json("/ticker/24hr", &[("symbol", symbol)], false)
            .await
    }

    /// 24 hour rolling window price change statistics for all symbols
    pub async fn get_24h_price_changes(&self) -> Result<Vec<PriceChange24h>, ExchangeError> {
        self.rest.get_json("/ticker/24hr", &[], false).await
    }

    /// Current account information (signed)
    pub async fn get_account_info(
        &self,
        recv_window: Option<u64>,
    ) -> Result<AccountInfo, ExchangeError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        let recv_window = match recv_window {
            Some(window) => {
                if window > constants::RECV_WINDOW_MAX_LIMIT {
                    return Err(ExchangeError::InvalidParameters(format!(
                        "recvWindow {} exceeds max {}",
                        window,
                        constants::RECV_WINDOW_MAX_LIMIT
                    )));
                }
                Some(window.to_string())
            }
            None => None,
        };
        if let Some(window) = recv_window.as_deref() {
            params.push(("recvWindow", window));
        }

        self.rest.get_json("/account", &params, true).await
    }
}
