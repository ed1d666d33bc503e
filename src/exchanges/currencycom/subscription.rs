use serde_json::{json, Value};
use std::sync::Mutex;

/// A logical subscription request
///
/// The exchange forgets server-side subscription state on every physical
/// reconnect, so these are kept for the lifetime of the stream and
/// replayed after each successful (re)connect. There is no unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionSpec {
    MarketData {
        symbols: Vec<String>,
    },
    DepthMarketData {
        symbols: Vec<String>,
    },
    OhlcMarketData {
        intervals: Vec<String>,
        symbols: Vec<String>,
    },
}

impl SubscriptionSpec {
    pub fn market_data(symbols: Vec<String>) -> Self {
        Self::MarketData { symbols }
    }

    pub fn depth_market_data(symbols: Vec<String>) -> Self {
        Self::DepthMarketData { symbols }
    }

    pub fn ohlc_market_data(intervals: Vec<String>, symbols: Vec<String>) -> Self {
        Self::OhlcMarketData { intervals, symbols }
    }

    /// Wire destination for this subscription
    pub const fn destination(&self) -> &'static str {
        match self {
            Self::MarketData { .. } => "marketData.subscribe",
            Self::DepthMarketData { .. } => "depthMarketData.subscribe",
            Self::OhlcMarketData { .. } => "OHLCMarketData.subscribe",
        }
    }

    /// Wire payload for this subscription
    pub fn payload(&self) -> Value {
        match self {
            Self::MarketData { symbols } | Self::DepthMarketData { symbols } => {
                json!({ "symbols": symbols })
            }
            Self::OhlcMarketData { intervals, symbols } => {
                json!({ "intervals": intervals, "symbols": symbols })
            }
        }
    }
}

/// Deduplicated set of active logical subscriptions
///
/// Written by the caller, read (snapshotted) by the reconnect supervisor.
/// Insertion order is kept only to make replay deterministic.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<SubscriptionSpec>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription; no-op if an equivalent spec is already present.
    /// Returns `true` if the spec was newly inserted.
    pub fn add(&self, spec: SubscriptionSpec) -> bool {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        if entries.contains(&spec) {
            return false;
        }
        entries.push(spec);
        true
    }

    /// Copy of the current subscription set, for replay after reconnect
    pub fn snapshot(&self) -> Vec<SubscriptionSpec> {
        self.entries.lock().expect("registry mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
