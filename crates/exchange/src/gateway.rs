use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::models::Side;

/// Single opaque failure type for everything a gateway can do. The core
/// deliberately assumes no richer taxonomy from the exchange side than
/// "it failed".
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("exchange error: {0}")]
    Api(String),
}

/// Exchange-reported position of a single asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub available: f64,
    pub hold: f64,
}

/// Raw order confirmation as returned by the exchange. Fields the
/// exchange omits stay `None`; conversion into a `TradeResult` happens at
/// the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct OrderReceipt {
    pub order_id: Option<String>,
    pub status: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: Option<i64>,
    pub filled_amount: Option<f64>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
}

/// The narrow boundary the execution core depends on. One implementation
/// per supported exchange; selected through a registry keyed by the
/// exchange enum rather than string comparison.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Last-traded price for the pair, in quote currency.
    async fn fetch_ticker(&self, pair: &str) -> Result<f64, GatewayError>;

    /// The set of tradable pairs, in canonical `BASE/QUOTE` form.
    async fn load_markets(&self) -> Result<HashSet<String>, GatewayError>;

    /// All non-zero balances on the account. Doubles as the liveness
    /// probe for credential validation.
    async fn fetch_balance(&self) -> Result<Vec<AssetBalance>, GatewayError>;

    /// Submit a market order. Exactly one attempt; retry policy is the
    /// caller's concern.
    async fn create_market_order(
        &self,
        pair: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderReceipt, GatewayError>;
}
