use chrono::{DateTime, Utc};
use serde::Serialize;

/// Confirmed execution details extracted from a gateway order response.
/// Any field the exchange omits stays `None` rather than being defaulted.
#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
}
