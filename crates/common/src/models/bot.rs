use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::Exchange;

/// Units of a bot's configured `position_size`.
///
/// The original deployment was ambiguous about whether sizes were quote
/// notionals or base quantities; here the configuration states it
/// explicitly and the sizer behaves accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Size is a quote-currency notional; converted to a base amount
    /// against the live price at execution time.
    NotionalQuote,
    /// Size is already a base-asset quantity; used as-is.
    BaseQuantity,
}

impl SizingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotionalQuote => "notional_quote",
            Self::BaseQuantity => "base_quantity",
        }
    }
}

impl fmt::Display for SizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notional_quote" => Ok(Self::NotionalQuote),
            "base_quantity" => Ok(Self::BaseQuantity),
            other => Err(format!("unknown sizing mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bot {
    pub id: i64,
    /// Opaque capability token. Issued exactly once at creation, never
    /// regenerated; uniqueness backed by a storage constraint.
    pub bot_id: String,
    pub user_id: i64,
    pub name: Option<String>,
    pub trading_pair: Option<String>,
    pub sizing_mode: SizingMode,
    pub position_size: Option<Decimal>,
    /// When true the size comes from the signal payload instead of config.
    pub use_external_position_size: bool,
    pub is_active: bool,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub total_trades: i64,
}

impl Bot {
    /// The alert-message template a user pastes into their charting
    /// service. Placeholders are expanded by the alerting service, not by
    /// us.
    pub fn webhook_message(&self, exchange: Exchange) -> serde_json::Value {
        json!({
            "bot_id": self.bot_id,
            "Pair": "{{syminfo.basecurrency}}/{{syminfo.currency}}",
            "position_size": "{{strategy.position_size}}",
            "exchange": exchange.as_str(),
            "timestamp": "{{time}}",
            "side": "{{strategy.order.action}}",
        })
    }

    pub fn webhook_url(&self, public_base_url: &str) -> String {
        format!(
            "{}/webhook/{}",
            public_base_url.trim_end_matches('/'),
            self.bot_id
        )
    }
}
