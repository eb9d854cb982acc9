use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    Coinbase,
    BinanceUs,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coinbase => "coinbase",
            Self::BinanceUs => "binanceus",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coinbase" => Ok(Self::Coinbase),
            "binanceus" | "binance_us" => Ok(Self::BinanceUs),
            other => Err(format!("unknown exchange: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Demo,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "demo" => Ok(Self::Demo),
            other => Err(format!("unknown account status: {}", other)),
        }
    }
}

/// One opaque key/secret pair as handed out by an exchange.
#[derive(Debug, Clone)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub preferred_exchange: Exchange,
    pub coinbase_api_key: Option<String>,
    pub coinbase_api_secret: Option<String>,
    pub binanceus_api_key: Option<String>,
    pub binanceus_api_secret: Option<String>,
    pub account_status: AccountStatus,
    pub max_active_bots: i64,
    pub max_daily_trades: i64,
    pub max_position_size: Decimal,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Credentials for the given exchange, `None` when either half is
    /// missing or empty.
    pub fn credentials_for(&self, exchange: Exchange) -> Option<ExchangeCredentials> {
        let (key, secret) = match exchange {
            Exchange::Coinbase => (&self.coinbase_api_key, &self.coinbase_api_secret),
            Exchange::BinanceUs => (&self.binanceus_api_key, &self.binanceus_api_secret),
        };

        match (key, secret) {
            (Some(k), Some(s)) if !k.is_empty() && !s.is_empty() => Some(ExchangeCredentials {
                api_key: k.clone(),
                api_secret: s.clone(),
            }),
            _ => None,
        }
    }
}
