use std::sync::Arc;
use std::time::Duration;

use common::models::{Exchange, ExchangeCredentials};

use crate::coinbase::{CoinbaseGateway, DEFAULT_BASE_URL};
use crate::gateway::ExchangeGateway;

/// Maps an exchange to a gateway built around a specific credential pair.
/// Returning `None` means the exchange has no wired implementation;
/// callers surface that as `ExchangeNotSupported`.
pub trait GatewayProvider: Send + Sync {
    fn gateway(
        &self,
        exchange: Exchange,
        credentials: &ExchangeCredentials,
    ) -> Option<Arc<dyn ExchangeGateway>>;
}

/// Production registry. Adding an exchange means adding one constructor
/// arm here and one implementation module, not editing conditionals at
/// call sites.
pub struct HttpGatewayRegistry {
    coinbase_base_url: String,
    call_timeout: Duration,
}

impl HttpGatewayRegistry {
    pub fn new(coinbase_base_url: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            coinbase_base_url: coinbase_base_url.into(),
            call_timeout,
        }
    }

    pub fn with_defaults(call_timeout: Duration) -> Self {
        Self::new(DEFAULT_BASE_URL, call_timeout)
    }
}

impl GatewayProvider for HttpGatewayRegistry {
    fn gateway(
        &self,
        exchange: Exchange,
        credentials: &ExchangeCredentials,
    ) -> Option<Arc<dyn ExchangeGateway>> {
        match exchange {
            Exchange::Coinbase => Some(Arc::new(CoinbaseGateway::new(
                self.coinbase_base_url.clone(),
                credentials.api_key.clone(),
                credentials.api_secret.clone(),
                self.call_timeout,
            ))),
            // Schema allows it, but no gateway is wired up yet.
            Exchange::BinanceUs => None,
        }
    }
}
