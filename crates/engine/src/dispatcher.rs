use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use tracing::error;

use common::SignalError;
use common::models::{Exchange, Side, TradeResult, User};
use exchange::gateway::OrderReceipt;
use exchange::{ExchangeGateway, GatewayProvider};

use crate::sizer::SizedOrder;

/// Owns gateway selection and order submission. Every gateway call is
/// wrapped in the configured timeout so a stalled exchange cannot pin a
/// request forever.
pub struct Dispatcher {
    provider: Arc<dyn GatewayProvider>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn GatewayProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Select the gateway for the user's preferred exchange. Credential
    /// presence is checked before the registry so a user without keys
    /// gets the more actionable error.
    pub fn gateway_for(
        &self,
        user: &User,
    ) -> Result<(Exchange, Arc<dyn ExchangeGateway>), SignalError> {
        let exchange = user.preferred_exchange;
        let credentials = user
            .credentials_for(exchange)
            .ok_or(SignalError::CredentialsNotConfigured(exchange))?;
        let gateway = self
            .provider
            .gateway(exchange, &credentials)
            .ok_or(SignalError::ExchangeNotSupported(exchange))?;
        Ok((exchange, gateway))
    }

    /// Confirm the pair is tradable, then submit the market order with
    /// exactly one attempt. A submission failure is never retried here;
    /// the order may have reached the exchange.
    pub async fn submit(
        &self,
        gateway: &dyn ExchangeGateway,
        order: &SizedOrder,
        side: Side,
    ) -> Result<TradeResult, SignalError> {
        let markets = tokio::time::timeout(self.call_timeout, gateway.load_markets())
            .await
            .map_err(|_| {
                SignalError::OrderSubmissionFailed("market list request timed out".to_string())
            })?
            .map_err(|e| SignalError::OrderSubmissionFailed(e.to_string()))?;

        if !markets.contains(&order.pair) {
            return Err(SignalError::PairNotAvailable(order.pair.clone()));
        }

        let receipt = tokio::time::timeout(
            self.call_timeout,
            gateway.create_market_order(&order.pair, side, order.amount),
        )
        .await
        .map_err(|_| SignalError::OrderSubmissionFailed("order request timed out".to_string()))?
        .map_err(|e| {
            error!(pair = %order.pair, %side, error = %e, "order submission failed");
            SignalError::OrderSubmissionFailed(e.to_string())
        })?;

        Ok(into_trade_result(receipt))
    }
}

fn into_trade_result(receipt: OrderReceipt) -> TradeResult {
    TradeResult {
        order_id: receipt.order_id,
        status: receipt.status,
        timestamp: receipt
            .timestamp_ms
            .and_then(DateTime::from_timestamp_millis),
        amount: receipt.filled_amount,
        price: receipt.price,
        cost: receipt.cost,
    }
}
