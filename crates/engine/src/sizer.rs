use std::str::FromStr;
use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use common::SignalError;
use common::models::{Bot, Signal, SizingMode};
use exchange::ExchangeGateway;

/// Decimal places of the base amount sent to the exchange.
const AMOUNT_SCALE: u32 = 5;

const QUOTE_ATTEMPTS: u32 = 3;
const QUOTE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// A fully determined order: canonical pair plus base-asset amount.
#[derive(Debug, Clone)]
pub struct SizedOrder {
    pub pair: String,
    pub amount: Decimal,
}

pub struct Sizer;

impl Sizer {
    /// Resolve the pair and the base amount for this signal. The size is
    /// settled before the pair and the pair before any quote fetch, so a
    /// misconfigured bot never costs a network call.
    pub async fn size(
        bot: &Bot,
        signal: &Signal,
        gateway: &dyn ExchangeGateway,
    ) -> Result<SizedOrder, SignalError> {
        let size = if bot.use_external_position_size {
            let raw = signal
                .position_size
                .as_deref()
                .ok_or(SignalError::MissingPositionSize)?;
            Decimal::from_str(raw).map_err(|_| SignalError::InvalidPositionSize)?
        } else {
            bot.position_size.ok_or(SignalError::MissingPositionSize)?
        };
        if size <= Decimal::ZERO {
            return Err(SignalError::InvalidPositionSize);
        }

        let pair = signal
            .pair
            .as_deref()
            .or(bot.trading_pair.as_deref())
            .ok_or(SignalError::MissingTradingPair)?
            .replace('-', "/");

        let amount = match bot.sizing_mode {
            SizingMode::BaseQuantity => size,
            SizingMode::NotionalQuote => {
                let price = fetch_quote(gateway, &pair).await?;
                (size / price).round_dp_with_strategy(
                    AMOUNT_SCALE,
                    RoundingStrategy::MidpointAwayFromZero,
                )
            }
        };

        // A tiny notional against a large price can round down to zero.
        if amount <= Decimal::ZERO {
            return Err(SignalError::InvalidPositionSize);
        }

        Ok(SizedOrder { pair, amount })
    }
}

async fn fetch_quote(gateway: &dyn ExchangeGateway, pair: &str) -> Result<Decimal, SignalError> {
    let mut last_detail = String::new();

    for attempt in 1..=QUOTE_ATTEMPTS {
        match gateway.fetch_ticker(pair).await {
            Ok(price) => {
                let price = Decimal::try_from(price)
                    .map_err(|_| SignalError::QuoteUnavailable {
                        pair: pair.to_string(),
                        detail: format!("unusable price {}", price),
                    })?;
                if price <= Decimal::ZERO {
                    return Err(SignalError::QuoteUnavailable {
                        pair: pair.to_string(),
                        detail: format!("nonpositive price {}", price),
                    });
                }
                return Ok(price);
            }
            Err(e) => {
                warn!(pair, attempt, error = %e, "quote fetch failed");
                last_detail = e.to_string();
                if attempt < QUOTE_ATTEMPTS {
                    tokio::time::sleep(QUOTE_RETRY_DELAY).await;
                }
            }
        }
    }

    Err(SignalError::QuoteUnavailable {
        pair: pair.to_string(),
        detail: last_detail,
    })
}
