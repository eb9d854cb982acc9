use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::info;

use common::SignalError;
use common::models::TradeResult;
use exchange::GatewayProvider;

use crate::dispatcher::Dispatcher;
use crate::locks::BotLocks;
use crate::recorder::Recorder;
use crate::resolver::Resolver;
use crate::sizer::Sizer;
use crate::validator::Validator;

/// Result of a fully processed signal.
#[derive(Debug)]
pub struct SignalOutcome {
    pub message: String,
    pub trade: Option<TradeResult>,
}

/// The signal pipeline: validate, resolve, size, submit, record. One
/// instance serves the whole process; per-request state lives on the
/// stack.
pub struct SignalProcessor {
    pool: SqlitePool,
    dispatcher: Dispatcher,
    locks: BotLocks,
}

impl SignalProcessor {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn GatewayProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            dispatcher: Dispatcher::new(provider, call_timeout),
            locks: BotLocks::new(),
        }
    }

    /// Run one webhook body through the pipeline. Stage order is fixed:
    /// cheap local checks fail before any database read, database gates
    /// before any gateway is built, and sizing before the per-bot lock
    /// is taken.
    pub async fn process(
        &self,
        bot_id: &str,
        raw_body: &str,
    ) -> Result<SignalOutcome, SignalError> {
        let signal = Validator::parse(bot_id, raw_body)?;
        let (bot, user) = Resolver::resolve(&self.pool, &signal.bot_id).await?;
        let (exchange, gateway) = self.dispatcher.gateway_for(&user)?;
        let order = Sizer::size(&bot, &signal, gateway.as_ref()).await?;

        let _guard = self.locks.acquire(&bot.bot_id).await;
        let trade = self
            .dispatcher
            .submit(gateway.as_ref(), &order, signal.side)
            .await?;
        Recorder::record_success(&self.pool, &bot.bot_id).await?;

        info!(
            bot_id = %bot.bot_id,
            %exchange,
            pair = %order.pair,
            side = %signal.side,
            amount = %order.amount,
            order_id = trade.order_id.as_deref().unwrap_or("unknown"),
            "order executed"
        );

        Ok(SignalOutcome {
            message: format!("{} order for {} executed", signal.side, order.pair),
            trade: Some(trade),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use common::models::{
        AccountStatus, Bot, Exchange, ExchangeCredentials, SizingMode,
    };
    use exchange::{ExchangeGateway, MockExchangeGateway};
    use storage::db;
    use storage::repositories::{BotConfigUpdate, BotsRepository, UsersRepository};

    /// Hands out one shared mock gateway and counts how often it was
    /// asked for one.
    struct CountingProvider {
        gateway: Arc<MockExchangeGateway>,
        requests: AtomicUsize,
    }

    impl CountingProvider {
        fn new(gateway: MockExchangeGateway) -> Arc<Self> {
            Arc::new(Self {
                gateway: Arc::new(gateway),
                requests: AtomicUsize::new(0),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl GatewayProvider for CountingProvider {
        fn gateway(
            &self,
            _exchange: Exchange,
            _credentials: &ExchangeCredentials,
        ) -> Option<Arc<dyn ExchangeGateway>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Some(self.gateway.clone())
        }
    }

    async fn seeded_bot(pool: &SqlitePool, status: AccountStatus, activate: bool) -> Bot {
        let user_id = UsersRepository::create(pool, "trader@example.com")
            .await
            .unwrap();
        UsersRepository::set_credentials(pool, user_id, Exchange::Coinbase, "key", "secret")
            .await
            .unwrap();
        UsersRepository::set_account_status(pool, user_id, status)
            .await
            .unwrap();

        let user = UsersRepository::find_by_id(pool, user_id)
            .await
            .unwrap()
            .unwrap();
        let bot = BotsRepository::create(pool, &user).await.unwrap();
        if activate {
            let update = BotConfigUpdate {
                name: Some("swing".to_string()),
                trading_pair: Some("BTC/USD".to_string()),
                sizing_mode: SizingMode::NotionalQuote,
                position_size: Some(Decimal::from_str("100").unwrap()),
                use_external_position_size: false,
                is_active: true,
            };
            BotsRepository::configure(pool, &bot.bot_id, &update)
                .await
                .unwrap();
        }
        bot
    }

    fn happy_gateway(expected_orders: usize) -> MockExchangeGateway {
        let mut gateway = MockExchangeGateway::new();
        gateway
            .expect_fetch_ticker()
            .times(expected_orders)
            .returning(|_| Ok(20_000.0));
        gateway
            .expect_load_markets()
            .times(expected_orders)
            .returning(|| Ok(HashSet::from(["BTC/USD".to_string()])));
        gateway
            .expect_create_market_order()
            .times(expected_orders)
            .returning(|_, _, _| {
                Ok(exchange::OrderReceipt {
                    order_id: Some("ord-1".to_string()),
                    status: Some("FILLED".to_string()),
                    ..Default::default()
                })
            });
        gateway
    }

    #[tokio::test]
    async fn invalid_side_fails_before_the_provider_is_consulted() {
        let pool = db::connect_in_memory().await.unwrap();
        let provider = CountingProvider::new(MockExchangeGateway::new());
        let processor =
            SignalProcessor::new(pool, provider.clone(), Duration::from_secs(5));

        let err = processor
            .process("abc123", r#"{"side":"hold"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::InvalidSignal(_)));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn inactive_bot_never_reaches_the_gateway() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, AccountStatus::Active, false).await;
        let provider = CountingProvider::new(MockExchangeGateway::new());
        let processor =
            SignalProcessor::new(pool, provider.clone(), Duration::from_secs(5));

        let err = processor
            .process(&bot.bot_id, r#"{"side":"buy"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::BotInactive));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn suspended_account_never_reaches_the_gateway() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, AccountStatus::Suspended, true).await;
        let provider = CountingProvider::new(MockExchangeGateway::new());
        let processor =
            SignalProcessor::new(pool, provider.clone(), Duration::from_secs(5));

        let err = processor
            .process(&bot.bot_id, r#"{"side":"buy"}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SignalError::AccountNotActive(AccountStatus::Suspended)
        ));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn unknown_bot_is_not_found_and_no_stats_change() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, AccountStatus::Active, true).await;
        let provider = CountingProvider::new(MockExchangeGateway::new());
        let processor =
            SignalProcessor::new(pool.clone(), provider.clone(), Duration::from_secs(5));

        let err = processor
            .process("0000000000000000", r#"{"side":"buy"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::NotFound));
        let bot = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bot.total_trades, 0);
    }

    #[tokio::test]
    async fn successful_signal_executes_and_records_stats() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, AccountStatus::Active, true).await;
        let provider = CountingProvider::new(happy_gateway(1));
        let processor =
            SignalProcessor::new(pool.clone(), provider, Duration::from_secs(5));

        let outcome = processor
            .process(&bot.bot_id, r#"{"side":"buy"}"#)
            .await
            .unwrap();

        assert_eq!(outcome.message, "buy order for BTC/USD executed");
        let trade = outcome.trade.unwrap();
        assert_eq!(trade.order_id.as_deref(), Some("ord-1"));

        let bot = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bot.total_trades, 1);
        assert!(bot.last_trade_time.is_some());
    }

    #[tokio::test]
    async fn concurrent_signals_for_one_bot_both_count() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, AccountStatus::Active, true).await;
        let provider = CountingProvider::new(happy_gateway(2));
        let processor = Arc::new(SignalProcessor::new(
            pool.clone(),
            provider,
            Duration::from_secs(5),
        ));

        let body = r#"{"side":"buy"}"#;
        let (a, b) = tokio::join!(
            processor.process(&bot.bot_id, body),
            processor.process(&bot.bot_id, body)
        );
        a.unwrap();
        b.unwrap();

        let bot = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bot.total_trades, 2);
    }
}
