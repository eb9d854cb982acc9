use sqlx::SqlitePool;

use common::SignalError;
use common::models::{AccountStatus, Bot, User};
use storage::repositories::{BotsRepository, UsersRepository};

/// Turns a bot id into the bot and its owner, applying the activity
/// gates in a fixed order: unknown bot, inactive bot, inactive account.
pub struct Resolver;

impl Resolver {
    pub async fn resolve(pool: &SqlitePool, bot_id: &str) -> Result<(Bot, User), SignalError> {
        let bot = BotsRepository::find_by_bot_id(pool, bot_id)
            .await
            .map_err(SignalError::internal)?
            .ok_or(SignalError::NotFound)?;

        if !bot.is_active {
            return Err(SignalError::BotInactive);
        }

        let user = UsersRepository::find_by_id(pool, bot.user_id)
            .await
            .map_err(SignalError::internal)?
            .ok_or_else(|| {
                SignalError::internal(anyhow::anyhow!("bot {} references missing user", bot_id))
            })?;

        if user.account_status != AccountStatus::Active {
            return Err(SignalError::AccountNotActive(user.account_status));
        }

        Ok((bot, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use common::models::SizingMode;
    use storage::db;
    use storage::repositories::BotConfigUpdate;

    async fn seeded_bot(pool: &SqlitePool, activate: bool) -> Bot {
        let user_id = UsersRepository::create(pool, "trader@example.com")
            .await
            .unwrap();
        let user = UsersRepository::find_by_id(pool, user_id)
            .await
            .unwrap()
            .unwrap();
        let bot = BotsRepository::create(pool, &user).await.unwrap();
        if activate {
            let update = BotConfigUpdate {
                name: None,
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

    #[tokio::test]
    async fn unknown_bot_id_is_not_found() {
        let pool = db::connect_in_memory().await.unwrap();
        let err = Resolver::resolve(&pool, "does-not-exist").await.unwrap_err();
        assert!(matches!(err, SignalError::NotFound));
    }

    #[tokio::test]
    async fn inactive_bot_is_rejected_before_account_checks() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, false).await;
        let err = Resolver::resolve(&pool, &bot.bot_id).await.unwrap_err();
        assert!(matches!(err, SignalError::BotInactive));
    }

    #[tokio::test]
    async fn demo_account_is_rejected() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, true).await;
        // Seeded accounts start as demo.
        let err = Resolver::resolve(&pool, &bot.bot_id).await.unwrap_err();
        assert!(matches!(
            err,
            SignalError::AccountNotActive(AccountStatus::Demo)
        ));
    }

    #[tokio::test]
    async fn active_bot_on_active_account_resolves() {
        let pool = db::connect_in_memory().await.unwrap();
        let bot = seeded_bot(&pool, true).await;
        UsersRepository::set_account_status(&pool, bot.user_id, AccountStatus::Active)
            .await
            .unwrap();

        let (resolved, user) = Resolver::resolve(&pool, &bot.bot_id).await.unwrap();
        assert_eq!(resolved.bot_id, bot.bot_id);
        assert_eq!(user.id, bot.user_id);
    }
}
