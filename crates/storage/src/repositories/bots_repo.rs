use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use common::models::{Bot, SizingMode, User};

use crate::error::StorageError;

/// Full setup write for a bot, mirroring the one-shot setup flow: name,
/// pair, sizing policy and activation land together.
#[derive(Debug, Clone)]
pub struct BotConfigUpdate {
    pub name: Option<String>,
    pub trading_pair: Option<String>,
    pub sizing_mode: SizingMode,
    pub position_size: Option<Decimal>,
    pub use_external_position_size: bool,
    pub is_active: bool,
}

pub struct BotsRepository;

impl BotsRepository {
    /// Create a bot for the user, enforcing the active-bot limit. The bot
    /// id is a 128-bit random identifier issued exactly once; the UNIQUE
    /// constraint is the collision backstop and a violation surfaces as a
    /// retryable conflict.
    pub async fn create(pool: &SqlitePool, user: &User) -> Result<Bot, StorageError> {
        let active = Self::count_active(pool, user.id).await?;
        if active >= user.max_active_bots {
            return Err(StorageError::BotLimitReached(user.max_active_bots));
        }

        let bot_id = Uuid::new_v4().simple().to_string();

        let result = sqlx::query("INSERT INTO bots (bot_id, user_id) VALUES (?, ?)")
            .bind(&bot_id)
            .bind(user.id)
            .execute(pool)
            .await;

        if let Err(e) = result {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Err(StorageError::IdConflict);
                }
            }
            return Err(e.into());
        }

        Self::find_by_bot_id(pool, &bot_id)
            .await?
            .ok_or(StorageError::Db(sqlx::Error::RowNotFound))
    }

    pub async fn find_by_bot_id(
        pool: &SqlitePool,
        bot_id: &str,
    ) -> Result<Option<Bot>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM bots WHERE bot_id = ?")
            .bind(bot_id)
            .fetch_optional(pool)
            .await?;

        row.map(|r| map_bot(&r)).transpose()
    }

    pub async fn count_active(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bots WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn configure(
        pool: &SqlitePool,
        bot_id: &str,
        update: &BotConfigUpdate,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bots SET name = ?, trading_pair = ?, sizing_mode = ?, position_size = ?, \
             use_external_position_size = ?, is_active = ? WHERE bot_id = ?",
        )
        .bind(&update.name)
        .bind(&update.trading_pair)
        .bind(update.sizing_mode.as_str())
        .bind(update.position_size.map(|d| d.to_string()))
        .bind(update.use_external_position_size)
        .bind(update.is_active)
        .bind(bot_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stats update on confirmed success only: one statement, so
    /// concurrent recorders never lose a count at the database level.
    pub async fn record_trade_success(
        pool: &SqlitePool,
        bot_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bots SET last_trade_time = ?, total_trades = total_trades + 1 \
             WHERE bot_id = ?",
        )
        .bind(at)
        .bind(bot_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn map_bot(row: &SqliteRow) -> Result<Bot, sqlx::Error> {
    let sizing_raw: String = row.try_get("sizing_mode")?;
    let position_raw: Option<String> = row.try_get("position_size")?;

    Ok(Bot {
        id: row.try_get("id")?,
        bot_id: row.try_get("bot_id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        trading_pair: row.try_get("trading_pair")?,
        sizing_mode: SizingMode::from_str(&sizing_raw)
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        position_size: position_raw
            .map(|p| Decimal::from_str(&p))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        use_external_position_size: row.try_get("use_external_position_size")?,
        is_active: row.try_get("is_active")?,
        last_trade_time: row.try_get::<Option<DateTime<Utc>>, _>("last_trade_time")?,
        total_trades: row.try_get("total_trades")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repositories::UsersRepository;

    async fn seeded_user(pool: &SqlitePool) -> User {
        let id = UsersRepository::create(pool, "trader@example.com")
            .await
            .unwrap();
        UsersRepository::find_by_id(pool, id).await.unwrap().unwrap()
    }

    fn activate_update(pair: &str, size: &str) -> BotConfigUpdate {
        BotConfigUpdate {
            name: Some("swing".to_string()),
            trading_pair: Some(pair.to_string()),
            sizing_mode: SizingMode::NotionalQuote,
            position_size: Some(Decimal::from_str(size).unwrap()),
            use_external_position_size: false,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn created_bot_starts_inactive_with_zero_trades() {
        let pool = db::connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;

        let bot = BotsRepository::create(&pool, &user).await.unwrap();
        assert_eq!(bot.bot_id.len(), 32);
        assert!(!bot.is_active);
        assert_eq!(bot.total_trades, 0);
        assert!(bot.last_trade_time.is_none());
    }

    #[tokio::test]
    async fn active_bot_limit_is_enforced_at_creation() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut user = seeded_user(&pool).await;

        sqlx::query("UPDATE users SET max_active_bots = 1 WHERE id = ?")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
        user.max_active_bots = 1;

        let bot = BotsRepository::create(&pool, &user).await.unwrap();
        BotsRepository::configure(&pool, &bot.bot_id, &activate_update("BTC/USD", "50"))
            .await
            .unwrap();

        match BotsRepository::create(&pool, &user).await {
            Err(StorageError::BotLimitReached(1)) => {}
            other => panic!("expected BotLimitReached, got {:?}", other.map(|b| b.bot_id)),
        }
    }

    #[tokio::test]
    async fn record_trade_success_bumps_stats() {
        let pool = db::connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;
        let bot = BotsRepository::create(&pool, &user).await.unwrap();

        let at = Utc::now();
        let rows = BotsRepository::record_trade_success(&pool, &bot.bot_id, at)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let bot = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bot.total_trades, 1);
        assert!(bot.last_trade_time.is_some());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_bots() {
        let pool = db::connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;
        let bot = BotsRepository::create(&pool, &user).await.unwrap();

        UsersRepository::delete(&pool, user.id).await.unwrap();

        let found = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
