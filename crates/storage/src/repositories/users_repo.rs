use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use common::models::{AccountStatus, Exchange, User};

pub struct UsersRepository;

impl UsersRepository {
    pub async fn create(pool: &SqlitePool, email: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("INSERT INTO users (email) VALUES (?) RETURNING id")
            .bind(email)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(|r| map_user(&r)).transpose()
    }

    /// Store a validated credential pair and make the exchange the user's
    /// preferred one.
    pub async fn set_credentials(
        pool: &SqlitePool,
        user_id: i64,
        exchange: Exchange,
        api_key: &str,
        api_secret: &str,
    ) -> Result<u64, sqlx::Error> {
        let sql = match exchange {
            Exchange::Coinbase => {
                "UPDATE users SET coinbase_api_key = ?, coinbase_api_secret = ?, \
                 preferred_exchange = ?, updated_at = ? WHERE id = ?"
            }
            Exchange::BinanceUs => {
                "UPDATE users SET binanceus_api_key = ?, binanceus_api_secret = ?, \
                 preferred_exchange = ?, updated_at = ? WHERE id = ?"
            }
        };

        let result = sqlx::query(sql)
            .bind(api_key)
            .bind(api_secret)
            .bind(exchange.as_str())
            .bind(Utc::now())
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn set_account_status(
        pool: &SqlitePool,
        user_id: i64,
        status: AccountStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET account_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes the user; bots follow through the FK cascade.
    pub async fn delete(pool: &SqlitePool, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn map_user(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let exchange_raw: String = row.try_get("preferred_exchange")?;
    let status_raw: String = row.try_get("account_status")?;
    let max_position_raw: String = row.try_get("max_position_size")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        preferred_exchange: Exchange::from_str(&exchange_raw)
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        coinbase_api_key: row.try_get("coinbase_api_key")?,
        coinbase_api_secret: row.try_get("coinbase_api_secret")?,
        binanceus_api_key: row.try_get("binanceus_api_key")?,
        binanceus_api_secret: row.try_get("binanceus_api_secret")?,
        account_status: AccountStatus::from_str(&status_raw)
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        max_active_bots: row.try_get("max_active_bots")?,
        max_daily_trades: row.try_get("max_daily_trades")?,
        max_position_size: Decimal::from_str(&max_position_raw)
            .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}
