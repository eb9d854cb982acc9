use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

use common::SignalError;
use storage::repositories::BotsRepository;

/// Persists trade statistics after a confirmed submission.
pub struct Recorder;

impl Recorder {
    /// One statement updates both the trade count and the last-trade
    /// time. `last_trade_time` is the recording time, not whatever
    /// timestamp the exchange reported. The order already reached the
    /// exchange by the time this runs, so a write failure is logged but
    /// does not fail the signal.
    pub async fn record_success(pool: &SqlitePool, bot_id: &str) -> Result<(), SignalError> {
        match BotsRepository::record_trade_success(pool, bot_id, Utc::now()).await {
            Ok(0) => {
                warn!(bot_id, "trade executed but bot row is gone; stats not recorded");
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(bot_id, error = %e, "trade executed but stats update failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::db;
    use storage::repositories::UsersRepository;

    #[tokio::test]
    async fn last_trade_time_is_the_recording_time() {
        let pool = db::connect_in_memory().await.unwrap();
        let user_id = UsersRepository::create(&pool, "trader@example.com")
            .await
            .unwrap();
        let user = UsersRepository::find_by_id(&pool, user_id)
            .await
            .unwrap()
            .unwrap();
        let bot = BotsRepository::create(&pool, &user).await.unwrap();

        let before = Utc::now();
        Recorder::record_success(&pool, &bot.bot_id).await.unwrap();
        let after = Utc::now();

        let bot = BotsRepository::find_by_bot_id(&pool, &bot.bot_id)
            .await
            .unwrap()
            .unwrap();
        let recorded = bot.last_trade_time.unwrap();
        assert!(recorded >= before && recorded <= after);
        assert_eq!(bot.total_trades, 1);
    }

    #[tokio::test]
    async fn missing_bot_row_does_not_fail_the_signal() {
        let pool = db::connect_in_memory().await.unwrap();
        assert!(Recorder::record_success(&pool, "gone").await.is_ok());
    }
}
