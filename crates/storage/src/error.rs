use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("active bot limit reached ({0})")]
    BotLimitReached(i64),
    #[error("bot id conflict")]
    IdConflict,
}
