use thiserror::Error;

use crate::models::{AccountStatus, Exchange};

/// Everything that can terminate a signal. All variants are terminal for
/// the signal that raised them; none are fatal to the process.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("malformed signal: {0}")]
    MalformedSignal(&'static str),
    #[error("invalid signal: {0}")]
    InvalidSignal(&'static str),
    #[error("unknown bot id")]
    NotFound,
    #[error("bot is not active")]
    BotInactive,
    #[error("user account is {0}")]
    AccountNotActive(AccountStatus),
    #[error("no trading pair specified")]
    MissingTradingPair,
    #[error("external position size enabled but not provided")]
    MissingPositionSize,
    #[error("invalid position size format")]
    InvalidPositionSize,
    #[error("quote unavailable for {pair}: {detail}")]
    QuoteUnavailable { pair: String, detail: String },
    #[error("{0} API credentials not configured")]
    CredentialsNotConfigured(Exchange),
    #[error("exchange {0} is not supported")]
    ExchangeNotSupported(Exchange),
    #[error("trading pair {0} not available on exchange")]
    PairNotAvailable(String),
    #[error("order submission failed: {0}")]
    OrderSubmissionFailed(String),
    #[error("bot id generation conflict, retry the request")]
    IdGenerationConflict,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl SignalError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    /// Stable machine-readable tag for each kind, independent of the
    /// human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedSignal(_) => "malformed_signal",
            Self::InvalidSignal(_) => "invalid_signal",
            Self::NotFound => "not_found",
            Self::BotInactive => "bot_inactive",
            Self::AccountNotActive(_) => "account_not_active",
            Self::MissingTradingPair => "missing_trading_pair",
            Self::MissingPositionSize => "missing_position_size",
            Self::InvalidPositionSize => "invalid_position_size",
            Self::QuoteUnavailable { .. } => "quote_unavailable",
            Self::CredentialsNotConfigured(_) => "credentials_not_configured",
            Self::ExchangeNotSupported(_) => "exchange_not_supported",
            Self::PairNotAvailable(_) => "pair_not_available",
            Self::OrderSubmissionFailed(_) => "order_submission_failed",
            Self::IdGenerationConflict => "id_generation_conflict",
            Self::Internal(_) => "internal_error",
        }
    }
}
