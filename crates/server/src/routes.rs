use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tracing::error;

use common::SignalError;
use common::models::{AccountStatus, Exchange, ExchangeCredentials, SizingMode, TradeResult};
use engine::SignalProcessor;
use exchange::GatewayProvider;
use storage::StorageError;
use storage::repositories::{BotConfigUpdate, BotsRepository, UsersRepository};

pub struct AppState {
    pub pool: SqlitePool,
    pub processor: SignalProcessor,
    pub provider: Arc<dyn GatewayProvider>,
    pub gateway_timeout: Duration,
    pub admin_api_token: Option<String>,
    pub public_base_url: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/{bot_id}", post(webhook))
        .route("/api/health", get(health))
        .route("/api/validate-credentials", post(validate_credentials))
        .route("/api/users", post(create_user))
        .route("/api/users/{user_id}/credentials", put(set_credentials))
        .route("/api/users/{user_id}/status", put(set_status))
        .route("/api/bots", post(create_bot))
        .route("/api/bots/{bot_id}/setup", post(setup_bot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Response envelope shared by the webhook and admin endpoints.
#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trade_details: Option<TradeResult>,
}

fn success(message: impl Into<String>, trade_details: Option<TradeResult>) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            status: "success",
            message: message.into(),
            trade_details,
        }),
    )
        .into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(Envelope {
            status: "error",
            message: message.into(),
            trade_details: None,
        }),
    )
        .into_response()
}

fn status_for(err: &SignalError) -> StatusCode {
    use SignalError::*;
    match err {
        MalformedSignal(_) | InvalidSignal(_) | MissingTradingPair | MissingPositionSize
        | InvalidPositionSize => StatusCode::BAD_REQUEST,
        BotInactive | AccountNotActive(_) => StatusCode::FORBIDDEN,
        NotFound => StatusCode::NOT_FOUND,
        IdGenerationConflict => StatusCode::CONFLICT,
        QuoteUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CredentialsNotConfigured(_) | ExchangeNotSupported(_) | PairNotAvailable(_)
        | OrderSubmissionFailed(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Full detail stays in the server log; the caller gets the display
/// message only, which for `Internal` is deliberately generic.
fn signal_error(err: SignalError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(kind = err.kind(), error = ?err, "signal rejected");
    }
    failure(status, err.to_string())
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
    body: String,
) -> Response {
    match state.processor.process(&bot_id, &body).await {
        Ok(outcome) => success(outcome.message, outcome.trade),
        Err(err) => signal_error(err),
    }
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &state.admin_api_token else {
        return Ok(());
    };
    let presented = headers.get("x-admin-token").and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(failure(StatusCode::UNAUTHORIZED, "admin token required"))
    }
}

/// Accepts the short exchange codes used by the original client forms as
/// well as the canonical names.
fn parse_exchange(raw: &str) -> Option<Exchange> {
    match raw {
        "CB" => Some(Exchange::Coinbase),
        "BN" => Some(Exchange::BinanceUs),
        other => Exchange::from_str(other).ok(),
    }
}

/// Coinbase issues PEM-style secrets that arrive with literal `\n`
/// sequences after passing through a form field.
fn normalize_secret(exchange: Exchange, secret: &str) -> String {
    match exchange {
        Exchange::Coinbase => secret.replace("\\n", "\n"),
        Exchange::BinanceUs => secret.to_string(),
    }
}

#[derive(Deserialize)]
struct CredentialsRequest {
    exchange: String,
    api_key: String,
    private_key: String,
}

async fn validate_credentials(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let Some(exchange) = parse_exchange(&req.exchange) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "unknown exchange" })),
        )
            .into_response();
    };

    let credentials = ExchangeCredentials {
        api_key: req.api_key,
        api_secret: normalize_secret(exchange, &req.private_key),
    };

    let Some(gateway) = state.provider.gateway(exchange, &credentials) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "exchange not supported" })),
        )
            .into_response();
    };

    match tokio::time::timeout(state.gateway_timeout, gateway.fetch_balance()).await {
        Ok(Ok(_)) => Json(json!({ "success": "API Validated" })).into_response(),
        Ok(Err(e)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "validation request timed out" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct CreateUserRequest {
    email: String,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    match UsersRepository::create(&state.pool, &req.email).await {
        Ok(id) => Json(json!({ "id": id, "email": req.email })).into_response(),
        Err(e) if is_unique_violation(&e) => {
            failure(StatusCode::CONFLICT, "email already registered")
        }
        Err(e) => signal_error(SignalError::internal(e)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn set_credentials(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let Some(exchange) = parse_exchange(&req.exchange) else {
        return failure(StatusCode::BAD_REQUEST, "unknown exchange");
    };
    let secret = normalize_secret(exchange, &req.private_key);

    match UsersRepository::set_credentials(&state.pool, user_id, exchange, &req.api_key, &secret)
        .await
    {
        Ok(0) => failure(StatusCode::NOT_FOUND, "unknown user"),
        Ok(_) => success("credentials stored", None),
        Err(e) => signal_error(SignalError::internal(e)),
    }
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: String,
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let Ok(status) = AccountStatus::from_str(&req.status) else {
        return failure(StatusCode::BAD_REQUEST, "unknown account status");
    };

    match UsersRepository::set_account_status(&state.pool, user_id, status).await {
        Ok(0) => failure(StatusCode::NOT_FOUND, "unknown user"),
        Ok(_) => success("account status updated", None),
        Err(e) => signal_error(SignalError::internal(e)),
    }
}

#[derive(Deserialize)]
struct CreateBotRequest {
    user_id: i64,
}

async fn create_bot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBotRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let user = match UsersRepository::find_by_id(&state.pool, req.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "unknown user"),
        Err(e) => return signal_error(SignalError::internal(e)),
    };

    match BotsRepository::create(&state.pool, &user).await {
        Ok(bot) => Json(json!({
            "bot_id": bot.bot_id,
            "is_active": bot.is_active,
            "webhook_url": bot.webhook_url(&state.public_base_url),
            "webhook_message": bot.webhook_message(user.preferred_exchange),
        }))
        .into_response(),
        Err(StorageError::BotLimitReached(limit)) => failure(
            StatusCode::FORBIDDEN,
            format!("active bot limit of {} reached", limit),
        ),
        Err(StorageError::IdConflict) => signal_error(SignalError::IdGenerationConflict),
        Err(StorageError::Db(e)) => signal_error(SignalError::internal(e)),
    }
}

#[derive(Deserialize)]
struct BotSetupRequest {
    name: Option<String>,
    trading_pair: Option<String>,
    sizing_mode: SizingMode,
    position_size: Option<String>,
    #[serde(default)]
    use_external_position_size: bool,
    is_active: bool,
}

async fn setup_bot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<String>,
    Json(req): Json<BotSetupRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let position_size = match req.position_size.as_deref() {
        Some(raw) => match Decimal::from_str(raw) {
            Ok(d) if d > Decimal::ZERO => Some(d),
            _ => return signal_error(SignalError::InvalidPositionSize),
        },
        None => None,
    };

    let update = BotConfigUpdate {
        name: req.name,
        trading_pair: req.trading_pair,
        sizing_mode: req.sizing_mode,
        position_size,
        use_external_position_size: req.use_external_position_size,
        is_active: req.is_active,
    };

    match BotsRepository::configure(&state.pool, &bot_id, &update).await {
        Ok(0) => failure(StatusCode::NOT_FOUND, "unknown bot"),
        Ok(_) => success("bot configured", None),
        Err(e) => signal_error(SignalError::internal(e)),
    }
}
