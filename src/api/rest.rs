use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::Network;
use crate::error::OracleError;
use crate::rpc::ReceiptOracle;
use crate::types::VerificationOutcome;
use crate::verification::VerificationCache;

pub const REPLAY_MESSAGE: &str = "Replay attack detected: transaction hash already used";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Verification failed or transaction not found";
pub const CAPACITY_EXHAUSTED_MESSAGE: &str = "Verification capacity exhausted, retry later";

/// API State
pub struct ApiState<O> {
    pub cache: Arc<VerificationCache<O>>,
    pub network: Network,
}

impl<O> Clone for ApiState<O> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            network: self.network,
        }
    }
}

/// Request body for verification
///
/// `txHash` is canonical; `transactionHash` is accepted for older clients.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default, rename = "txHash", alias = "transactionHash")]
    pub tx_hash: Option<String>,
}

/// Successful verification response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl VerifyResponse {
    fn on_chain(verified: bool, block_number: u64) -> Self {
        Self {
            verified,
            source: "on-chain",
            block_number: Some(block_number.to_string()),
            expires_in: None,
        }
    }

    fn cached(verified: bool, expires_in: u64) -> Self {
        Self {
            verified,
            source: "cache",
            block_number: None,
            expires_in: Some(expires_in),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub network: String,
    pub policy: String,
    pub ttl_seconds: u64,
    pub records: usize,
    pub in_flight: usize,
}

/// Create REST API router
pub fn create_router<O: ReceiptOracle>(state: ApiState<O>) -> Router {
    Router::new()
        .route("/health", get(health_check::<O>))
        .route("/api/verify", post(verify_transaction::<O>))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check<O: ReceiptOracle>(State(state): State<ApiState<O>>) -> impl IntoResponse {
    let settings = state.cache.settings();

    Json(HealthResponse {
        status: "ok".to_string(),
        network: state.network.name().to_string(),
        policy: settings.policy.name().to_string(),
        ttl_seconds: settings.ttl_seconds,
        records: state.cache.len(),
        in_flight: state.cache.in_flight(),
    })
}

/// Verify transaction endpoint
async fn verify_transaction<O: ReceiptOracle>(
    State(state): State<ApiState<O>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, AppError> {
    let tx_hash = payload
        .ok()
        .and_then(|Json(request)| request.tx_hash)
        .unwrap_or_default();

    info!("API: Verifying transaction {}", tx_hash);

    match state.cache.verify(&tx_hash).await {
        VerificationOutcome::Fresh {
            verified,
            block_number,
        } => Ok(Json(VerifyResponse::on_chain(verified, block_number))),
        VerificationOutcome::Cached {
            verified,
            expires_in,
        } => Ok(Json(VerifyResponse::cached(verified, expires_in))),
        VerificationOutcome::Conflict { verified, used_at } => {
            Err(AppError::Replay { verified, used_at })
        }
        VerificationOutcome::Failed(e) => Err(AppError::Verification(e)),
        VerificationOutcome::InvalidInput => Err(AppError::MissingHash),
        VerificationOutcome::Saturated => Err(AppError::Saturated),
    }
}

/// API error wrapper
#[derive(Debug)]
pub enum AppError {
    MissingHash,
    Replay { verified: bool, used_at: i64 },
    Verification(OracleError),
    Saturated,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MissingHash => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Missing txHash" })),
            )
                .into_response(),
            AppError::Verification(e) if e.is_client_error() => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Invalid txHash" })),
            )
                .into_response(),
            AppError::Replay { verified, used_at } => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "error": REPLAY_MESSAGE,
                    "verified": verified,
                    "usedAt": used_at,
                })),
            )
                .into_response(),
            AppError::Verification(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": VERIFICATION_FAILED_MESSAGE })),
            )
                .into_response(),
            AppError::Saturated => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": CAPACITY_EXHAUSTED_MESSAGE })),
            )
                .into_response(),
        }
    }
}

/// Turn a handler panic into a logged 500
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!("Internal error while handling request: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Internal server error" })),
    )
        .into_response()
}
