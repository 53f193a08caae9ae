//! HTTP route handlers for the extension backend.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `GET /health` - Health check (no auth)
//! - `GET /user/{userId}` - Profile for a user
//! - `POST /ball/save` - Save a user's weapon ball
//! - `POST /dungeon/join` - Forward a weapon ball into the next dungeon
//! - `POST /redeem/tts` - Forward a text-to-speech redeem
//! - `POST /redeem/media` - Forward a media share redeem
//! - `POST /redeem/effect` - Forward an effect redeem
//! - `GET /stats/{userId}` - Stats for a user
//! - `POST /stats/update` - Stats callback from the alert server (shared secret, if configured)
//!
//! # Architecture
//!
//! All routes share application state through [`AppState`], which contains:
//! - Configuration
//! - Token verifier used by the auth middleware
//! - User store
//! - Alert server client
//! - Server start time for uptime reporting
//!
//! No handler performs more than one store operation or more than one
//! outbound call, and no handler does both.
//!
//! # Example
//!
//! ```rust,no_run
//! use arena_ebs::routes::{create_router, AppState};
//! use arena_ebs::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let state = AppState::new(config).expect("failed to build state");
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8081").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::HeaderMap,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertClient, AlertError};
use crate::auth::{require_extension_token, validate_shared_secret, ExtensionClaims, TokenVerifier};
use crate::config::Config;
use crate::error::ApiError;
use crate::store::{InMemoryUserStore, UserStore};
use crate::types::{
    DungeonJoinRequest, EffectRedeemRequest, MediaRedeemRequest, SaveBallRequest,
    StatsUpdateRequest, TtsRedeemRequest, UserProfile, UserStats,
};

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the shared secret on `POST /stats/update`.
pub const HEADER_STATS_SECRET: &str = "X-Stats-Secret";

/// Name reported by the health check.
const SERVER_NAME: &str = "Extension Backend Service";

/// Maximum request body size (64 KiB).
const MAX_BODY_SIZE: usize = 64 * 1024;

const JOIN_SUCCESS_MESSAGE: &str = "Joined next dungeon!";
const JOIN_FAILED: &str = "Failed to join dungeon";
const TTS_FAILED: &str = "Failed to trigger alert";
const MEDIA_FAILED: &str = "Failed to trigger media";
const EFFECT_FAILED: &str = "Failed to trigger effect";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
///
/// Cloned for each request handler; all members are reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// Verifies extension bearer tokens.
    pub verifier: Arc<TokenVerifier>,

    /// Per-user profile storage.
    pub store: Arc<dyn UserStore>,

    /// Client for the alert server.
    pub alerts: AlertClient,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates application state with an in-memory store and an alert
    /// client built from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, AlertError> {
        let alerts = AlertClient::new(config.alert_server_url.clone(), config.alert_timeout)?;
        Ok(Self::with_components(
            config,
            Arc::new(InMemoryUserStore::new()),
            alerts,
        ))
    }

    /// Creates application state with a custom store and alert client.
    ///
    /// Useful for testing or when swapping in a different store backend.
    #[must_use]
    pub fn with_components(config: Config, store: Arc<dyn UserStore>, alerts: AlertClient) -> Self {
        let verifier = Arc::new(TokenVerifier::new(config.extension_secret.as_slice()));
        Self {
            config: Arc::new(config),
            verifier,
            store,
            alerts,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("alerts", &self.alerts)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
///
/// Extension routes sit behind [`require_extension_token`]; `/health` and
/// `/stats/update` do not. CORS is fully permissive because the extension
/// calls from a browser frame on another origin.
pub fn create_router(state: AppState) -> Router {
    let extension_routes = Router::new()
        .route("/user/{user_id}", get(get_user))
        .route("/ball/save", post(post_ball_save))
        .route("/dungeon/join", post(post_dungeon_join))
        .route("/redeem/tts", post(post_redeem_tts))
        .route("/redeem/media", post(post_redeem_media))
        .route("/redeem/effect", post(post_redeem_effect))
        .route("/stats/{user_id}", get(get_stats))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.verifier),
            require_extension_token,
        ));

    Router::new()
        .route("/health", get(get_health))
        .route("/stats/update", post(post_stats_update))
        .merge(extension_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Shared response types
// ============================================================================

/// `{"success": true}` with an optional message.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
        })
    }

    fn with_message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
        })
    }
}

/// Parses and validates a JSON request body.
///
/// Malformed JSON, missing fields and failed validation all become
/// [`ApiError::BadRequest`].
fn parse_body<T: DeserializeOwned>(
    body: &Bytes,
    validate: impl FnOnce(&T) -> Result<(), String>,
) -> Result<T, ApiError> {
    let parsed: T = serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "Failed to parse request body");
        ApiError::bad_request(format!("invalid request body: {err}"))
    })?;
    validate(&parsed).map_err(ApiError::bad_request)?;
    Ok(parsed)
}

/// Logs an alert server failure and converts it to the public error.
fn forwarding_failed(err: AlertError, user_id: &str, public_message: &str) -> ApiError {
    error!(user_id = %user_id, error = %err, "{public_message}");
    ApiError::upstream(public_message)
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Human-readable service name.
    pub server: String,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint. No authentication required.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        server: SERVER_NAME.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Profile routes
// ============================================================================

/// GET /user/{userId} - Stored profile, or defaults for an unseen user.
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(claims): Extension<ExtensionClaims>,
) -> Json<UserProfile> {
    debug!(user_id = %user_id, channel_id = %claims.channel_id, "Profile requested");
    Json(state.store.get(&user_id))
}

/// POST /ball/save - Upsert the user's weapon ball.
async fn post_ball_save(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = parse_body(&body, SaveBallRequest::validate)?;
    state.store.save_ball(&req.user_id, req.ball);
    info!(user_id = %req.user_id, "Weapon ball saved");
    Ok(SuccessResponse::ok())
}

/// GET /stats/{userId} - Stats, zeroed for an unseen user.
async fn get_stats(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<UserStats> {
    Json(state.store.stats(&user_id))
}

/// POST /stats/update - Stats callback from the alert server.
///
/// When `STATS_UPDATE_SECRET` is configured, the `X-Stats-Secret` header
/// must match it. Provided fields overwrite the stored ones.
async fn post_stats_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    if let Some(expected) = &state.config.stats_update_secret {
        let provided = headers
            .get(HEADER_STATS_SECRET)
            .and_then(|v| v.to_str().ok());
        validate_shared_secret(provided, expected).map_err(|err| {
            warn!("Rejected stats update with bad shared secret");
            err
        })?;
    }

    let req = parse_body(&body, StatsUpdateRequest::validate)?;
    state.store.merge_stats(&req.user_id, req.stats_update);
    info!(user_id = %req.user_id, "Stats updated");
    Ok(SuccessResponse::ok())
}

// ============================================================================
// Forwarding routes
// ============================================================================

/// POST /dungeon/join - Send the user's ball into the next dungeon.
async fn post_dungeon_join(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = parse_body(&body, DungeonJoinRequest::validate)?;

    let payload = state
        .alerts
        .join_dungeon(&req.user_id, &req.channel_id, &req.ball)
        .await
        .map_err(|err| forwarding_failed(err, &req.user_id, JOIN_FAILED))?;

    info!(
        user_id = %req.user_id,
        channel_id = %req.channel_id,
        team = payload.ball.team,
        max_speed = payload.ball.max_speed,
        "Joined dungeon"
    );
    Ok(SuccessResponse::with_message(JOIN_SUCCESS_MESSAGE))
}

/// POST /redeem/tts - Forward a text-to-speech redeem.
async fn post_redeem_tts(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = parse_body(&body, TtsRedeemRequest::validate)?;

    state
        .alerts
        .trigger_tts(&req.user_id, &req.text)
        .await
        .map_err(|err| forwarding_failed(err, &req.user_id, TTS_FAILED))?;

    info!(user_id = %req.user_id, channel_id = %req.channel_id, "TTS redeem forwarded");
    Ok(SuccessResponse::ok())
}

/// POST /redeem/media - Forward a media share redeem.
async fn post_redeem_media(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = parse_body(&body, MediaRedeemRequest::validate)?;

    // TODO: restrict to YouTube links once the alert server's player can report unsupported URLs.
    state
        .alerts
        .trigger_media(&req.user_id, &req.url)
        .await
        .map_err(|err| forwarding_failed(err, &req.user_id, MEDIA_FAILED))?;

    info!(user_id = %req.user_id, channel_id = %req.channel_id, "Media redeem forwarded");
    Ok(SuccessResponse::ok())
}

/// POST /redeem/effect - Forward an effect redeem.
async fn post_redeem_effect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = parse_body(&body, EffectRedeemRequest::validate)?;

    state
        .alerts
        .trigger_effect(&req.user_id, &req.effect)
        .await
        .map_err(|err| forwarding_failed(err, &req.user_id, EFFECT_FAILED))?;

    info!(
        user_id = %req.user_id,
        channel_id = %req.channel_id,
        effect = %req.effect,
        "Effect redeem forwarded"
    );
    Ok(SuccessResponse::ok())
}

// ============================================================================
// Tests
// ============================================================================
