//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/auth/register` | — | Create a user |
//! | `POST` | `/auth/token` | Basic | Exchange credentials for a bearer token |
//! | `GET`  | `/scrap/tabela` | Bearer | Retrieve a Vitibrasil table |
//! | `GET`  | `/health` | — | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response has the shape:
//!
//! ```json
//! { "detail": "invalid year. Must be between 1970 and 2024.", "code": "invalid_parameter" }
//! ```
//!
//! Status codes: 400 (invalid parameter, duplicate user), 401 (missing,
//! invalid or expired token; bad credentials), 404 (page has no data table),
//! 503 (site unreachable, no backup), 500 (anything else).

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthService, IssuedToken};
use crate::config::Config;
use crate::error::{ApiError, AuthFailure};
use crate::models::{Identity, ScrapedTable};
use crate::params;
use crate::scrape::Retriever;
use crate::store::{SqliteStore, Store};
use crate::{db, migrate};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    auth: Arc<AuthService>,
    retriever: Arc<Retriever>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, retriever: Arc<Retriever>) -> Self {
        Self { auth, retriever }
    }
}

/// Builds the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/token", post(handle_token))
        .route("/scrap/tabela", get(handle_scrap))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Opens the SQLite database, applies the schema, and serves on
/// `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

    let auth = Arc::new(AuthService::from_config(store.clone(), config));
    let retriever = Arc::new(Retriever::from_config(config, store)?);
    let app = router(AppState::new(auth, retriever));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

fn status_of(err: &ApiError) -> StatusCode {
    match err {
        ApiError::InvalidParameter(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
        ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        let challenge = match &self {
            ApiError::Unauthorized(AuthFailure::InvalidCredentials) => Some("Basic"),
            ApiError::Unauthorized(_) => Some("Bearer"),
            _ => None,
        };

        let body = ErrorBody {
            detail: self.to_string(),
            code: self.code(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(scheme) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(scheme));
        }
        response
    }
}

/// Returns the credentials part of `Authorization: <scheme> <credentials>`.
fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (given, credentials) = value.split_once(' ')?;
    if given.eq_ignore_ascii_case(scheme) {
        Some(credentials.trim())
    } else {
        None
    }
}

fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let unauthorized = || ApiError::Unauthorized(AuthFailure::InvalidCredentials);
    let encoded = authorization(headers, "Basic").ok_or_else(unauthorized)?;
    let decoded = STANDARD.decode(encoded).map_err(|_| unauthorized())?;
    let decoded = String::from_utf8(decoded).map_err(|_| unauthorized())?;
    let (username, password) = decoded.split_once(':').ok_or_else(unauthorized)?;
    Ok((username.to_string(), password.to_string()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /auth/register ============

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(alias = "usuario")]
    username: String,
    #[serde(alias = "senha")]
    password: String,
    email: String,
}

async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Identity>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::invalid(e.body_text()))?;
    let identity = state
        .auth
        .register(&req.username, &req.password, &req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

// ============ POST /auth/token ============

async fn handle_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IssuedToken>, ApiError> {
    let (username, password) = basic_credentials(&headers)?;
    let token = state.auth.authenticate(&username, &password).await?;
    Ok(Json(token))
}

// ============ GET /scrap/tabela ============

#[derive(Debug, Deserialize)]
struct ScrapQuery {
    ano: Option<String>,
    opcao: Option<String>,
    subopcao: Option<String>,
}

/// Handler for `GET /scrap/tabela`.
///
/// The token is checked before the parameters, and both before any network
/// or store access.
async fn handle_scrap(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScrapQuery>,
) -> Result<Json<ScrapedTable>, ApiError> {
    let token = authorization(&headers, "Bearer")
        .ok_or(ApiError::Unauthorized(AuthFailure::MissingToken))?;
    let username = state.auth.verify(token)?;

    let key = params::resolve(
        query.ano.as_deref(),
        query.opcao.as_deref(),
        query.subopcao.as_deref(),
    )?;
    tracing::debug!(%username, %key, "scrape requested");

    let table = state.retriever.retrieve(&key).await?;
    Ok(Json(table))
}
