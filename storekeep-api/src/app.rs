/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use storekeep_api::{app::{build_router, AppState}, config::Config};
/// use storekeep_shared::mail::LogMailer;
/// use storekeep_shared::store::MemoryCredentialStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(config, Arc::new(MemoryCredentialStore::new()), Arc::new(LogMailer::new()));
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, Envelope, Shape},
};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use storekeep_shared::{
    accounts::AccountService,
    auth::token::TokenService,
    mail::Mailer,
    store::CredentialStore,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Largest body the token middleware will buffer
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Account lifecycle service
    pub accounts: AccountService,
}

impl AppState {
    /// Wires the lifecycle service from configuration and its collaborators
    pub fn new(config: Config, store: Arc<dyn CredentialStore>, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenService::new(config.jwt.secret.clone(), config.token_policy());
        let accounts = AccountService::new(store, mailer, tokens, config.account_settings());

        Self {
            config: Arc::new(config),
            accounts,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                  # Health check
/// ├── POST /signup
/// ├── GET|POST /login
/// ├── POST /verify
/// ├── POST /requestPasswordReset
/// ├── PUT  /resetPassword
/// ├── PUT  /changePassword          # token in body
/// └── DELETE /users/delete          # token in body
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Token authentication (authenticated routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{health, users};

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/signup", post(users::signup))
        .route("/login", get(users::login).post(users::login))
        .route("/verify", post(users::verify))
        .route("/requestPasswordReset", post(users::request_password_reset))
        .route("/resetPassword", put(users::reset_password));

    let authenticated_routes = Router::new()
        .route("/changePassword", put(users::change_password))
        .route("/users/delete", delete(users::delete_account))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            token_auth_layer,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.api.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Token authentication middleware layer
///
/// Reads the `token` field from the JSON body, runs the authentication gate
/// and injects the `AuthenticatedUser` into request extensions. The buffered
/// body is handed on unchanged so the handler can still extract it.
async fn token_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Envelope> {
    let (parts, body) = req.into_parts();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| Shape::GATE.reject(ApiError::MissingBody))?;

    let token = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(fields)) => fields
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => return Err(Shape::GATE.reject(ApiError::MissingBody)),
    };

    let user = state
        .accounts
        .authenticate(token.as_deref())
        .await
        .map_err(|e| Shape::GATE.reject(e))?;

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
