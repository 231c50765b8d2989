//! Login-gated web UI for searching slides and asking questions about them.

pub mod auth;
mod handlers;

use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::{Result, SlideSearchError};
use crate::orchestrator::Orchestrator;
use crate::search::{AnswerEngine, SlideSearcher, IMAGE_ROUTE};
use crate::vector_store::VectorStore;
use auth::SessionStore;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

/// Shared application state.
pub struct AppState {
    username: String,
    password: String,
    sessions: SessionStore,
    searcher: SlideSearcher,
    answer_engine: AnswerEngine,
    vector_store: Arc<dyn VectorStore>,
    img_dir: PathBuf,
}

impl AppState {
    /// Build the server state. Fails when no password is configured.
    pub fn new(
        settings: &Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        prompts: Prompts,
    ) -> Result<Self> {
        let password = settings
            .server
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                SlideSearchError::Config(
                    "No login password configured. Set SLIDES_PASSWORD or server.password.".to_string(),
                )
            })?;

        let searcher = SlideSearcher::from_settings(vector_store.clone(), embedder, &settings.search);
        let answer_engine = AnswerEngine::new(vector_store.clone(), &settings.answer)?.with_prompts(prompts);

        Ok(Self {
            username: settings.server.username.clone(),
            password,
            sessions: SessionStore::new(Duration::from_secs(settings.server.session_ttl_minutes * 60)),
            searcher,
            answer_engine,
            vector_store,
            img_dir: settings.img_dir(),
        })
    }

    /// Build the server state from the pipeline's components.
    pub fn from_orchestrator(orchestrator: &Orchestrator) -> Result<Self> {
        Self::new(
            orchestrator.settings(),
            orchestrator.vector_store(),
            orchestrator.embedder(),
            orchestrator.prompts().clone(),
        )
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Token of the authenticated session, set by the session middleware.
#[derive(Debug, Clone)]
pub(crate) struct SessionToken(pub(crate) String);

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    App(SlideSearchError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Not logged in"),
            ApiError::App(e) => write!(f, "{}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::App(SlideSearchError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::App(SlideSearchError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::App(_) => {
                error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<SlideSearchError>,
{
    fn from(err: E) -> Self {
        Self::App(err.into())
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let images = ServeDir::new(&state.img_dir);

    let protected = Router::new()
        .route("/index", get(handlers::index))
        .route("/search", post(handlers::search))
        .route("/ask", post(handlers::ask))
        .route("/download/{*path}", get(handlers::download))
        .nest_service(&format!("/{}", IMAGE_ROUTE), images)
        .route_layer(middleware::from_fn_with_state(state.clone(), handlers::require_session));

    Router::new()
        .route("/", get(handlers::root))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .with_state(state)
}

/// Serve until Ctrl+C.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let app = router(state);
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
