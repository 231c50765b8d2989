//! Route handlers for the web UI and its JSON endpoints.

use super::auth::{clear_session_cookie, session_cookie, session_token, validate_credentials};
use super::{ApiError, AppState, SessionToken};
use crate::error::SlideSearchError;
use crate::search::{Answer, SlideMatch};
use crate::slides::mime_type;
use axum::{
    extract::{Path, Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const LOGIN_PAGE: &str = include_str!("assets/login.html");
const INDEX_PAGE: &str = include_str!("assets/index.html");

fn login_page(error: &str) -> Html<String> {
    Html(LOGIN_PAGE.replace("{{error}}", error))
}

/// Lets requests with a live session through and records its token in the extensions.
/// The search page redirects to the login page instead of answering 401.
pub(super) async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = session_token(req.headers());
    let valid = match &token {
        Some(t) => state.sessions.is_valid(t).await,
        None => false,
    };

    match token {
        Some(token) if valid => {
            req.extensions_mut().insert(SessionToken(token));
            next.run(req).await
        }
        _ => {
            debug!("Rejected unauthenticated request to {}", req.uri().path());
            if req.method() == Method::GET && req.uri().path() == "/index" {
                Redirect::to("/").into_response()
            } else {
                ApiError::Unauthorized.into_response()
            }
        }
    }
}

pub(super) async fn root(State(state): State<Arc<AppState>>, headers: axum::http::HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if state.sessions.is_valid(&token).await {
            return Redirect::to("/index").into_response();
        }
    }
    login_page("").into_response()
}

#[derive(Deserialize)]
pub(super) struct LoginForm {
    username: String,
    password: String,
}

pub(super) async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    if !validate_credentials(&form.username, &form.password, &state.username, &state.password) {
        warn!("Failed login attempt for {:?}", form.username);
        return (StatusCode::UNAUTHORIZED, login_page("Invalid username or password.")).into_response();
    }

    let token = state.sessions.create().await;
    info!("{} logged in", form.username);
    (
        [(header::SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Redirect::to("/index"),
    )
        .into_response()
}

pub(super) async fn logout(State(state): State<Arc<AppState>>, headers: axum::http::HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(&token).await;
    }
    ([(header::SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response()
}

pub(super) async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

#[derive(Deserialize)]
pub(super) struct SearchRequest {
    query: String,
}

#[derive(Serialize)]
pub(super) struct SearchResponse {
    slides: Vec<SlideMatch>,
}

pub(super) async fn search(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let slides = state.searcher.search(&req.query).await?;

    let ids = slides.iter().map(|s| s.id.clone()).collect();
    state.sessions.set_last_search(&session.0, ids).await;

    Ok(Json(SearchResponse { slides }))
}

#[derive(Deserialize)]
pub(super) struct AskRequest {
    question: String,
}

pub(super) async fn ask(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, ApiError> {
    let ids = state.sessions.last_search(&session.0).await;
    let answer = state.answer_engine.answer(&req.question, &ids).await?;
    Ok(Json(answer))
}

/// Relative path below the image root, rejecting anything that could escape it.
fn safe_relative_path(path: &str) -> Result<PathBuf, SlideSearchError> {
    let mut clean = PathBuf::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(SlideSearchError::InvalidInput(format!("Invalid path: {}", path)));
            }
            _ if part.contains('\\') || part.contains(':') => {
                return Err(SlideSearchError::InvalidInput(format!("Invalid path: {}", path)));
            }
            _ => clean.push(part),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(SlideSearchError::InvalidInput("Empty path".to_string()));
    }
    Ok(clean)
}

pub(super) async fn download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let relative = safe_relative_path(&path)?;
    let file = state.img_dir.join(&relative);
    if !file.is_file() {
        return Err(SlideSearchError::NotFound(format!("No such file: {}", path)).into());
    }

    let bytes = tokio::fs::read(&file).await?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', "_"))
        .unwrap_or_else(|| "slide".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, mime_type(&file).to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
        ],
        bytes,
    )
        .into_response())
}

pub(super) async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let records = state.vector_store.record_count().await?;
    Ok(Json(json!({ "status": "ok", "records": records })))
}
