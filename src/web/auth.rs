//! Login check and cookie sessions for the web UI.
//!
//! One username/password pair is configured. A successful login creates a
//! random session token, handed to the browser in an HttpOnly cookie.

use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "slides_session";

/// Compares a provided secret against the expected one in constant time.
///
/// Returns `false` if either value is empty.
pub fn validate_secret(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let len_match = provided.len() == expected.len();

    let mut diff: u8 = 0;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }

    len_match && diff == 0
}

/// Check a username/password pair. Both halves are always compared.
pub fn validate_credentials(username: &str, password: &str, expected_user: &str, expected_password: &str) -> bool {
    let user_ok = validate_secret(username, expected_user);
    let password_ok = validate_secret(password, expected_password);
    user_ok & password_ok
}

/// Extract the session token from the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value removing the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[derive(Debug, Clone)]
struct Session {
    created: Instant,
    /// Ids of the slides returned by this session's last search.
    last_search: Vec<String>,
}

/// Live login sessions keyed by token.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expired(&self, session: &Session) -> bool {
        session.created.elapsed() >= self.ttl
    }

    /// Start a new session and return its token. Expired sessions are dropped first.
    pub async fn create(&self) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, s| s.created.elapsed() < self.ttl);
        if sessions.len() < before {
            debug!("Pruned {} expired sessions", before - sessions.len());
        }

        sessions.insert(
            token.clone(),
            Session {
                created: Instant::now(),
                last_search: Vec::new(),
            },
        );
        token
    }

    /// Whether `token` names a live session.
    pub async fn is_valid(&self, token: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|s| !self.expired(s))
            .unwrap_or(false)
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Remember the result ids of the session's latest search.
    pub async fn set_last_search(&self, token: &str, ids: Vec<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.last_search = ids;
        }
    }

    /// Result ids of the session's latest search, empty if it has not searched yet.
    pub async fn last_search(&self, token: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|s| s.last_search.clone())
            .unwrap_or_default()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
