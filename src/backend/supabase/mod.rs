//! Client for the managed backend: GoTrue auth, PostgREST rows and the
//! realtime change feed.

pub mod auth;
pub mod realtime;
pub mod rest;

use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tokio::sync::watch;

use crate::errors::AppError;
use crate::models::Session;

#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    anon_key: String,
    http: reqwest::Client,
    session: watch::Sender<Option<Session>>,
    // Serializes token refreshes so concurrent callers do not race on the refresh token.
    refresh_lock: tokio::sync::Mutex<()>,
    realtime_url: RwLock<Option<String>>,
}

impl SupabaseClient {
    pub fn new(url: String, anon_key: String) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                http: reqwest::Client::new(),
                session,
                refresh_lock: tokio::sync::Mutex::new(()),
                realtime_url: RwLock::new(None),
            }),
        }
    }

    /// Overrides the websocket endpoint derived from the project URL.
    pub fn with_realtime_url(self, url: String) -> Self {
        if let Ok(mut slot) = self.inner.realtime_url.write() {
            *slot = Some(url);
        }
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.inner.url, path)
    }

    fn current_session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    /// Bearer token for row requests: the user's access token, or the anon key.
    fn bearer(&self) -> String {
        self.current_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.inner.anon_key.clone())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .http
            .request(method, self.endpoint(path))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(self.bearer())
    }

    fn realtime_endpoint(&self) -> String {
        if let Some(url) = self.inner.realtime_url.read().ok().and_then(|u| u.clone()) {
            return url;
        }
        let base = if let Some(rest) = self.inner.url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.inner.url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.inner.url.clone()
        };
        format!(
            "{base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.inner.anon_key
        )
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Turns a non-2xx response into `AppError::Backend` carrying the backend's own message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| format!("backend returned {status}"));

    tracing::warn!(status = %status, error = %message, "backend request failed");
    Err(AppError::Backend(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_endpoint_from_project_url() {
        let client = SupabaseClient::new("https://abc.supabase.co/".to_string(), "anon".to_string());
        assert_eq!(
            client.realtime_endpoint(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = SupabaseClient::new("http://127.0.0.1:54321".to_string(), "k".to_string());
        assert!(local.realtime_endpoint().starts_with("ws://127.0.0.1:54321/realtime/v1/"));
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let client = SupabaseClient::new("https://abc.supabase.co".to_string(), "anon".to_string());
        assert_eq!(client.bearer(), "anon");
    }
}
