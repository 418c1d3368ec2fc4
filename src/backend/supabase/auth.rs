use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;

use super::{check, SupabaseClient};
use crate::backend::SessionProvider;
use crate::errors::AppError;
use crate::models::{Session, SessionUser};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            user: self.user,
        }
    }
}

impl SupabaseClient {
    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AppError> {
        let resp = self
            .inner
            .http
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.inner.anon_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = check(resp).await?.json().await?;
        Ok(token.into_session())
    }

    async fn refresh(&self, stale: &Session) -> Result<Option<Session>, AppError> {
        let _guard = self.inner.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(current) = self.current_session() {
            if current.access_token != stale.access_token && !current.is_expired(Utc::now()) {
                return Ok(Some(current));
            }
        }

        let Some(refresh_token) = stale.refresh_token.clone() else {
            self.inner.session.send_replace(None);
            return Ok(None);
        };

        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "session refreshed");
                self.inner.session.send_replace(Some(session.clone()));
                Ok(Some(session))
            }
            Err(AppError::Backend(message)) => {
                tracing::warn!(error = %message, "session refresh rejected, signing out");
                self.inner.session.send_replace(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SessionProvider for SupabaseClient {
    async fn get_current_session(&self) -> Result<Option<Session>, AppError> {
        match self.current_session() {
            Some(session) if session.is_expired(Utc::now()) => self.refresh(&session).await,
            other => Ok(other),
        }
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        tracing::info!(user_id = %session.user.id, "signed in");
        self.inner.session.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let resp = self
            .inner
            .http
            .post(self.endpoint("/auth/v1/signup"))
            .header("apikey", &self.inner.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: serde_json::Value = check(resp).await?.json().await?;

        // Without auto-confirm the backend answers with the bare user record.
        if body.get("access_token").is_none() {
            tracing::info!("account created, awaiting email confirmation");
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Backend(format!("malformed sign-up response: {e}")))?;
        let session = token.into_session();
        tracing::info!(user_id = %session.user.id, "account created");
        self.inner.session.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AppError> {
        let resp = self
            .request(Method::POST, "/auth/v1/recover")
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        if self.current_session().is_some() {
            let resp = self.request(Method::POST, "/auth/v1/logout").send().await?;
            if let Err(e) = check(resp).await {
                // The local session is dropped regardless.
                tracing::warn!(error = %e, "remote sign-out failed");
            }
        }
        self.inner.session.send_replace(None);
        tracing::info!("signed out");
        Ok(())
    }
}
