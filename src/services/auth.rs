use serde::Serialize;

use crate::backend::{BookingRepository, SessionProvider};
use crate::errors::AppError;
use crate::models::{Session, UserProfile};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignUpOutcome {
    SignedIn { session: Session },
    /// The account exists but the backend wants the email confirmed first.
    ConfirmationRequired,
}

fn require_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("Please fill in all fields".to_string()));
    }
    Ok(())
}

pub async fn sign_in(sessions: &dyn SessionProvider, email: &str, password: &str) -> Result<Session, AppError> {
    require_credentials(email, password)?;
    sessions.sign_in_with_password(email.trim(), password).await
}

/// Creates the account and, when a session comes back straight away, the
/// client's profile row.
pub async fn sign_up(
    sessions: &dyn SessionProvider,
    repository: &dyn BookingRepository,
    email: &str,
    password: &str,
) -> Result<SignUpOutcome, AppError> {
    require_credentials(email, password)?;

    let Some(session) = sessions.sign_up(email.trim(), password).await? else {
        tracing::info!("sign-up awaiting email confirmation");
        return Ok(SignUpOutcome::ConfirmationRequired);
    };

    let profile = UserProfile::new_client(&session.user);
    if let Err(e) = repository.insert_profile(&profile).await {
        // The account is usable without the profile row.
        tracing::error!(user_id = %session.user_id(), error = %e, "failed to create client profile");
    }

    Ok(SignUpOutcome::SignedIn { session })
}

pub async fn reset_password(sessions: &dyn SessionProvider, email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::Validation(
            "Please enter your email to receive a reset link.".to_string(),
        ));
    }
    sessions.reset_password_for_email(email.trim()).await
}
