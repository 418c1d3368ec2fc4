pub mod local;
pub mod location;
pub mod supabase;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::{Booking, BookingPatch, Coordinate, NewBooking, Service, Session, UserProfile};

/// Rows a change-feed subscription is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingFilter {
    Client(String),
    Booking(String),
}

impl BookingFilter {
    pub fn matches(&self, patch: &BookingPatch) -> bool {
        match self {
            BookingFilter::Client(id) => patch.client_id.as_deref() == Some(id.as_str()),
            BookingFilter::Booking(id) => patch.id.as_deref() == Some(id.as_str()),
        }
    }

    pub fn topic(&self) -> String {
        match self {
            BookingFilter::Client(id) => format!("booking_updates_{id}"),
            BookingFilter::Booking(id) => format!("therapist_location_{id}"),
        }
    }
}

/// A live change feed. The feed task is stopped when the handle is dropped or
/// explicitly unsubscribed.
pub struct BookingSubscription {
    topic: String,
    updates: mpsc::Receiver<BookingPatch>,
    task: Option<JoinHandle<()>>,
}

impl BookingSubscription {
    pub fn new(topic: String, updates: mpsc::Receiver<BookingPatch>, task: JoinHandle<()>) -> Self {
        Self {
            topic,
            updates,
            task: Some(task),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next update, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<BookingPatch> {
        self.updates.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(topic = %self.topic, "booking subscription closed");
        }
    }
}

impl Drop for BookingSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current session, refreshed first when its access token has expired.
    async fn get_current_session(&self) -> Result<Option<Session>, AppError>;

    /// Receiver that observes every sign-in and sign-out.
    fn on_session_change(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Returns `None` when the account needs email confirmation before a session is issued.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError>;

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Most recent booking of `user_id` whose status is in [`crate::models::BookingStatus::ACTIVE`].
    async fn query_active_booking(&self, user_id: &str) -> Result<Option<Booking>, AppError>;

    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>, AppError>;

    async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, AppError>;

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    async fn subscribe_to_updates(&self, filter: BookingFilter) -> Result<BookingSubscription, AppError>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Active services, cheapest first.
    async fn list_active_services(&self) -> Result<Vec<Service>, AppError>;

    async fn get_service_by_id(&self, id: &str) -> Result<Option<Service>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn get_current_position(&self) -> Result<Coordinate, AppError>;
}
