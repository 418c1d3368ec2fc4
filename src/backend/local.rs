use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::{broadcast, mpsc, watch};

use super::{BookingFilter, BookingRepository, BookingSubscription, ServiceCatalog, SessionProvider};
use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingPatch, BookingStatus, Coordinate, NewBooking, Service, Session, SessionUser,
    UserProfile,
};

const CHANGE_FEED_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 64;

/// SQLite-backed stand-in for the managed backend. Besides the client-facing
/// traits it exposes the backend-side mutations (status transitions, therapist
/// assignment, location pings) that a dispatcher would perform.
pub struct LocalBackend {
    db: Mutex<Connection>,
    changes: broadcast::Sender<BookingPatch>,
}

impl LocalBackend {
    pub fn new(conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            db: Mutex::new(conn),
            changes,
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(db::init_db(path)?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Backend("database lock poisoned".to_string()))
    }

    /// Re-reads the row and pushes it to subscribers, the way a row-level
    /// change feed delivers the full new record.
    fn publish(&self, id: &str) -> Result<Booking, AppError> {
        let booking = {
            let db = self.conn()?;
            queries::get_booking(&db, id)?
        }
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

        // No receivers is fine; nobody is watching this booking.
        let _ = self.changes.send(BookingPatch::from(&booking));
        Ok(booking)
    }

    fn ensure_updated(&self, updated: bool, id: &str) -> Result<(), AppError> {
        if updated {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("booking {id}")))
        }
    }

    pub fn set_status(&self, id: &str, status: BookingStatus) -> Result<Booking, AppError> {
        let updated = {
            let db = self.conn()?;
            queries::update_booking_status(&db, id, status, Utc::now())?
        };
        self.ensure_updated(updated, id)?;
        tracing::info!(booking_id = id, status = status.as_str(), "booking status changed");
        self.publish(id)
    }

    pub fn assign_therapist(
        &self,
        id: &str,
        therapist_id: &str,
        therapist_name: &str,
    ) -> Result<Booking, AppError> {
        let updated = {
            let db = self.conn()?;
            queries::assign_therapist(&db, id, therapist_id, therapist_name, Utc::now())?
        };
        self.ensure_updated(updated, id)?;
        tracing::info!(booking_id = id, therapist_id, "therapist assigned");
        self.publish(id)
    }

    pub fn update_therapist_location(&self, id: &str, position: Coordinate) -> Result<Booking, AppError> {
        let updated = {
            let db = self.conn()?;
            queries::update_therapist_location(&db, id, position, Utc::now())?
        };
        self.ensure_updated(updated, id)?;
        tracing::debug!(
            booking_id = id,
            latitude = position.latitude,
            longitude = position.longitude,
            "therapist location updated"
        );
        self.publish(id)
    }
}

#[async_trait]
impl BookingRepository for LocalBackend {
    async fn query_active_booking(&self, user_id: &str) -> Result<Option<Booking>, AppError> {
        let db = self.conn()?;
        queries::get_active_booking(&db, user_id)
    }

    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>, AppError> {
        let db = self.conn()?;
        queries::get_booking(&db, booking_id)
    }

    async fn insert_booking(&self, new: &NewBooking) -> Result<Booking, AppError> {
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: new.client_id.clone(),
            service_type: new.service_type.clone(),
            total_price: new.total_price,
            status: new.status,
            created_at: Utc::now(),
            updated_at: None,
            location: new.location.clone(),
            payment_method: new.payment_method,
            therapist_id: None,
            therapist_name: None,
            therapist_latitude: None,
            therapist_longitude: None,
            therapist_location_updated_at: None,
        };

        {
            let db = self.conn()?;
            queries::insert_booking(&db, &booking)?;
        }
        tracing::info!(booking_id = %booking.id, client_id = %booking.client_id, "booking inserted");
        Ok(booking)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let db = self.conn()?;
        queries::insert_profile(&db, profile)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let db = self.conn()?;
        queries::get_profile(&db, user_id)
    }

    async fn subscribe_to_updates(&self, filter: BookingFilter) -> Result<BookingSubscription, AppError> {
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let topic = filter.topic();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(patch) => {
                        if filter.matches(&patch) && tx.send(patch).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "booking change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tracing::info!(topic = %topic, "subscribed to booking updates");
        Ok(BookingSubscription::new(topic, rx, task))
    }
}

#[async_trait]
impl ServiceCatalog for LocalBackend {
    async fn list_active_services(&self) -> Result<Vec<Service>, AppError> {
        let db = self.conn()?;
        queries::list_active_services(&db)
    }

    async fn get_service_by_id(&self, id: &str) -> Result<Option<Service>, AppError> {
        let db = self.conn()?;
        queries::get_service(&db, id)
    }
}

struct LocalAccount {
    user_id: String,
    password: String,
}

/// In-process accounts for development runs. Sessions never expire.
pub struct LocalSessionProvider {
    accounts: Mutex<HashMap<String, LocalAccount>>,
    session: watch::Sender<Option<Session>>,
}

impl Default for LocalSessionProvider {
    fn default() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }
}

impl LocalSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_lowercase(),
                LocalAccount {
                    user_id: uuid::Uuid::new_v4().to_string(),
                    password: password.to_string(),
                },
            );
        }
        self
    }

    fn accounts(&self) -> Result<MutexGuard<'_, HashMap<String, LocalAccount>>, AppError> {
        self.accounts
            .lock()
            .map_err(|_| AppError::Backend("account store lock poisoned".to_string()))
    }

    fn issue(&self, user_id: String, email: &str) -> Session {
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: user_id,
                email: Some(email.to_string()),
            },
        };
        self.session.send_replace(Some(session.clone()));
        session
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, AppError> {
        Ok(self.session.borrow().clone())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user_id = {
            let accounts = self.accounts()?;
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.user_id.clone(),
                _ => return Err(AppError::Backend("Invalid login credentials".to_string())),
            }
        };
        tracing::info!(user_id = %user_id, "signed in");
        Ok(self.issue(user_id, email))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let user_id = uuid::Uuid::new_v4().to_string();
        {
            let mut accounts = self.accounts()?;
            let key = email.to_lowercase();
            if accounts.contains_key(&key) {
                return Err(AppError::Backend("User already registered".to_string()));
            }
            accounts.insert(
                key,
                LocalAccount {
                    user_id: user_id.clone(),
                    password: password.to_string(),
                },
            );
        }
        tracing::info!(user_id = %user_id, "account created");
        Ok(Some(self.issue(user_id, email)))
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AppError> {
        tracing::info!(email, "password reset requested (local backend sends no email)");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.session.send_replace(None);
        tracing::info!("signed out");
        Ok(())
    }
}
