use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::backend::{BookingFilter, BookingRepository, BookingSubscription};
use crate::models::{Booking, BookingPatch, BookingStatus, Session};

const EVENT_CAPACITY: usize = 64;
/// Pause before rejoining a change feed the backend closed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingEvent {
    Updated { booking: Booking },
    /// Fired once when the held booking reaches `COMPLETED`.
    Completed { booking_id: String },
    Cancelled { booking_id: String },
    /// The session ended and the held booking was dropped.
    Cleared,
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Updated { .. } => "updated",
            BookingEvent::Completed { .. } => "completed",
            BookingEvent::Cancelled { .. } => "cancelled",
            BookingEvent::Cleared => "cleared",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ActiveBookingState {
    pub booking: Option<Booking>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Owns the single in-memory active booking. Only the coordinator mutates it;
/// readers observe it through a watch channel.
pub struct ActiveBookingCoordinator {
    repository: Arc<dyn BookingRepository>,
    state: watch::Sender<ActiveBookingState>,
    events: broadcast::Sender<BookingEvent>,
    user_id: Option<String>,
    access_token: Option<String>,
    subscription: Option<BookingSubscription>,
}

impl ActiveBookingCoordinator {
    pub fn new(repository: Arc<dyn BookingRepository>) -> Self {
        let (state, _) = watch::channel(ActiveBookingState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            repository,
            state,
            events,
            user_id: None,
            access_token: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> watch::Receiver<ActiveBookingState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    pub fn current(&self) -> Option<Booking> {
        self.state.borrow().booking.clone()
    }

    fn emit(&self, event: BookingEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Reacts to a session change: a new user replaces all held state, a
    /// refreshed token for the same user rejoins the change feed, no session
    /// releases.
    pub async fn on_session(&mut self, session: Option<Session>) {
        match session {
            Some(session) if self.user_id.as_deref() == Some(session.user_id()) => {
                if self.access_token.as_deref() != Some(session.access_token.as_str()) {
                    tracing::info!(user_id = %session.user_id(), "access token changed, rejoining booking feed");
                    self.access_token = Some(session.access_token);
                    self.resubscribe().await;
                }
            }
            Some(session) => {
                self.release();
                self.acquire(&session).await;
            }
            None => self.release(),
        }
    }

    pub async fn acquire(&mut self, session: &Session) {
        let user_id = session.user_id().to_string();
        self.user_id = Some(user_id.clone());
        self.access_token = Some(session.access_token.clone());
        self.state.send_replace(ActiveBookingState {
            booking: None,
            loading: true,
            error: None,
        });

        // Subscribe before the initial query so no push between the two is lost.
        self.subscribe(&user_id).await;
        self.refresh().await;
    }

    async fn subscribe(&mut self, user_id: &str) {
        match self
            .repository
            .subscribe_to_updates(BookingFilter::Client(user_id.to_string()))
            .await
        {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to subscribe to booking updates");
            }
        }
    }

    /// Replaces the change feed for the held user and re-reads the booking to
    /// cover anything missed while no feed was open.
    async fn resubscribe(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            return;
        };
        if let Some(old) = self.subscription.take() {
            old.unsubscribe();
        }
        self.subscribe(&user_id).await;
        self.refresh().await;
    }

    /// Re-reads the active booking from the repository.
    pub async fn refresh(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            return;
        };

        match self.repository.query_active_booking(&user_id).await {
            Ok(booking) => {
                tracing::info!(
                    user_id = %user_id,
                    booking_id = booking.as_ref().map(|b| b.id.as_str()).unwrap_or("-"),
                    "active booking loaded"
                );
                self.state.send_replace(ActiveBookingState {
                    booking: booking.clone(),
                    loading: false,
                    error: None,
                });
                if let Some(booking) = booking {
                    self.emit(BookingEvent::Updated { booking });
                }
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to fetch active booking");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
            }
        }
    }

    pub fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.access_token = None;
        let had_user = self.user_id.take().is_some();
        self.state.send_replace(ActiveBookingState::default());
        if had_user {
            self.emit(BookingEvent::Cleared);
        }
    }

    /// Applies one pushed change to the held booking.
    pub async fn apply_update(&mut self, patch: BookingPatch) -> Option<BookingEvent> {
        let status = patch.status;
        tracing::info!(
            booking_id = patch.id.as_deref().unwrap_or("-"),
            status = status.map(|s| s.as_str()).unwrap_or("-"),
            "booking update received"
        );

        let Some(mut booking) = self.current() else {
            return self.adopt(patch);
        };

        if patch.id.as_deref().is_some_and(|id| id != booking.id) {
            // A different booking changed; re-read rather than mixing records.
            if status.is_some_and(|s| !s.is_terminal()) {
                self.refresh().await;
            }
            return None;
        }

        if let (Some(held), Some(incoming)) = (booking.updated_at, patch.updated_at) {
            if incoming < held {
                tracing::debug!(booking_id = %booking.id, "dropping stale booking update");
                return None;
            }
        }

        let event = match status {
            Some(BookingStatus::Completed) => {
                self.clear_booking();
                tracing::info!(booking_id = %booking.id, "booking completed");
                BookingEvent::Completed {
                    booking_id: booking.id,
                }
            }
            Some(BookingStatus::Cancelled) => {
                self.clear_booking();
                tracing::info!(booking_id = %booking.id, "booking cancelled");
                BookingEvent::Cancelled {
                    booking_id: booking.id,
                }
            }
            _ => {
                booking.apply(&patch);
                self.state.send_modify(|s| s.booking = Some(booking.clone()));
                BookingEvent::Updated { booking }
            }
        };

        self.emit(event.clone());
        Some(event)
    }

    fn adopt(&mut self, patch: BookingPatch) -> Option<BookingEvent> {
        if !patch.status.is_some_and(|s| !s.is_terminal()) {
            return None;
        }
        let booking = patch.into_booking()?;
        self.state.send_modify(|s| s.booking = Some(booking.clone()));
        let event = BookingEvent::Updated { booking };
        self.emit(event.clone());
        Some(event)
    }

    fn clear_booking(&self) {
        self.state.send_modify(|s| s.booking = None);
    }

    /// Runs the coordinator on its own task, following `sessions` until the
    /// returned handle is dropped.
    pub fn spawn(self, sessions: watch::Receiver<Option<Session>>) -> ActiveBookingHandle {
        let state = self.state();
        let events = self.events.clone();
        let (commands, rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(sessions, rx));
        ActiveBookingHandle {
            state,
            events,
            commands,
            task,
        }
    }

    async fn run(
        mut self,
        mut sessions: watch::Receiver<Option<Session>>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let initial = sessions.borrow_and_update().clone();
        self.on_session(initial).await;

        loop {
            tokio::select! {
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = sessions.borrow_and_update().clone();
                    self.on_session(session).await;
                }
                update = next_update(&mut self.subscription) => match update {
                    Some(patch) => {
                        self.apply_update(patch).await;
                    }
                    None => {
                        let topic = self
                            .subscription
                            .take()
                            .map(|s| s.topic().to_string())
                            .unwrap_or_default();
                        tracing::warn!(topic = %topic, "booking change feed closed");
                        if self.user_id.is_some() {
                            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                            self.resubscribe().await;
                        }
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Refresh(done)) => {
                        self.refresh().await;
                        let _ = done.send(());
                    }
                    None => break,
                },
            }
        }

        self.release();
    }
}

async fn next_update(subscription: &mut Option<BookingSubscription>) -> Option<BookingPatch> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

enum Command {
    Refresh(oneshot::Sender<()>),
}

/// Read side of a spawned coordinator. Dropping it stops the coordinator.
pub struct ActiveBookingHandle {
    state: watch::Receiver<ActiveBookingState>,
    events: broadcast::Sender<BookingEvent>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl ActiveBookingHandle {
    pub fn snapshot(&self) -> ActiveBookingState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Booking> {
        self.state.borrow().booking.clone()
    }

    pub fn watch(&self) -> watch::Receiver<ActiveBookingState> {
        self.state.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    /// Asks the coordinator to re-read the active booking and waits for it.
    pub async fn refresh(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Refresh(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for ActiveBookingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
