use std::sync::Arc;

use crate::backend::local::LocalBackend;
use crate::backend::{BookingRepository, LocationProvider, ServiceCatalog, SessionProvider};
use crate::config::AppConfig;
use crate::services::lifecycle::ActiveBookingHandle;

pub struct AppState {
    pub config: AppConfig,
    pub sessions: Arc<dyn SessionProvider>,
    pub bookings: Arc<dyn BookingRepository>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub location: Arc<dyn LocationProvider>,
    pub active: ActiveBookingHandle,
    /// Backend-side controls; only the local backend has them.
    pub dev: Option<Arc<LocalBackend>>,
}
