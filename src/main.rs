use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use spacall::backend::local::{LocalBackend, LocalSessionProvider};
use spacall::backend::location::FixedLocationProvider;
use spacall::backend::supabase::SupabaseClient;
use spacall::backend::{BookingRepository, ServiceCatalog, SessionProvider};
use spacall::config::{AppConfig, BackendKind};
use spacall::handlers;
use spacall::services::auth;
use spacall::services::lifecycle::ActiveBookingCoordinator;
use spacall::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;

    let (sessions, bookings, catalog, dev): (
        Arc<dyn SessionProvider>,
        Arc<dyn BookingRepository>,
        Arc<dyn ServiceCatalog>,
        Option<Arc<LocalBackend>>,
    ) = match config.backend {
        BackendKind::Supabase => {
            tracing::info!("using Supabase backend (url: {})", config.supabase_url);
            let client = SupabaseClient::new(config.supabase_url.clone(), config.supabase_anon_key.clone());
            (Arc::new(client.clone()), Arc::new(client.clone()), Arc::new(client), None)
        }
        BackendKind::Local => {
            tracing::info!("using local backend (database: {})", config.database_url);
            let backend = Arc::new(LocalBackend::open(&config.database_url)?);
            let mut sessions = LocalSessionProvider::new();
            if !config.email.is_empty() {
                sessions = sessions.with_account(&config.email, &config.password);
            }
            (Arc::new(sessions), backend.clone(), backend.clone(), Some(backend))
        }
    };

    let location = Arc::new(FixedLocationProvider::new(
        config.device_location,
        config.location_permission_granted,
    ));

    let active = ActiveBookingCoordinator::new(bookings.clone()).spawn(sessions.on_session_change());

    if !config.email.is_empty() {
        match auth::sign_in(sessions.as_ref(), &config.email, &config.password).await {
            Ok(session) => tracing::info!(user_id = %session.user_id(), "signed in at startup"),
            Err(e) => tracing::warn!(error = %e, "startup sign-in failed"),
        }
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        sessions,
        bookings,
        catalog,
        location,
        active,
        dev,
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
