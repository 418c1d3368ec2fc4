use std::env;

use crate::errors::AppError;
use crate::models::Coordinate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Supabase,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub backend: BackendKind,
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub email: String,
    pub password: String,
    pub device_location: Option<Coordinate>,
    pub location_permission_granted: bool,
    pub dev_token: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let device_location = match (
            env::var("DEVICE_LATITUDE").ok().and_then(|v| v.parse().ok()),
            env::var("DEVICE_LONGITUDE").ok().and_then(|v| v.parse().ok()),
        ) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            backend: match env::var("BACKEND").unwrap_or_default().as_str() {
                "supabase" => BackendKind::Supabase,
                _ => BackendKind::Local,
            },
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "spacall.db".to_string()),
            supabase_url: env::var("SUPABASE_URL").unwrap_or_default(),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            email: env::var("SPACALL_EMAIL").unwrap_or_default(),
            password: env::var("SPACALL_PASSWORD").unwrap_or_default(),
            device_location,
            location_permission_granted: env::var("LOCATION_PERMISSION")
                .map(|v| v != "denied")
                .unwrap_or(true),
            dev_token: env::var("DEV_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.backend == BackendKind::Supabase
            && (self.supabase_url.is_empty() || self.supabase_anon_key.is_empty())
        {
            return Err(AppError::Config(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set when BACKEND=supabase".to_string(),
            ));
        }
        Ok(())
    }
}
