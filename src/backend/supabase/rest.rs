use async_trait::async_trait;
use reqwest::Method;

use super::{check, SupabaseClient};
use crate::backend::{BookingFilter, BookingRepository, BookingSubscription, ServiceCatalog};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking, Service, UserProfile};

impl SupabaseClient {
    async fn select<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let resp = self
            .request(Method::GET, &format!("/rest/v1/{table}"))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

fn active_status_filter() -> String {
    let statuses = BookingStatus::ACTIVE
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({statuses})")
}

#[async_trait]
impl BookingRepository for SupabaseClient {
    async fn query_active_booking(&self, user_id: &str) -> Result<Option<Booking>, AppError> {
        let rows: Vec<Booking> = self
            .select(
                "bookings",
                &[
                    ("client_id", format!("eq.{user_id}")),
                    ("status", active_status_filter()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>, AppError> {
        let rows: Vec<Booking> = self
            .select("bookings", &[("id", format!("eq.{booking_id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, AppError> {
        let resp = self
            .request(Method::POST, "/rest/v1/bookings")
            .header("Prefer", "return=representation")
            .json(&[booking])
            .send()
            .await?;

        let rows: Vec<Booking> = check(resp).await?.json().await?;
        let inserted = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Backend("insert returned no rows".to_string()))?;
        tracing::info!(booking_id = %inserted.id, client_id = %inserted.client_id, "booking inserted");
        Ok(inserted)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let resp = self
            .request(Method::POST, "/rest/v1/profiles")
            .json(&[profile])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let rows: Vec<UserProfile> = self
            .select("profiles", &[("id", format!("eq.{user_id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn subscribe_to_updates(&self, filter: BookingFilter) -> Result<BookingSubscription, AppError> {
        self.open_change_feed(filter).await
    }
}

#[async_trait]
impl ServiceCatalog for SupabaseClient {
    async fn list_active_services(&self) -> Result<Vec<Service>, AppError> {
        self.select(
            "services",
            &[
                ("is_active", "eq.true".to_string()),
                ("order", "price.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_service_by_id(&self, id: &str) -> Result<Option<Service>, AppError> {
        let rows: Vec<Service> = self.select("services", &[("id", format!("eq.{id}"))]).await?;
        Ok(rows.into_iter().next())
    }
}
