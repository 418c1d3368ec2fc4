use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;

const THERAPIST_PLACEHOLDER: &str = "Therapist";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    OnWay,
    Arrived,
    InSession,
    InProgress,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    /// Statuses the backend considers active for a client.
    pub const ACTIVE: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::OnWay,
        BookingStatus::Arrived,
        BookingStatus::InSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::OnWay => "ON_WAY",
            BookingStatus::Arrived => "ARRIVED",
            BookingStatus::InSession => "IN_SESSION",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => BookingStatus::Pending,
            "ACCEPTED" => BookingStatus::Accepted,
            "ON_WAY" => BookingStatus::OnWay,
            "ARRIVED" => BookingStatus::Arrived,
            "IN_SESSION" => BookingStatus::InSession,
            "IN_PROGRESS" => BookingStatus::InProgress,
            "COMPLETED" => BookingStatus::Completed,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Gcash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Gcash => "GCASH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CASH" => Some(PaymentMethod::Cash),
            "GCASH" => Some(PaymentMethod::Gcash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl BookingLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    /// Service name at the time of booking.
    pub service_type: String,
    pub total_price: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub location: BookingLocation,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub therapist_id: Option<String>,
    #[serde(default)]
    pub therapist_name: Option<String>,
    #[serde(default)]
    pub therapist_latitude: Option<f64>,
    #[serde(default)]
    pub therapist_longitude: Option<f64>,
    #[serde(default)]
    pub therapist_location_updated_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn therapist_display_name(&self) -> &str {
        self.therapist_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(THERAPIST_PLACEHOLDER)
    }

    pub fn therapist_location(&self) -> Option<Coordinate> {
        match (self.therapist_latitude, self.therapist_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Merges the fields present in `patch`; absent fields keep their prior values.
    pub fn apply(&mut self, patch: &BookingPatch) {
        fn merge<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        fn merge_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        merge(&mut self.client_id, &patch.client_id);
        merge(&mut self.service_type, &patch.service_type);
        merge(&mut self.total_price, &patch.total_price);
        merge(&mut self.status, &patch.status);
        merge(&mut self.created_at, &patch.created_at);
        merge_opt(&mut self.updated_at, &patch.updated_at);
        merge(&mut self.location, &patch.location);
        merge(&mut self.payment_method, &patch.payment_method);
        merge_opt(&mut self.therapist_id, &patch.therapist_id);
        merge_opt(&mut self.therapist_name, &patch.therapist_name);
        merge_opt(&mut self.therapist_latitude, &patch.therapist_latitude);
        merge_opt(&mut self.therapist_longitude, &patch.therapist_longitude);
        merge_opt(
            &mut self.therapist_location_updated_at,
            &patch.therapist_location_updated_at,
        );
    }
}

/// A partial booking row as delivered by a change feed. Null and missing
/// columns are both treated as "not present".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BookingPatch {
    pub id: Option<String>,
    pub client_id: Option<String>,
    pub service_type: Option<String>,
    pub total_price: Option<f64>,
    pub status: Option<BookingStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<BookingLocation>,
    pub payment_method: Option<PaymentMethod>,
    pub therapist_id: Option<String>,
    pub therapist_name: Option<String>,
    pub therapist_latitude: Option<f64>,
    pub therapist_longitude: Option<f64>,
    pub therapist_location_updated_at: Option<DateTime<Utc>>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn therapist_location(&self) -> Option<Coordinate> {
        match (self.therapist_latitude, self.therapist_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Builds a full record when the patch carries every required column.
    pub fn into_booking(self) -> Option<Booking> {
        Some(Booking {
            id: self.id?,
            client_id: self.client_id?,
            service_type: self.service_type?,
            total_price: self.total_price?,
            status: self.status?,
            created_at: self.created_at?,
            updated_at: self.updated_at,
            location: self.location?,
            payment_method: self.payment_method?,
            therapist_id: self.therapist_id,
            therapist_name: self.therapist_name,
            therapist_latitude: self.therapist_latitude,
            therapist_longitude: self.therapist_longitude,
            therapist_location_updated_at: self.therapist_location_updated_at,
        })
    }
}

impl From<&Booking> for BookingPatch {
    fn from(b: &Booking) -> Self {
        Self {
            id: Some(b.id.clone()),
            client_id: Some(b.client_id.clone()),
            service_type: Some(b.service_type.clone()),
            total_price: Some(b.total_price),
            status: Some(b.status),
            created_at: Some(b.created_at),
            updated_at: b.updated_at,
            location: Some(b.location.clone()),
            payment_method: Some(b.payment_method),
            therapist_id: b.therapist_id.clone(),
            therapist_name: b.therapist_name.clone(),
            therapist_latitude: b.therapist_latitude,
            therapist_longitude: b.therapist_longitude,
            therapist_location_updated_at: b.therapist_location_updated_at,
        }
    }
}

/// Row inserted on checkout confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBooking {
    pub client_id: String,
    pub service_type: String,
    pub total_price: f64,
    pub status: BookingStatus,
    pub location: BookingLocation,
    pub payment_method: PaymentMethod,
}
