use crate::backend::{BookingRepository, LocationProvider, PermissionStatus, SessionProvider};
use crate::errors::AppError;
use crate::models::{Booking, BookingLocation, BookingStatus, NewBooking, PaymentMethod, Service};

const PINNED_ADDRESS: &str = "Pinned Location";

/// Confirms a booking for `service` at the device's current position.
pub async fn confirm_booking(
    sessions: &dyn SessionProvider,
    repository: &dyn BookingRepository,
    location: &dyn LocationProvider,
    service: &Service,
    payment_method: PaymentMethod,
) -> Result<Booking, AppError> {
    if location.request_permission().await == PermissionStatus::Denied {
        return Err(AppError::PermissionDenied(
            "We need your location to send a therapist.".to_string(),
        ));
    }
    let position = location.get_current_position().await?;

    let session = sessions
        .get_current_session()
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let booking = repository
        .insert_booking(&NewBooking {
            client_id: session.user_id().to_string(),
            service_type: service.name.clone(),
            total_price: service.price,
            status: BookingStatus::Pending,
            location: BookingLocation {
                latitude: position.latitude,
                longitude: position.longitude,
                address: PINNED_ADDRESS.to_string(),
            },
            payment_method,
        })
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        service = %service.name,
        category = service.category.as_str(),
        payment_method = payment_method.as_str(),
        "booking confirmed"
    );
    Ok(booking)
}
