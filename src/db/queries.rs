use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::AppError;
use crate::models::{
    Booking, BookingLocation, BookingStatus, Coordinate, PaymentMethod, Service, ServiceCategory,
    UserProfile, UserRole,
};

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, name, description, price, duration_min, category, image_url, is_featured";

pub fn list_active_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1 ORDER BY price ASC"
    ))?;

    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>, AppError> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

fn parse_service_row(row: &Row) -> rusqlite::Result<Service> {
    let category: String = row.get(5)?;
    let category = ServiceCategory::parse(&category).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown service category: {category}").into(),
        )
    })?;

    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration_min: row.get(4)?,
        category,
        image_url: row.get(6)?,
        featured: row.get(7)?,
    })
}

// ── Profiles ──

pub fn insert_profile(conn: &Connection, profile: &UserProfile) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO profiles (id, email, role, full_name, phone_number, avatar_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            profile.id,
            profile.email,
            profile.role.as_str(),
            profile.full_name,
            profile.phone_number,
            profile.avatar_url,
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<UserProfile>, AppError> {
    let profile = conn
        .query_row(
            "SELECT id, email, role, full_name, phone_number, avatar_url FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(2)?;
                let role = UserRole::parse(&role).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown user role: {role}").into(),
                    )
                })?;
                Ok(UserProfile {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    role,
                    full_name: row.get(3)?,
                    phone_number: row.get(4)?,
                    avatar_url: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, client_id, service_type, total_price, status, created_at, updated_at, \
     latitude, longitude, address, payment_method, therapist_id, therapist_name, \
     therapist_latitude, therapist_longitude, therapist_location_updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO bookings (id, client_id, service_type, total_price, status, created_at, updated_at,
                               latitude, longitude, address, payment_method)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.client_id,
            booking.service_type,
            booking.total_price,
            booking.status.as_str(),
            booking.created_at,
            booking.updated_at,
            booking.location.latitude,
            booking.location.longitude,
            booking.location.address,
            booking.payment_method.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

pub fn get_active_booking(conn: &Connection, client_id: &str) -> Result<Option<Booking>, AppError> {
    let statuses = BookingStatus::ACTIVE
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let booking = conn
        .query_row(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE client_id = ?1 AND status IN ({statuses})
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![client_id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn assign_therapist(
    conn: &Connection,
    id: &str,
    therapist_id: &str,
    therapist_name: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE bookings SET therapist_id = ?1, therapist_name = ?2, updated_at = ?3 WHERE id = ?4",
        params![therapist_id, therapist_name, now, id],
    )?;
    Ok(count > 0)
}

pub fn update_therapist_location(
    conn: &Connection,
    id: &str,
    position: Coordinate,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE bookings
         SET therapist_latitude = ?1, therapist_longitude = ?2,
             therapist_location_updated_at = ?3, updated_at = ?3
         WHERE id = ?4",
        params![position.latitude, position.longitude, now, id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let status: String = row.get(4)?;
    let payment_method: String = row.get(10)?;
    let payment_method = PaymentMethod::parse(&payment_method).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            format!("unknown payment method: {payment_method}").into(),
        )
    })?;

    Ok(Booking {
        id: row.get(0)?,
        client_id: row.get(1)?,
        service_type: row.get(2)?,
        total_price: row.get(3)?,
        status: BookingStatus::parse(&status),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        location: BookingLocation {
            latitude: row.get(7)?,
            longitude: row.get(8)?,
            address: row.get(9)?,
        },
        payment_method,
        therapist_id: row.get(11)?,
        therapist_name: row.get(12)?,
        therapist_latitude: row.get(13)?,
        therapist_longitude: row.get(14)?,
        therapist_location_updated_at: row.get(15)?,
    })
}
