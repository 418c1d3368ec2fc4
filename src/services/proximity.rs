use serde::Serialize;

use crate::models::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Straight-line city speed used for arrival estimates.
pub const AVERAGE_SPEED_KMH: f64 = 30.0;

const DEFAULT_REGION_DELTA: f64 = 0.02;
const MIN_REGION_DELTA: f64 = 0.005;
const REGION_PADDING: f64 = 1.5;

fn to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Great-circle distance in kilometres.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = to_rad(to.latitude - from.latitude);
    let d_lon = to_rad(to.longitude - from.longitude);

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + to_rad(from.latitude).cos()
            * to_rad(to.latitude).cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        format!("{}m", (distance_km * 1000.0).round() as i64)
    } else {
        format!("{}km", to_fixed_1(distance_km))
    }
}

/// One decimal place of the exact stored value, rounding exact halves up.
fn to_fixed_1(value: f64) -> String {
    // A binary double sits exactly on a hundredths half (x.25, x.75) only
    // when four times it is an odd integer; everything else already rounds
    // correctly in `{:.1}`.
    let quarters = value * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        format!("{:.1}", (value * 10.0).ceil() / 10.0)
    } else {
        format!("{value:.1}")
    }
}

pub fn eta_minutes(distance_km: f64) -> i64 {
    (distance_km / AVERAGE_SPEED_KMH * 60.0).round() as i64
}

pub fn format_eta(minutes: i64) -> String {
    if minutes < 1 {
        "< 1 min".to_string()
    } else {
        format!("{minutes} min")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub distance_km: f64,
    pub distance_label: String,
    pub eta_minutes: i64,
    pub eta_label: String,
}

pub fn estimate(client: Coordinate, therapist: Coordinate) -> Estimate {
    let distance_km = haversine_km(client, therapist);
    let eta = eta_minutes(distance_km);
    Estimate {
        distance_km,
        distance_label: format_distance(distance_km),
        eta_minutes: eta,
        eta_label: format_eta(eta),
    }
}

/// Visible map area: a center plus the latitude/longitude span shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    pub fn around(center: Coordinate) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: DEFAULT_REGION_DELTA,
            longitude_delta: DEFAULT_REGION_DELTA,
        }
    }

    /// Smallest padded region showing both points.
    pub fn fit(a: Coordinate, b: Coordinate) -> Self {
        Self {
            latitude: (a.latitude + b.latitude) / 2.0,
            longitude: (a.longitude + b.longitude) / 2.0,
            latitude_delta: ((a.latitude - b.latitude).abs() * REGION_PADDING).max(MIN_REGION_DELTA),
            longitude_delta: ((a.longitude - b.longitude).abs() * REGION_PADDING)
                .max(MIN_REGION_DELTA),
        }
    }
}
