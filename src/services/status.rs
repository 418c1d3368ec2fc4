use serde::Serialize;

use crate::models::BookingStatus;

const GOLD: &str = "#D4AF37";
const GREEN: &str = "#2E7D32";
const CHARCOAL: &str = "#2B2A29";
const RED: &str = "#C62828";

/// Steps rendered by the progress indicator, in order.
pub const PROGRESS_TRACK: [BookingStatus; 5] = [
    BookingStatus::Pending,
    BookingStatus::Accepted,
    BookingStatus::OnWay,
    BookingStatus::InProgress,
    BookingStatus::Completed,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusConfig {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub color: &'static str,
    pub trackable: bool,
}

const PENDING: StatusConfig = StatusConfig {
    title: "Finding a therapist...",
    subtitle: "We're matching you with a therapist near your pinned location.",
    color: GOLD,
    trackable: false,
};

impl StatusConfig {
    pub fn for_status(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending | BookingStatus::Unknown => PENDING,
            BookingStatus::Accepted => StatusConfig {
                title: "Therapist assigned",
                subtitle: "Your therapist accepted the booking and is getting ready.",
                color: GREEN,
                trackable: true,
            },
            BookingStatus::OnWay => StatusConfig {
                title: "Therapist is on the way!",
                subtitle: "Track their location in real time.",
                color: GREEN,
                trackable: true,
            },
            BookingStatus::Arrived => StatusConfig {
                title: "Your therapist has arrived",
                subtitle: "Please meet them at your pinned location.",
                color: GREEN,
                trackable: true,
            },
            // Tracking stays available during the session.
            BookingStatus::InProgress | BookingStatus::InSession => StatusConfig {
                title: "Session in progress",
                subtitle: "Relax and enjoy your massage.",
                color: CHARCOAL,
                trackable: true,
            },
            BookingStatus::Completed => StatusConfig {
                title: "Massage completed",
                subtitle: "Thank you for booking with Spacall!",
                color: GREEN,
                trackable: false,
            },
            BookingStatus::Cancelled => StatusConfig {
                title: "Booking cancelled",
                subtitle: "This booking is no longer active.",
                color: RED,
                trackable: false,
            },
        }
    }
}

/// Display configuration for a raw status string; unrecognized values get the
/// pending configuration.
pub fn status_config(raw: &str) -> StatusConfig {
    StatusConfig::for_status(BookingStatus::parse(raw))
}

/// Position of `status` on [`PROGRESS_TRACK`]. Aliases share the step of the
/// status they stand in for; anything off the track is step 0.
pub fn progress_index(status: BookingStatus) -> usize {
    let on_track = match status {
        BookingStatus::Arrived => BookingStatus::OnWay,
        BookingStatus::InSession => BookingStatus::InProgress,
        other => other,
    };
    PROGRESS_TRACK
        .iter()
        .position(|s| *s == on_track)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIndicator {
    pub dots: [bool; 5],
    /// `bars[i]` connects dot `i` to dot `i + 1`.
    pub bars: [bool; 4],
}

impl StepIndicator {
    pub fn for_status(status: BookingStatus) -> Self {
        let index = progress_index(status);
        let mut dots = [false; 5];
        let mut bars = [false; 4];
        for (position, dot) in dots.iter_mut().enumerate() {
            *dot = index >= position;
        }
        for (i, bar) in bars.iter_mut().enumerate() {
            *bar = index > i;
        }
        Self { dots, bars }
    }
}
