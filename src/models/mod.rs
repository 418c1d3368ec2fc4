pub mod booking;
pub mod coordinate;
pub mod service;
pub mod session;

pub use booking::{Booking, BookingLocation, BookingPatch, BookingStatus, NewBooking, PaymentMethod};
pub use coordinate::Coordinate;
pub use service::{Service, ServiceCategory};
pub use session::{Session, SessionUser, UserProfile, UserRole};
