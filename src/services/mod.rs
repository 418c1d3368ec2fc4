pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod lifecycle;
pub mod proximity;
pub mod status;
pub mod tracking;
