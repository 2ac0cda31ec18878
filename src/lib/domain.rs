//! Domain modules

pub mod notifications;
pub mod reports;
