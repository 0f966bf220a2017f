//! Availability and booking-conflict engine for appointment scheduling.
//!
//! Turns a tenant's weekly hours, work days, vacations and holidays into a
//! grid of bookable slots, filters it against existing bookings, and admits
//! new bookings without ever double-booking a slot.

pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod ports;
pub mod schedule;
pub mod service;
pub mod tenant;
pub mod wal;
