use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Booking, BookingStatus, Customer, Minutes, Span};
use crate::schedule::ScheduleModel;

/// A booking to store if, and only if, nothing active is in its way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub date: NaiveDate,
    pub span: Span,
    /// Margin applied around existing bookings when checking for overlap.
    pub buffer_minutes: Minutes,
    pub customer: Customer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Booking),
    /// An active booking already covers part of the buffered slot.
    Conflict,
}

/// Source of a tenant's current schedule configuration.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn load_schedule_model(&self, tenant_id: &str) -> Result<ScheduleModel, EngineError>;
}

/// Durable booking storage.
///
/// `insert_booking` must be atomic per `(tenant, date)`: the overlap check and
/// the write happen as one step, using the same predicate as the read path.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list_active_bookings(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Booking>, EngineError>;

    async fn insert_booking(&self, tenant_id: &str, booking: NewBooking) -> Result<InsertOutcome, EngineError>;

    async fn list_bookings(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Booking>, EngineError>;

    async fn get_booking(&self, tenant_id: &str, id: Ulid) -> Result<Option<Booking>, EngineError>;

    async fn update_status(&self, tenant_id: &str, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError>;
}
