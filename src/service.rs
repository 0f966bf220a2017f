use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::engine::{available_slots, check_conflict, generate_slots, ConflictCheck, EngineError};
use crate::limits::MAX_QUERY_DAYS;
use crate::model::{Booking, BookingStatus, Customer, Span};
use crate::observability::{self, admission_label};
use crate::ports::{BookingRepository, InsertOutcome, NewBooking, SettingsProvider};

/// Result of a booking attempt. Both rejections are expected outcomes the
/// caller answers by re-fetching availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Created(Booking),
    /// An active booking is in the way, found before or at the write.
    SlotTaken,
    /// The requested times are not a slot the tenant currently offers.
    InvalidSlot,
}

/// A customer's pick, as submitted: clock strings of one offered slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub customer: Customer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<Span>,
}

/// Read path and booking admission over the two collaborator contracts.
#[derive(Clone)]
pub struct BookingService {
    settings: Arc<dyn SettingsProvider>,
    bookings: Arc<dyn BookingRepository>,
}

impl BookingService {
    pub fn new(settings: Arc<dyn SettingsProvider>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { settings, bookings }
    }

    /// Free slots of `date`, chronological.
    pub async fn available_slots(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Span>, EngineError> {
        let model = self.settings.load_schedule_model(tenant_id).await?;
        let existing = self.bookings.list_active_bookings(tenant_id, date).await?;
        metrics::counter!(observability::SLOT_QUERIES_TOTAL).increment(1);
        Ok(available_slots(date, &model, &existing))
    }

    /// Days in `[from, to]` with at least one free slot. An inverted window is
    /// empty; one longer than `MAX_QUERY_DAYS` is rejected.
    pub async fn availability_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayAvailability>, EngineError> {
        if to < from {
            return Ok(Vec::new());
        }
        if to.signed_duration_since(from).num_days() >= MAX_QUERY_DAYS {
            return Err(EngineError::LimitExceeded("availability window too long"));
        }

        let model = self.settings.load_schedule_model(tenant_id).await?;
        let mut days = Vec::new();
        let mut date = from;
        while date <= to {
            let candidates = generate_slots(date, &model);
            if !candidates.is_empty() {
                let existing = self.bookings.list_active_bookings(tenant_id, date).await?;
                metrics::counter!(observability::SLOT_QUERIES_TOTAL).increment(1);
                let slots = available_slots(date, &model, &existing);
                if !slots.is_empty() {
                    days.push(DayAvailability { date, slots });
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(days)
    }

    /// Admit a booking for one offered slot, in `pending` status.
    ///
    /// The pre-check against the current bookings only saves a write; the
    /// repository re-checks inside its critical section and that answer wins.
    pub async fn create_booking(&self, tenant_id: &str, request: BookingRequest) -> Result<Admission, EngineError> {
        let started = Instant::now();
        let outcome = self.admit(tenant_id, request).await?;

        let label = admission_label(&outcome);
        metrics::counter!(observability::ADMISSIONS_TOTAL, "outcome" => label).increment(1);
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match &outcome {
            Admission::Created(booking) => info!(
                tenant = tenant_id,
                booking = %booking.id,
                date = %booking.date,
                slot = %booking.span,
                "booking created"
            ),
            rejected => info!(
                tenant = tenant_id,
                outcome = admission_label(rejected),
                "booking rejected"
            ),
        }
        Ok(outcome)
    }

    async fn admit(&self, tenant_id: &str, request: BookingRequest) -> Result<Admission, EngineError> {
        let Some(span) = Span::parse(&request.start_time, &request.end_time) else {
            debug!(start = %request.start_time, end = %request.end_time, "unparseable slot times");
            return Ok(Admission::InvalidSlot);
        };

        let model = self.settings.load_schedule_model(tenant_id).await?;
        if !generate_slots(request.date, &model).contains(&span) {
            return Ok(Admission::InvalidSlot);
        }
        let buffer = model.policy.buffer_minutes;

        let existing = self.bookings.list_active_bookings(tenant_id, request.date).await?;
        if let ConflictCheck::Conflict(blocking) = check_conflict(&span, &existing, buffer) {
            debug!(tenant = tenant_id, %blocking, "slot taken before write");
            return Ok(Admission::SlotTaken);
        }

        let new_booking = NewBooking {
            date: request.date,
            span,
            buffer_minutes: buffer,
            customer: request.customer,
        };
        match self.bookings.insert_booking(tenant_id, new_booking).await? {
            InsertOutcome::Created(booking) => Ok(Admission::Created(booking)),
            InsertOutcome::Conflict => Ok(Admission::SlotTaken),
        }
    }

    pub async fn confirm(&self, tenant_id: &str, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(tenant_id, id, BookingStatus::Confirmed).await
    }

    pub async fn decline(&self, tenant_id: &str, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(tenant_id, id, BookingStatus::Declined).await
    }

    pub async fn cancel(&self, tenant_id: &str, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(tenant_id, id, BookingStatus::Cancelled).await
    }

    async fn set_status(&self, tenant_id: &str, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        let booking = self.bookings.update_status(tenant_id, id, status).await?;
        metrics::counter!(observability::STATUS_CHANGES_TOTAL, "status" => status.to_string()).increment(1);
        Ok(booking)
    }

    /// All bookings of a day, any status, ordered by start.
    pub async fn list_bookings(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        self.bookings.list_bookings(tenant_id, date).await
    }

    pub async fn get_booking(&self, tenant_id: &str, id: Ulid) -> Result<Option<Booking>, EngineError> {
        self.bookings.get_booking(tenant_id, id).await
    }
}
