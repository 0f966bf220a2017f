use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::ports::{InsertOutcome, NewBooking};
use crate::schedule::{Holiday, RawSettings, ScheduleSettings};

use super::conflict::{check_conflict, now_ms, validate_customer, validate_span, ConflictCheck};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Insert a pending booking unless it collides with an active one.
    ///
    /// The conflict check, the WAL append and the in-memory insert all happen
    /// under the day's write lock; of two racing inserts for overlapping slots
    /// the second sees the first and gets `Conflict`.
    pub async fn insert_booking(&self, request: NewBooking) -> Result<InsertOutcome, EngineError> {
        validate_span(&request.span)?;
        validate_customer(&request.customer)?;
        let buffer = request.buffer_minutes.max(0);

        let _gate = self.commit_gate.read().await;
        let day = self.day_or_insert(request.date);
        let mut guard = day.write().await;
        if guard.active_count() >= MAX_BOOKINGS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many bookings on day"));
        }
        if guard.bookings.len() >= MAX_DAY_HISTORY {
            return Err(EngineError::LimitExceeded("day booking history full"));
        }

        let window = request.span.widen(buffer);
        if let ConflictCheck::Conflict(existing) =
            check_conflict(&request.span, guard.overlapping_active(&window), buffer)
        {
            debug!(
                tenant = %self.tenant_id,
                date = %request.date,
                slot = %request.span,
                %existing,
                "slot already taken"
            );
            return Ok(InsertOutcome::Conflict);
        }

        let id = Ulid::new();
        let event = Event::BookingPlaced {
            id,
            date: request.date,
            span: request.span,
            customer: request.customer,
            created_at: now_ms(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let booking = guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        Ok(InsertOutcome::Created(booking))
    }

    /// Move a booking along its status lifecycle. Setting the current status
    /// again is a no-op.
    pub async fn update_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self.resolve_booking_write(&id).await?;
        let current = guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                id,
                from: current.status,
                to: status,
            });
        }

        let event = Event::BookingStatusChanged {
            id,
            date: current.date,
            status,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(tenant = %self.tenant_id, booking = %id, from = %current.status, to = %status, "booking status changed");
        Ok(Booking { status, ..current })
    }

    /// Normalize raw settings from the settings editor and persist them.
    pub async fn update_settings(&self, raw: &RawSettings) -> Result<ScheduleSettings, EngineError> {
        let settings = ScheduleSettings::from_raw(raw);
        self.replace_settings(settings.clone()).await?;
        Ok(settings)
    }

    /// Persist already-normalized settings.
    pub async fn replace_settings(&self, settings: ScheduleSettings) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut config = self.config.write().await;
        let event = Event::SettingsUpdated { settings };
        self.persist_and_apply_config(&mut config, &event).await?;
        info!(tenant = %self.tenant_id, "schedule settings updated");
        Ok(())
    }

    pub async fn add_holiday(&self, date: NaiveDate, reason: Option<String>) -> Result<Holiday, EngineError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if reason.as_ref().is_some_and(|r| r.len() > MAX_NOTE_LEN) {
            return Err(EngineError::LimitExceeded("holiday reason too long"));
        }

        let _gate = self.commit_gate.read().await;
        let mut config = self.config.write().await;
        if config.holidays.len() >= MAX_HOLIDAYS {
            return Err(EngineError::LimitExceeded("too many holidays"));
        }

        let id = Ulid::new();
        let event = Event::HolidayAdded { id, date, reason: reason.clone() };
        self.persist_and_apply_config(&mut config, &event).await?;
        Ok(Holiday { id, date, reason })
    }

    pub async fn remove_holiday(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut config = self.config.write().await;
        if !config.holidays.iter().any(|h| h.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::HolidayRemoved { id };
        self.persist_and_apply_config(&mut config, &event).await
    }

    /// Rewrite the WAL with the minimal event sequence that recreates the
    /// current state. Terminal bookings are kept.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;

        let mut events = Vec::new();
        {
            let config = self.config.read().await;
            events.push(Event::SettingsUpdated {
                settings: config.settings.clone(),
            });
            for holiday in &config.holidays {
                events.push(Event::HolidayAdded {
                    id: holiday.id,
                    date: holiday.date,
                    reason: holiday.reason.clone(),
                });
            }
        }

        let mut days: Vec<_> = self.days.iter().map(|e| (*e.key(), e.value().clone())).collect();
        days.sort_by_key(|(date, _)| *date);
        for (_, day) in days {
            let guard = day.read().await;
            for booking in &guard.bookings {
                events.push(Event::BookingPlaced {
                    id: booking.id,
                    date: booking.date,
                    span: booking.span,
                    customer: booking.customer.clone(),
                    created_at: booking.created_at,
                });
                if booking.status != BookingStatus::Pending {
                    events.push(Event::BookingStatusChanged {
                        id: booking.id,
                        date: booking.date,
                        status: booking.status,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
