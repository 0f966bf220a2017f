mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{available_slots, generate_slots, merge_overlapping, subtract_intervals};
pub use conflict::{check_conflict, filter_available, is_clear_of, ConflictCheck};
pub use error::EngineError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::schedule::{Holiday, ScheduleSettings};
use crate::wal::Wal;

pub type SharedDay = Arc<RwLock<DayBook>>;

/// Settings plus holidays of one tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantConfig {
    pub settings: ScheduleSettings,
    pub holidays: Vec<Holiday>,
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first append, drains whatever else is already queued,
/// then pays for one fsync and answers every sender in the batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut batch: Vec<(Event, oneshot::Sender<io::Result<()>>)> = Vec::new();
    while let Some(cmd) = rx.recv().await {
        let mut pending = Some(cmd);
        while let Some(cmd) = pending.take() {
            match cmd {
                WalCommand::Append { event, response } => {
                    batch.push((event, response));
                    if let Ok(next) = rx.try_recv() {
                        pending = Some(next);
                    }
                }
                other => {
                    // Flush what came before so ordering is preserved.
                    commit_batch(&mut wal, &mut batch);
                    handle_non_append(&mut wal, other);
                }
            }
        }
        commit_batch(&mut wal, &mut batch);
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    if batch.is_empty() {
        return;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Always flush, even after a failed append, so a half-written batch
    // does not leak into the next one.
    let flushed = wal.flush_sync();
    let result = result.and(flushed);

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Booking store of one tenant: settings, holidays and per-day booking books,
/// durably logged to its own WAL.
///
/// Every mutation of a day runs under that day's write lock and is applied in
/// memory only after its WAL append succeeded, so check-then-insert on a day
/// is a single critical section.
pub struct Engine {
    pub(super) tenant_id: String,
    pub(super) days: DashMap<NaiveDate, SharedDay>,
    pub(super) config: RwLock<TenantConfig>,
    /// Reverse lookup: booking id → day.
    pub(super) booking_to_day: DashMap<Ulid, NaiveDate>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Writers hold this shared; compaction holds it exclusively so no append
    /// can slip between its snapshot and the file swap. Taken before any day lock.
    pub(super) commit_gate: RwLock<()>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a booking event to its day (caller holds the day's lock).
fn apply_to_day(day: &mut DayBook, tenant_id: &str, event: &Event, index: &DashMap<Ulid, NaiveDate>) {
    match event {
        Event::BookingPlaced {
            id,
            date,
            span,
            customer,
            created_at,
        } => {
            day.insert_booking(Booking {
                id: *id,
                tenant_id: tenant_id.to_string(),
                date: *date,
                span: *span,
                status: BookingStatus::Pending,
                customer: customer.clone(),
                created_at: *created_at,
            });
            index.insert(*id, *date);
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(booking) = day.get_mut(*id) {
                booking.status = *status;
            }
        }
        Event::SettingsUpdated { .. } | Event::HolidayAdded { .. } | Event::HolidayRemoved { .. } => {}
    }
}

/// Apply a settings or holiday event (caller holds the config lock).
fn apply_to_config(config: &mut TenantConfig, event: &Event) {
    match event {
        Event::SettingsUpdated { settings } => config.settings = settings.clone(),
        Event::HolidayAdded { id, date, reason } => config.holidays.push(Holiday {
            id: *id,
            date: *date,
            reason: reason.clone(),
        }),
        Event::HolidayRemoved { id } => config.holidays.retain(|h| h.id != *id),
        Event::BookingPlaced { .. } | Event::BookingStatusChanged { .. } => {}
    }
}

/// The day a booking event belongs to; `None` for tenant-wide events.
fn event_day(event: &Event) -> Option<NaiveDate> {
    match event {
        Event::BookingPlaced { date, .. } | Event::BookingStatusChanged { date, .. } => Some(*date),
        Event::SettingsUpdated { .. } | Event::HolidayAdded { .. } | Event::HolidayRemoved { .. } => None,
    }
}

impl Engine {
    /// Open the tenant's WAL, replay it, and start the group-commit writer.
    /// Replay runs on the calling thread. Must be called inside a Tokio runtime.
    pub fn new(tenant_id: impl Into<String>, wal_path: PathBuf, notify: Arc<NotifyHub>) -> Result<Self, EngineError> {
        let (wal, events) = Wal::recover::<Event>(&wal_path)?;
        Ok(Self::from_replay(tenant_id.into(), wal, events, notify))
    }

    /// Like `new`, with WAL recovery moved to the blocking pool.
    pub async fn open(
        tenant_id: impl Into<String>,
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
    ) -> Result<Self, EngineError> {
        let (wal, events) = tokio::task::spawn_blocking(move || Wal::recover::<Event>(&wal_path))
            .await
            .map_err(|e| EngineError::WalError(format!("WAL recovery task failed: {e}")))??;
        Ok(Self::from_replay(tenant_id.into(), wal, events, notify))
    }

    fn from_replay(tenant_id: String, wal: Wal, events: Vec<Event>, notify: Arc<NotifyHub>) -> Self {
        // Replay into plain values; nothing is shared yet.
        let mut days: HashMap<NaiveDate, DayBook> = HashMap::new();
        let mut config = TenantConfig::default();
        let booking_to_day = DashMap::new();
        for event in &events {
            match event_day(event) {
                Some(date) => {
                    let day = days.entry(date).or_insert_with(|| DayBook::new(date));
                    apply_to_day(day, &tenant_id, event, &booking_to_day);
                }
                None => apply_to_config(&mut config, event),
            }
        }
        info!(
            tenant = %tenant_id,
            events = events.len(),
            days = days.len(),
            "replayed tenant WAL"
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Self {
            tenant_id,
            days: days
                .into_iter()
                .map(|(date, day)| (date, Arc::new(RwLock::new(day))))
                .collect(),
            config: RwLock::new(config),
            booking_to_day,
            wal_tx,
            commit_gate: RwLock::new(()),
            notify,
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_day(&self, date: &NaiveDate) -> Option<SharedDay> {
        self.days.get(date).map(|e| e.value().clone())
    }

    /// The day's book, created empty on first use.
    pub(super) fn day_or_insert(&self, date: NaiveDate) -> SharedDay {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayBook::new(date))))
            .value()
            .clone()
    }

    pub fn get_day_for_booking(&self, booking_id: &Ulid) -> Option<NaiveDate> {
        self.booking_to_day.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify for a booking event.
    pub(super) async fn persist_and_apply(&self, day: &mut DayBook, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_day(day, &self.tenant_id, event, &self.booking_to_day);
        self.notify.send(Some(day.date), event);
        Ok(())
    }

    /// WAL-append + apply + notify for a settings or holiday event.
    pub(super) async fn persist_and_apply_config(
        &self,
        config: &mut TenantConfig,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_config(config, event);
        self.notify.send(None, event);
        Ok(())
    }

    /// Lookup booking → day, acquire that day's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<DayBook>, EngineError> {
        let date = self
            .get_day_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let day = self
            .get_day(&date)
            .ok_or(EngineError::NotFound(*booking_id))?;
        Ok(day.write_owned().await)
    }
}
