use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;
use ulid::Ulid;

use crate::compactor;
use crate::config::Config;
use crate::engine::{Engine, EngineError};
use crate::limits::*;
use crate::model::{Booking, BookingStatus};
use crate::notify::NotifyHub;
use crate::ports::{BookingRepository, InsertOutcome, NewBooking, SettingsProvider};
use crate::schedule::ScheduleModel;

/// Tenant names are used verbatim as WAL file stems: `[A-Za-z0-9_-]+`.
fn validate_tenant_name(tenant: &str) -> Result<(), EngineError> {
    if tenant.is_empty() {
        return Err(EngineError::InvalidTenant("empty tenant name"));
    }
    if tenant.len() > MAX_TENANT_NAME_LEN {
        return Err(EngineError::InvalidTenant("tenant name too long"));
    }
    if !tenant
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(EngineError::InvalidTenant(
            "tenant name may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// Manages per-tenant engines. Each tenant gets its own Engine, WAL and
/// compactor, opened on first use.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    compact_interval: Duration,
    /// Serializes engine creation so a WAL is never opened twice.
    creating: Mutex<()>,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, compact_interval: Duration) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            compact_interval,
            creating: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir.clone(), config.compact_threshold, config.compact_interval)
    }

    /// Get or lazily create the engine of `tenant`. The first call for a
    /// tenant replays its WAL on the blocking pool.
    pub async fn get_or_create(&self, tenant: &str) -> Result<Arc<Engine>, EngineError> {
        validate_tenant_name(tenant)?;
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }

        let _creating = self.creating.lock().await;
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(EngineError::LimitExceeded("too many tenants"));
        }

        let wal_path = self.data_dir.join(format!("{tenant}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::open(tenant, wal_path, notify).await?);

        tokio::spawn(compactor::run_compactor(
            Arc::downgrade(&engine),
            self.compact_threshold,
            self.compact_interval,
        ));

        self.engines.insert(tenant.to_string(), engine.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!(tenant, "opened tenant");
        Ok(engine)
    }
}

#[async_trait]
impl SettingsProvider for TenantManager {
    async fn load_schedule_model(&self, tenant_id: &str) -> Result<ScheduleModel, EngineError> {
        Ok(self.get_or_create(tenant_id).await?.schedule_model().await)
    }
}

#[async_trait]
impl BookingRepository for TenantManager {
    async fn list_active_bookings(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        Ok(self.get_or_create(tenant_id).await?.list_active_bookings(date).await)
    }

    async fn insert_booking(&self, tenant_id: &str, booking: NewBooking) -> Result<InsertOutcome, EngineError> {
        self.get_or_create(tenant_id).await?.insert_booking(booking).await
    }

    async fn list_bookings(&self, tenant_id: &str, date: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        Ok(self.get_or_create(tenant_id).await?.list_bookings(date).await)
    }

    async fn get_booking(&self, tenant_id: &str, id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.get_or_create(tenant_id).await?.get_booking(id).await)
    }

    async fn update_status(&self, tenant_id: &str, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        self.get_or_create(tenant_id).await?.update_status(id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotwise_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> TenantManager {
        TenantManager::new(dir, 1000, Duration::from_secs(60))
    }

    fn monday_booking(from: &str, to: &str) -> NewBooking {
        NewBooking {
            date: date("2024-06-03"),
            span: span(from, to),
            buffer_minutes: 0,
            customer: customer("Ada"),
        }
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let tm = manager(test_data_dir("isolation"));

        let outcome = tm.insert_booking("salon_a", monday_booking("10:00", "10:30")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));

        // Same slot in another tenant is free.
        let outcome = tm.insert_booking("salon_b", monday_booking("10:00", "10:30")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));

        assert_eq!(tm.list_active_bookings("salon_a", date("2024-06-03")).await.unwrap().len(), 1);
        assert_eq!(tm.list_active_bookings("salon_b", date("2024-06-03")).await.unwrap().len(), 1);

        let InsertOutcome::Created(a) = tm.insert_booking("salon_a", monday_booking("11:00", "11:30")).await.unwrap() else {
            panic!("expected created");
        };
        assert!(tm.get_booking("salon_b", a.id).await.unwrap().is_none());
        assert!(matches!(
            tm.update_status("salon_b", a.id, BookingStatus::Confirmed).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = manager(dir.clone());

        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        let _engine = tm.get_or_create("my_salon").await.unwrap();
        assert!(dir.join("my_salon.wal").exists());
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let tm = manager(test_data_dir("same_engine"));
        let first = tm.get_or_create("foo").await.unwrap();
        let second = tm.get_or_create("foo").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn tenant_name_rejects_unsafe_characters() {
        let dir = test_data_dir("names");
        let tm = manager(dir.clone());

        for name in ["../evil", "../..", "studio.one", "salon a", "café", ""] {
            assert!(
                matches!(tm.get_or_create(name).await, Err(EngineError::InvalidTenant(_))),
                "{name:?} should be rejected"
            );
        }
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        let engine = tm.get_or_create("Studio-one_2").await.unwrap();
        assert_eq!(engine.tenant_id(), "Studio-one_2");
        assert!(dir.join("Studio-one_2.wal").exists());
    }

    #[tokio::test]
    async fn similar_names_are_distinct_tenants() {
        let tm = manager(test_data_dir("similar_names"));
        let outcome = tm.insert_booking("studioone", monday_booking("10:00", "10:30")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));
        assert!(matches!(
            tm.insert_booking("studio.one", monday_booking("10:00", "10:30")).await,
            Err(EngineError::InvalidTenant(_))
        ));
        let outcome = tm.insert_booking("studio-one", monday_booking("10:00", "10:30")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let tm = manager(test_data_dir("name_too_long"));
        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).await.err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let tm = manager(test_data_dir("count_limit"));
        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).await.unwrap();
        }
        let err = tm.get_or_create("one_more").await.err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
        // Existing tenants stay reachable at the limit.
        assert!(tm.get_or_create("t0").await.is_ok());
    }

    #[tokio::test]
    async fn fresh_tenant_uses_default_template() {
        let tm = manager(test_data_dir("default_template"));
        let model = tm.load_schedule_model("new_salon").await.unwrap();
        assert_eq!(model, ScheduleModel::default());
    }

    #[tokio::test]
    async fn reopening_restores_bookings() {
        let dir = test_data_dir("reopen");
        let id = {
            let tm = manager(dir.clone());
            let InsertOutcome::Created(b) = tm.insert_booking("salon", monday_booking("09:00", "09:30")).await.unwrap() else {
                panic!("expected created");
            };
            tm.update_status("salon", b.id, BookingStatus::Confirmed).await.unwrap();
            b.id
        };

        let tm = manager(dir);
        let restored = tm.get_booking("salon", id).await.unwrap().unwrap();
        assert_eq!(restored.status, BookingStatus::Confirmed);
        assert_eq!(restored.tenant_id, "salon");
    }
}
