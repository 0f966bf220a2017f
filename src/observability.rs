use crate::service::Admission;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking admissions. Labels: outcome.
pub const ADMISSIONS_TOTAL: &str = "slotwise_admissions_total";

/// Histogram: admission latency in seconds.
pub const ADMISSION_DURATION_SECONDS: &str = "slotwise_admission_duration_seconds";

/// Counter: availability queries (one per evaluated day).
pub const SLOT_QUERIES_TOTAL: &str = "slotwise_slot_queries_total";

/// Counter: staff status changes. Labels: status.
pub const STATUS_CHANGES_TOTAL: &str = "slotwise_status_changes_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "slotwise_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotwise_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotwise_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const COMPACTIONS_TOTAL: &str = "slotwise_compactions_total";

/// Install a fmt subscriber honoring `RUST_LOG`. Safe to call more than once;
/// later calls and hosts with their own subscriber are left alone.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Short label for an admission outcome.
pub fn admission_label(outcome: &Admission) -> &'static str {
    match outcome {
        Admission::Created(_) => "created",
        Admission::SlotTaken => "slot_taken",
        Admission::InvalidSlot => "invalid_slot",
    }
}
