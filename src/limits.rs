/// Maximum tenants loaded per process.
pub const MAX_TENANTS: usize = 256;

pub const MAX_TENANT_NAME_LEN: usize = 128;

/// Pending plus confirmed bookings on a single day.
pub const MAX_BOOKINGS_PER_DAY: usize = 2048;

/// All bookings a day keeps in memory, declined and cancelled included.
pub const MAX_DAY_HISTORY: usize = 16_384;

/// Upper bound for customer name, email and phone fields.
pub const MAX_FIELD_LEN: usize = 256;

/// Upper bound for free-text notes (bookings, vacations, holiday reasons).
pub const MAX_NOTE_LEN: usize = 2048;

pub const MAX_RANGES_PER_DAY: usize = 16;

pub const MAX_VACATIONS: usize = 256;

pub const MAX_HOLIDAYS: usize = 1024;

/// Widest date window for multi-day availability queries.
pub const MAX_QUERY_DAYS: i64 = 92;
