use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::schedule::ScheduleSettings;

/// Unix milliseconds, used for audit timestamps only.
pub type Ms = i64;

/// Minutes since tenant-local midnight.
pub type Minutes = i32;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

/// Parse a `HH:MM` (or `HH:MM:SS` with zero seconds) clock string.
/// `24:00` is accepted as the end-of-day bound.
pub fn parse_clock(raw: &str) -> Option<Minutes> {
    let mut parts = raw.trim().split(':');
    let hours: Minutes = parts.next()?.trim().parse().ok()?;
    let minutes: Minutes = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next()
        && seconds.trim().parse::<u32>().ok()? != 0
    {
        return None;
    }
    if parts.next().is_some() || !(0..=24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    let total = hours * 60 + minutes;
    (0..=MINUTES_PER_DAY).contains(&total).then_some(total)
}

pub fn format_clock(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open clock interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Build a span from two clock strings. `None` unless both parse and `from < to`.
    pub fn parse(from: &str, to: &str) -> Option<Self> {
        let start = parse_clock(from)?;
        let end = parse_clock(to)?;
        (start < end).then(|| Self::new(start, end))
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Grow the span by `margin` minutes on both sides.
    pub fn widen(&self, margin: Minutes) -> Span {
        Span {
            start: self.start - margin,
            end: self.end + margin,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_clock(self.start), format_clock(self.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Declined,
    Cancelled,
}

impl BookingStatus {
    /// Pending and confirmed bookings hold their time; the rest are inert.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Declined) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub tenant_id: String,
    pub date: NaiveDate,
    pub span: Span,
    pub status: BookingStatus,
    pub customer: Customer,
    pub created_at: Ms,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// All bookings of one tenant on one calendar day, sorted by `span.start`.
#[derive(Debug, Clone)]
pub struct DayBook {
    pub date: NaiveDate,
    pub bookings: Vec<Booking>,
}

impl DayBook {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            bookings: Vec::new(),
        }
    }

    /// Insert maintaining sort order by start; equal starts keep insertion order.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(|b| b.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Active bookings whose span overlaps `query`.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping_active(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start && b.is_active())
    }
}

/// WAL record. Flat; one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SettingsUpdated {
        settings: ScheduleSettings,
    },
    HolidayAdded {
        id: Ulid,
        date: NaiveDate,
        reason: Option<String>,
    },
    HolidayRemoved {
        id: Ulid,
    },
    BookingPlaced {
        id: Ulid,
        date: NaiveDate,
        span: Span,
        customer: Customer,
        created_at: Ms,
    },
    BookingStatusChanged {
        id: Ulid,
        date: NaiveDate,
        status: BookingStatus,
    },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn span(from: &str, to: &str) -> Span {
        Span::parse(from, to).unwrap()
    }

    pub fn customer(name: &str) -> Customer {
        Customer {
            first_name: name.to_string(),
            last_name: "Tester".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            notes: None,
        }
    }

    pub fn booking(date_str: &str, from: &str, to: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            tenant_id: "salon".to_string(),
            date: date(date_str),
            span: span(from, to),
            status,
            customer: customer("Ada"),
            created_at: 0,
        }
    }
}
