use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Outcome of checking one proposed slot against existing bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictCheck {
    Free,
    /// Collides, directly or through the buffer, with this booking.
    Conflict(Ulid),
}

impl ConflictCheck {
    pub fn is_free(&self) -> bool {
        matches!(self, ConflictCheck::Free)
    }
}

/// The single availability predicate, shared by the read and write paths.
///
/// `booking` blocks `[start - buffer, end + buffer)`; `candidate` is clear when
/// it ends at or before that window opens, or starts at or after it closes.
pub fn is_clear_of(candidate: &Span, booking: &Span, buffer: Minutes) -> bool {
    candidate.end <= booking.start - buffer || candidate.start >= booking.end + buffer
}

/// Write path: check one proposed slot. Inert bookings are ignored.
pub fn check_conflict<'a, I>(proposed: &Span, existing: I, buffer: Minutes) -> ConflictCheck
where
    I: IntoIterator<Item = &'a Booking>,
{
    existing
        .into_iter()
        .filter(|b| b.is_active())
        .find(|b| !is_clear_of(proposed, &b.span, buffer))
        .map_or(ConflictCheck::Free, |b| ConflictCheck::Conflict(b.id))
}

/// Read path: keep the candidates `check_conflict` would accept.
pub fn filter_available(candidates: &[Span], existing: &[Booking], buffer: Minutes) -> Vec<Span> {
    candidates
        .iter()
        .filter(|c| check_conflict(c, existing, buffer).is_free())
        .copied()
        .collect()
}

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

/// Bookings are same-day; no cross-midnight spans.
pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < 0 || span.end > MINUTES_PER_DAY || span.start >= span.end {
        return Err(EngineError::LimitExceeded("booking must lie within one day"));
    }
    Ok(())
}

pub(crate) fn validate_customer(customer: &Customer) -> Result<(), EngineError> {
    let fields = [
        Some(&customer.first_name),
        Some(&customer.last_name),
        Some(&customer.email),
        customer.phone.as_ref(),
    ];
    if fields.into_iter().flatten().any(|f| f.len() > MAX_FIELD_LEN) {
        return Err(EngineError::LimitExceeded("customer field too long"));
    }
    if customer.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTE_LEN) {
        return Err(EngineError::LimitExceeded("booking notes too long"));
    }
    Ok(())
}
