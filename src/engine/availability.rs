use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::*;
use crate::schedule::ScheduleModel;

use super::conflict::filter_available;

// ── Slot generation ───────────────────────────────────────────────

/// Candidate slots for `date`, in chronological order.
///
/// Empty when the date is a holiday or inside a vacation, when its weekday is
/// not a work day, or when it has no opening ranges. Each range is cut into
/// `slot_minutes` pieces starting at its `from`; a trailing remainder shorter
/// than a slot is dropped. The grid steps by the slot length only, so it does
/// not depend on existing bookings. Ranges may arrive unsorted or overlapping;
/// a start produced twice is kept once.
pub fn generate_slots(date: NaiveDate, model: &ScheduleModel) -> Vec<Span> {
    if model.is_day_off(date) {
        return Vec::new();
    }
    let ranges = model.opening_ranges(date);
    if ranges.is_empty() {
        return Vec::new();
    }

    let step = model.policy.slot_minutes;
    if step <= 0 {
        return Vec::new();
    }

    let mut ranges = ranges.to_vec();
    ranges.sort_by_key(|r| r.start);

    let mut seen_starts = HashSet::new();
    let mut slots = Vec::new();
    for range in &ranges {
        let mut cursor = range.start;
        while cursor + step <= range.end {
            if seen_starts.insert(cursor) {
                slots.push(Span::new(cursor, cursor + step));
            }
            cursor += step;
        }
    }

    // Overlapping ranges can interleave; stable sort keeps first-seen order per start.
    slots.sort_by_key(|s| s.start);
    slots
}

/// Read path: candidate slots for `date` minus those blocked by `bookings`.
pub fn available_slots(date: NaiveDate, model: &ScheduleModel, bookings: &[Booking]) -> Vec<Span> {
    let candidates = generate_slots(date, model);
    filter_available(&candidates, bookings, model.policy.buffer_minutes)
}

// ── Interval helpers ──────────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Remove `to_remove` (sorted, disjoint) from `base` (sorted).
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(Span::new(current_start, b.end));
        }
    }

    result
}
