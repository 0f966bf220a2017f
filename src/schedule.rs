//! Tenant schedule configuration: the typed Schedule Model and the
//! normalization that turns loosely-shaped tenant settings into it.
//!
//! Normalization never fails. Entries that cannot be understood are dropped
//! and logged at `debug`; the tenant sees reduced availability, not an error.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use ulid::Ulid;

use crate::engine::{merge_overlapping, subtract_intervals};
use crate::limits::*;
use crate::model::{MINUTES_PER_DAY, Minutes, Span};

/// Weekday number in the tenant-local calendar week, 0 = Sunday.
pub type Weekday = u8;

pub const DEFAULT_SLOT_MINUTES: Minutes = 30;
pub const DEFAULT_BUFFER_MINUTES: Minutes = 0;

pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday().num_days_from_sunday() as Weekday
}

/// Parse a `YYYY-MM-DD` date, also accepting an ISO timestamp's date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.split_once('T').map_or(raw, |(d, _)| d);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ── Schedule Model types ─────────────────────────────────────────

/// Opening ranges per weekday. A missing day or an empty list means closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyHours(BTreeMap<Weekday, Vec<Span>>);

impl WeeklyHours {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, day: Weekday, ranges: Vec<Span>) {
        self.0.insert(day, ranges);
    }

    pub fn ranges(&self, day: Weekday) -> &[Span] {
        self.0.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no weekday has a single range.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDays(BTreeSet<Weekday>);

impl WorkDays {
    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Weekday> for WorkDays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|d| *d <= 6).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPolicy {
    /// Length of one bookable unit. Always > 0.
    pub slot_minutes: Minutes,
    /// Idle time kept clear on both sides of every active booking. Always >= 0.
    pub buffer_minutes: Minutes,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
        }
    }
}

/// Closed day range, inclusive on both ends. `end: None` means a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub note: Option<String>,
}

impl VacationRange {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end.unwrap_or(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Ulid,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// Normalized tenant settings as persisted. Holidays are administered separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub weekly_hours: WeeklyHours,
    pub work_days: WorkDays,
    pub policy: SlotPolicy,
    pub vacations: Vec<VacationRange>,
}

impl ScheduleSettings {
    pub fn from_raw(raw: &RawSettings) -> Self {
        Self {
            weekly_hours: normalize_weekly_hours(&raw.hours),
            work_days: normalize_work_days(&raw.work_days),
            policy: normalize_slot_policy(&raw.slot_minutes, &raw.buffer_minutes),
            vacations: normalize_vacation_ranges(&raw.vacations),
        }
    }
}

/// Tenant settings exactly as the settings editor submits them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSettings {
    pub slot_minutes: Value,
    pub buffer_minutes: Value,
    pub hours: Value,
    pub work_days: Value,
    pub vacations: Value,
}

/// Everything the slot generator needs for one tenant, snapshotted per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleModel {
    pub weekly_hours: WeeklyHours,
    pub work_days: WorkDays,
    pub policy: SlotPolicy,
    pub vacations: Vec<VacationRange>,
    pub holidays: Vec<Holiday>,
}

impl ScheduleModel {
    /// Compose settings and holidays. Empty hours or empty work days fall back
    /// to the built-in template independently, so a fresh tenant is bookable.
    pub fn new(settings: ScheduleSettings, holidays: Vec<Holiday>) -> Self {
        let weekly_hours = if settings.weekly_hours.is_empty() {
            default_weekly_hours()
        } else {
            settings.weekly_hours
        };
        let work_days = if settings.work_days.is_empty() {
            default_work_days()
        } else {
            settings.work_days
        };
        Self {
            weekly_hours,
            work_days,
            policy: settings.policy,
            vacations: settings.vacations,
            holidays,
        }
    }

    /// Vacation or holiday.
    pub fn is_day_off(&self, date: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.date == date) || self.vacations.iter().any(|v| v.covers(date))
    }

    /// Opening ranges for the weekday of `date`, empty unless it is a work day.
    pub fn opening_ranges(&self, date: NaiveDate) -> &[Span] {
        let day = weekday_of(date);
        if !self.work_days.contains(day) {
            return &[];
        }
        self.weekly_hours.ranges(day)
    }
}

impl Default for ScheduleModel {
    fn default() -> Self {
        Self::new(ScheduleSettings::default(), Vec::new())
    }
}

/// Mon–Thu 09:00–17:00, Fri 09:00–15:00.
pub fn default_weekly_hours() -> WeeklyHours {
    let mut hours = WeeklyHours::new();
    for day in 1..=4 {
        hours.set(day, vec![Span::new(9 * 60, 17 * 60)]);
    }
    hours.set(5, vec![Span::new(9 * 60, 15 * 60)]);
    hours
}

pub fn default_work_days() -> WorkDays {
    (1..=5).collect()
}

// ── Normalization ────────────────────────────────────────────────

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_ascii_lowercase().as_str() {
        "sun" | "sunday" | "so" | "sonntag" => 0,
        "mon" | "monday" | "mo" | "montag" => 1,
        "tue" | "tues" | "tuesday" | "di" | "dienstag" => 2,
        "wed" | "wednesday" | "mi" | "mittwoch" => 3,
        "thu" | "thur" | "thurs" | "thursday" | "do" | "donnerstag" => 4,
        "fri" | "friday" | "fr" | "freitag" => 5,
        "sat" | "saturday" | "sa" | "samstag" => 6,
        _ => return None,
    };
    Some(day)
}

/// Weekday from a numeric key (`"3"`) or a day name (`"wed"`, `"Mi"`).
fn weekday_key(raw: &str) -> Option<Weekday> {
    match raw.trim().parse::<i64>() {
        Ok(n) => (0..=6).contains(&n).then_some(n as Weekday),
        Err(_) => weekday_from_name(raw),
    }
}

fn weekday_value(value: &Value) -> Option<Weekday> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|n| (0..=6).contains(n))
            .map(|n| n as Weekday),
        Value::String(s) => weekday_key(s),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A single range: `{from, to}`, `{start, end}` or `["09:00", "12:00"]`.
fn range_from_value(value: &Value) -> Option<Span> {
    let (from, to) = match value {
        Value::Object(obj) => (
            obj.get("from").or_else(|| obj.get("start"))?.as_str()?,
            obj.get("to").or_else(|| obj.get("end"))?.as_str()?,
        ),
        Value::Array(pair) if pair.len() == 2 => (pair[0].as_str()?, pair[1].as_str()?),
        _ => return None,
    };
    let span = Span::parse(from, to);
    if span.is_none() {
        debug!("dropping malformed opening range {from:?}..{to:?}");
    }
    span
}

fn ranges_from_list(items: &[Value]) -> Vec<Span> {
    items.iter().filter_map(range_from_value).collect()
}

/// Ranges for one day: a plain list, `{open: [[from, to]]}` or `{closed, ranges}`.
fn day_ranges(value: &Value) -> Vec<Span> {
    match value {
        Value::Array(items) => ranges_from_list(items),
        Value::Object(obj) => {
            if obj.get("closed").and_then(Value::as_bool) == Some(true) {
                return Vec::new();
            }
            match obj.get("open").or_else(|| obj.get("ranges")) {
                Some(Value::Array(items)) => ranges_from_list(items),
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// One entry of the list form: `{day, enabled, open, close, breaks}`.
/// Breaks are cut out of the opening range.
fn business_hour_entry(entry: &Value) -> Option<(Weekday, Vec<Span>)> {
    let obj = entry.as_object()?;
    let day = obj.get("day").and_then(weekday_value)?;
    if obj.get("enabled").and_then(Value::as_bool) == Some(false) {
        return Some((day, Vec::new()));
    }
    let open = obj.get("open")?.as_str()?;
    let close = obj.get("close")?.as_str()?;
    let Some(range) = Span::parse(open, close) else {
        debug!("dropping malformed business hours for day {day}: {open:?}..{close:?}");
        return Some((day, Vec::new()));
    };
    let mut breaks = match obj.get("breaks") {
        Some(Value::Array(items)) => ranges_from_list(items),
        _ => Vec::new(),
    };
    breaks.sort_by_key(|b| b.start);
    let breaks = merge_overlapping(&breaks);
    Some((day, subtract_intervals(&[range], &breaks)))
}

fn cap_ranges(day: Weekday, mut ranges: Vec<Span>) -> Vec<Span> {
    if ranges.len() > MAX_RANGES_PER_DAY {
        debug!("day {day}: keeping first {MAX_RANGES_PER_DAY} of {} ranges", ranges.len());
        ranges.truncate(MAX_RANGES_PER_DAY);
    }
    ranges
}

/// Normalize weekly opening hours. Accepts an object keyed by weekday number
/// or name, or a list of business-hour entries. Overlapping ranges are kept
/// as given; the slot generator tolerates them.
pub fn normalize_weekly_hours(raw: &Value) -> WeeklyHours {
    let mut per_day: BTreeMap<Weekday, Vec<Span>> = BTreeMap::new();
    match raw {
        Value::Object(obj) => {
            for (key, value) in obj {
                let Some(day) = weekday_key(key) else {
                    debug!("dropping opening hours under unknown weekday key {key:?}");
                    continue;
                };
                per_day.entry(day).or_default().extend(day_ranges(value));
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                match business_hour_entry(entry) {
                    Some((day, ranges)) => per_day.entry(day).or_default().extend(ranges),
                    None => debug!("dropping malformed business hours entry {entry}"),
                }
            }
        }
        Value::Null => {}
        other => debug!("ignoring opening hours of unexpected shape: {other}"),
    }

    let mut hours = WeeklyHours::new();
    for (day, ranges) in per_day {
        hours.set(day, cap_ranges(day, ranges));
    }
    hours
}

pub fn normalize_work_days(raw: &Value) -> WorkDays {
    let Value::Array(items) = raw else {
        return WorkDays::default();
    };
    items
        .iter()
        .filter_map(|item| {
            let day = weekday_value(item);
            if day.is_none() {
                debug!("dropping invalid work day {item}");
            }
            day
        })
        .collect()
}

pub fn normalize_vacation_ranges(raw: &Value) -> Vec<VacationRange> {
    let Value::Array(items) = raw else {
        return Vec::new();
    };
    let mut ranges: Vec<VacationRange> = items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let Some(start) = obj.get("start").and_then(Value::as_str).and_then(parse_date) else {
                debug!("dropping vacation range without a valid start: {item}");
                return None;
            };
            let end = obj.get("end").and_then(Value::as_str).and_then(parse_date);
            let note = obj
                .get("note")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| n.chars().take(MAX_NOTE_LEN).collect());
            Some(VacationRange { start, end, note })
        })
        .collect();
    ranges.truncate(MAX_VACATIONS);
    ranges
}

/// Missing or non-positive slot length falls back to the default; a missing
/// or negative buffer means no buffer. Both are clamped to one day.
pub fn normalize_slot_policy(slot: &Value, buffer: &Value) -> SlotPolicy {
    let slot_minutes = integer_value(slot)
        .filter(|n| *n > 0)
        .map_or(DEFAULT_SLOT_MINUTES, |n| n.min(MINUTES_PER_DAY as i64) as Minutes);
    let buffer_minutes = integer_value(buffer)
        .filter(|n| *n >= 0)
        .map_or(DEFAULT_BUFFER_MINUTES, |n| n.min(MINUTES_PER_DAY as i64) as Minutes);
    SlotPolicy {
        slot_minutes,
        buffer_minutes,
    }
}
