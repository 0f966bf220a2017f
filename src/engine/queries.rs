use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::schedule::{Holiday, ScheduleModel, ScheduleSettings};

use super::Engine;

impl Engine {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Snapshot of the current settings and holidays as an evaluable model.
    pub async fn schedule_model(&self) -> ScheduleModel {
        let config = self.config.read().await;
        ScheduleModel::new(config.settings.clone(), config.holidays.clone())
    }

    pub async fn settings(&self) -> ScheduleSettings {
        self.config.read().await.settings.clone()
    }

    /// Holidays ordered by date.
    pub async fn list_holidays(&self) -> Vec<Holiday> {
        let mut holidays = self.config.read().await.holidays.clone();
        holidays.sort_by_key(|h| h.date);
        holidays
    }

    /// Every booking of the day, any status, ordered by start.
    pub async fn list_bookings(&self, date: NaiveDate) -> Vec<Booking> {
        match self.get_day(&date) {
            Some(day) => day.read().await.bookings.clone(),
            None => Vec::new(),
        }
    }

    /// Pending and confirmed bookings of the day, ordered by start.
    pub async fn list_active_bookings(&self, date: NaiveDate) -> Vec<Booking> {
        match self.get_day(&date) {
            Some(day) => day.read().await.active().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let date = self.get_day_for_booking(&id)?;
        let day = self.get_day(&date)?;
        let guard = day.read().await;
        guard.bookings.iter().find(|b| b.id == id).cloned()
    }
}
