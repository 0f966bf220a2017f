use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Change feed of one tenant: every committed event goes to the tenant-wide
/// channel, booking events also to the channel of their day.
pub struct NotifyHub {
    all: broadcast::Sender<Event>,
    days: DashMap<NaiveDate, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            all: broadcast::channel(CHANNEL_CAPACITY).0,
            days: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.all.subscribe()
    }

    /// Subscribe to booking changes of one day. Creates the channel if needed.
    pub fn subscribe_day(&self, date: NaiveDate) -> broadcast::Receiver<Event> {
        self.days
            .entry(date)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op when nobody is listening.
    pub fn send(&self, date: Option<NaiveDate>, event: &Event) {
        let _ = self.all.send(event.clone());
        if let Some(date) = date {
            let stale = match self.days.get(&date) {
                Some(sender) => sender.send(event.clone()).is_err(),
                None => false,
            };
            if stale {
                self.days.remove_if(&date, |_, sender| sender.receiver_count() == 0);
            }
        }
    }
}
