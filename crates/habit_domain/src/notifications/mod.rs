pub mod factory;
pub mod memory;
pub mod scheduler;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::habit::next_daily_occurrence;

pub use factory::{make_notification_options, HABIT_IDENTIFIER_KEY};
pub use memory::InMemoryNotificationCenter;
pub use scheduler::{
    HabitRecords, NotificationScheduler, ScheduleFailure, ScheduleReport, SchedulerError,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationSound {
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub user_info: BTreeMap<String, String>,
    pub category_identifier: String,
    pub sound: NotificationSound,
    pub badge: u32,
}

/// Calendar based trigger matching a time of day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarTrigger {
    pub hour: u32,
    pub minute: u32,
    pub repeats: bool,
}

impl CalendarTrigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            repeats: true,
        }
    }

    /// Next instant after `after` at which the trigger fires.
    pub fn next_trigger_date(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        Some(next_daily_occurrence(time, after))
    }
}

/// Content and trigger pair ready to be handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationOptions {
    pub content: NotificationContent,
    pub trigger: CalendarTrigger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: CalendarTrigger,
}

impl PendingRequest {
    pub fn habit_identifier(&self) -> Option<&str> {
        self.content
            .user_info
            .get(HABIT_IDENTIFIER_KEY)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("notifications are not authorized")]
    AuthorizationDenied,
    #[error("pending notification limit of {limit} reached")]
    ResourceLimitExceeded { limit: usize },
}

/// Platform-specific notification centers implement this trait.
///
/// `add` replaces any pending request with the same identifier. `remove_pending`
/// ignores identifiers it does not know.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn add(&self, request: PendingRequest) -> Result<(), BackendError>;
    async fn remove_pending(&self, identifiers: &[String]);
    async fn pending_requests(&self) -> Vec<PendingRequest>;
}
