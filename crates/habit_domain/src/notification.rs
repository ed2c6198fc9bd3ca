use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A scheduled-reminder instance for one fire time of a habit.
///
/// `user_notification_id` is the key of the matching pending request on the
/// notification backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub habit_id: String,
    pub fire_time_id: String,
    pub user_notification_id: Option<String>,
    pub fire_date: NaiveDateTime,
    #[serde(default)]
    pub was_executed: bool,
}

impl Notification {
    pub fn new(
        habit_id: impl Into<String>,
        fire_time_id: impl Into<String>,
        fire_date: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            habit_id: habit_id.into(),
            fire_time_id: fire_time_id.into(),
            user_notification_id: Some(uuid::Uuid::new_v4().to_string()),
            fire_date,
            was_executed: false,
        }
    }

    /// Returns the backend identifier, generating one first if the record has none.
    pub fn ensure_identifier(&mut self) -> &str {
        self.user_notification_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .as_str()
    }
}
