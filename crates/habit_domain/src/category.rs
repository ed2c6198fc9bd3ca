use serde::{Deserialize, Serialize};

const DAY_PROMPT: &str = "DAY_PROMPT";

/// Semantic kinds of reminders, grouped by the backend for presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationCategoryKind {
    /// Asks whether the habit was done today. Without a habit id this is the
    /// generic category shared by every habit.
    DayPrompt(Option<String>),
}

impl NotificationCategoryKind {
    pub fn identifier(&self) -> String {
        match self {
            Self::DayPrompt(None) => DAY_PROMPT.to_string(),
            Self::DayPrompt(Some(habit_id)) => format!("{DAY_PROMPT}-{habit_id}"),
        }
    }
}
