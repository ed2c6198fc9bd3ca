use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitColor {
    #[default]
    Midnight,
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub color: HabitColor,
    pub days: BTreeSet<NaiveDate>,
    pub created_at: NaiveDateTime,
}

impl Habit {
    /// Title shown on the habit's reminders.
    pub fn title_text(&self) -> String {
        self.name.clone()
    }

    pub fn subtitle_text(&self) -> String {
        format!("Did you {} today?", lowercase_first(&self.name))
    }

    pub fn body_text(&self) -> String {
        match self.days.len() {
            1 => "Don't forget to mark it as done. 1 day in your current challenge.".to_string(),
            count => format!(
                "Don't forget to mark it as done. {} days in your current challenge.",
                count
            ),
        }
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Hour and minute of a reminder, before it is attached to a habit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FireTimeSpec {
    pub hour: u32,
    pub minute: u32,
}

impl FireTimeSpec {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn validate(self) -> Result<Self, StoreError> {
        if self.hour > 23 || self.minute > 59 {
            return Err(StoreError::InvalidFireTime {
                hour: self.hour,
                minute: self.minute,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FireTime {
    pub id: String,
    pub habit_id: String,
    pub hour: u32,
    pub minute: u32,
}

impl FireTime {
    pub fn new(habit_id: impl Into<String>, spec: FireTimeSpec) -> Result<Self, StoreError> {
        let spec = spec.validate()?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            habit_id: habit_id.into(),
            hour: spec.hour,
            minute: spec.minute,
        })
    }

    pub fn spec(&self) -> FireTimeSpec {
        FireTimeSpec::new(self.hour, self.minute)
    }

    /// Time of day of the reminder, `None` when hour or minute is out of range.
    pub fn time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        self.spec().validate().map(|_| ())
    }

    /// Next reminder instant for `habit` strictly after `now`.
    ///
    /// Prefers the habit's remaining challenge days and falls back to the next
    /// daily occurrence once the challenge is over.
    pub fn next_fire_date(&self, habit: &Habit, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let time = self.time()?;
        let date = habit
            .days
            .range(now.date()..)
            .map(|day| day.and_time(time))
            .find(|candidate| *candidate > now)
            .unwrap_or_else(|| next_daily_occurrence(time, now));
        Some(date)
    }
}

/// Next instant strictly after `after` whose time of day equals `time`.
pub fn next_daily_occurrence(time: NaiveTime, after: NaiveDateTime) -> NaiveDateTime {
    let today = after.date().and_time(time);
    if today > after {
        today
    } else {
        today + Duration::days(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitDraft {
    pub name: String,
    #[serde(default)]
    pub color: HabitColor,
    pub days: Vec<NaiveDate>,
    #[serde(default)]
    pub fire_times: Vec<FireTimeSpec>,
}

/// Fields to replace on an existing habit. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitChanges {
    pub name: Option<String>,
    pub color: Option<HabitColor>,
    pub days: Option<Vec<NaiveDate>>,
    pub fire_times: Option<Vec<FireTimeSpec>>,
}
