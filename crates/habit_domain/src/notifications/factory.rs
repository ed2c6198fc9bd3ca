use std::collections::BTreeMap;

use crate::{
    category::NotificationCategoryKind,
    habit::{FireTime, Habit},
};

use super::{
    scheduler::SchedulerError, CalendarTrigger, NotificationContent, NotificationOptions,
    NotificationSound,
};

/// Key under which the owning habit's id travels in the content's user info.
pub const HABIT_IDENTIFIER_KEY: &str = "habitIdentifier";

/// Builds the content and the repeating trigger for a fire time of `habit`.
pub fn make_notification_options(
    fire_time: &FireTime,
    habit: &Habit,
) -> Result<NotificationOptions, SchedulerError> {
    if fire_time.habit_id != habit.id {
        return Err(SchedulerError::HabitMismatch {
            fire_time_id: fire_time.id.clone(),
            habit_id: habit.id.clone(),
        });
    }
    if fire_time.time().is_none() {
        return Err(SchedulerError::InvalidFireTime {
            fire_time_id: fire_time.id.clone(),
            hour: fire_time.hour,
            minute: fire_time.minute,
        });
    }

    let mut user_info = BTreeMap::new();
    user_info.insert(HABIT_IDENTIFIER_KEY.to_string(), habit.id.clone());

    Ok(NotificationOptions {
        content: NotificationContent {
            title: habit.title_text(),
            subtitle: habit.subtitle_text(),
            body: habit.body_text(),
            user_info,
            category_identifier: NotificationCategoryKind::DayPrompt(None).identifier(),
            sound: NotificationSound::Default,
            badge: 1,
        },
        trigger: CalendarTrigger::daily(fire_time.hour, fire_time.minute),
    })
}
