use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::StoreError,
    habit::{FireTime, FireTimeSpec, Habit, HabitChanges, HabitDraft},
    notification::Notification,
    notifications::HabitRecords,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    habits: BTreeMap<String, Habit>,
    fire_times: BTreeMap<String, FireTime>,
    notifications: BTreeMap<String, Notification>,
}

/// Result of [`HabitStore::edit`].
#[derive(Debug, Clone)]
pub struct HabitEdit {
    pub habit: Habit,
    /// Notifications dropped together with their replaced fire times.
    pub removed: Vec<Notification>,
    /// Notifications the habit owns after the edit.
    pub current: Vec<Notification>,
}

/// Arena of habit, fire time and notification records keyed by id.
#[derive(Debug, Default)]
pub struct HabitStore {
    state: RwLock<StoreState>,
}

impl HabitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a saved store, rejecting fire times whose hour or minute is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let state: StoreState = serde_json::from_str(&contents)?;
        for fire_time in state.fire_times.values() {
            fire_time.validate()?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(&*self.state.read())?;
        fs::write(path, payload)?;
        Ok(())
    }

    pub fn create(&self, draft: HabitDraft) -> Result<Habit, StoreError> {
        self.create_at(draft, Local::now().naive_local())
    }

    pub fn create_at(&self, draft: HabitDraft, now: NaiveDateTime) -> Result<Habit, StoreError> {
        let name = validate_name(&draft.name)?;
        let days: BTreeSet<_> = draft.days.into_iter().collect();
        if days.is_empty() {
            return Err(StoreError::NoDays);
        }
        let specs = validate_specs(draft.fire_times)?;

        let habit = Habit {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            color: draft.color,
            days,
            created_at: now,
        };

        let mut state = self.state.write();
        state.habits.insert(habit.id.clone(), habit.clone());
        attach_fire_times(&mut state, &habit, &specs, now)?;
        debug!(habit_id = %habit.id, fire_times = specs.len(), "habit created");
        Ok(habit)
    }

    pub fn edit(&self, habit_id: &str, changes: HabitChanges) -> Result<HabitEdit, StoreError> {
        self.edit_at(habit_id, changes, Local::now().naive_local())
    }

    pub fn edit_at(
        &self,
        habit_id: &str,
        changes: HabitChanges,
        now: NaiveDateTime,
    ) -> Result<HabitEdit, StoreError> {
        let name = changes.name.as_deref().map(validate_name).transpose()?;
        let days = match changes.days {
            Some(days) if days.is_empty() => return Err(StoreError::NoDays),
            Some(days) => Some(days.into_iter().collect::<BTreeSet<_>>()),
            None => None,
        };
        let specs = changes.fire_times.map(validate_specs).transpose()?;
        let days_changed = days.is_some();

        let mut state = self.state.write();
        let habit = {
            let habit = state
                .habits
                .get_mut(habit_id)
                .ok_or_else(|| StoreError::HabitNotFound(habit_id.to_string()))?;
            if let Some(name) = name {
                habit.name = name;
            }
            if let Some(color) = changes.color {
                habit.color = color;
            }
            if let Some(days) = days {
                habit.days = days;
            }
            habit.clone()
        };

        let removed = match specs {
            Some(specs) => {
                let removed = detach_fire_times(&mut state, habit_id);
                attach_fire_times(&mut state, &habit, &specs, now)?;
                removed
            }
            None => {
                if days_changed {
                    refresh_fire_dates(&mut state, &habit, now)?;
                }
                Vec::new()
            }
        };

        let current = owned_notifications(&state, habit_id);
        Ok(HabitEdit {
            habit,
            removed,
            current,
        })
    }

    /// Removes the habit and everything attached to it, returning its notifications.
    pub fn delete(&self, habit_id: &str) -> Result<Vec<Notification>, StoreError> {
        let mut state = self.state.write();
        if state.habits.remove(habit_id).is_none() {
            return Err(StoreError::HabitNotFound(habit_id.to_string()));
        }
        Ok(detach_fire_times(&mut state, habit_id))
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.state.read().habits.values().cloned().collect()
    }

    pub fn fire_times_for(&self, habit_id: &str) -> Vec<FireTime> {
        let mut fire_times: Vec<FireTime> = self
            .state
            .read()
            .fire_times
            .values()
            .filter(|fire_time| fire_time.habit_id == habit_id)
            .cloned()
            .collect();
        fire_times.sort_by_key(FireTime::spec);
        fire_times
    }

    pub fn notifications_for(&self, habit_id: &str) -> Vec<Notification> {
        owned_notifications(&self.state.read(), habit_id)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.read().notifications.values().cloned().collect()
    }

    /// Stores the backend identifier assigned while scheduling.
    pub fn set_user_notification_id(&self, notification_id: &str, identifier: &str) -> bool {
        let mut state = self.state.write();
        match state.notifications.get_mut(notification_id) {
            Some(notification) => {
                notification.user_notification_id = Some(identifier.to_string());
                true
            }
            None => false,
        }
    }

    /// Marks the notification delivered under `identifier` as executed.
    pub fn mark_executed(&self, identifier: &str) -> Option<Notification> {
        let mut state = self.state.write();
        let notification = state
            .notifications
            .values_mut()
            .find(|notification| notification.user_notification_id.as_deref() == Some(identifier))?;
        notification.was_executed = true;
        Some(notification.clone())
    }
}

impl HabitRecords for HabitStore {
    fn habit(&self, id: &str) -> Option<Habit> {
        self.state.read().habits.get(id).cloned()
    }

    fn fire_time(&self, id: &str) -> Option<FireTime> {
        self.state.read().fire_times.get(id).cloned()
    }
}

fn validate_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn validate_specs(specs: Vec<FireTimeSpec>) -> Result<BTreeSet<FireTimeSpec>, StoreError> {
    specs.into_iter().map(FireTimeSpec::validate).collect()
}

fn attach_fire_times(
    state: &mut StoreState,
    habit: &Habit,
    specs: &BTreeSet<FireTimeSpec>,
    now: NaiveDateTime,
) -> Result<(), StoreError> {
    for spec in specs {
        let fire_time = FireTime::new(&habit.id, *spec)?;
        let fire_date = next_fire_date(&fire_time, habit, now)?;
        let notification = Notification::new(&habit.id, &fire_time.id, fire_date);
        state
            .notifications
            .insert(notification.id.clone(), notification);
        state.fire_times.insert(fire_time.id.clone(), fire_time);
    }
    Ok(())
}

/// Recomputes the fire dates of the habit's notifications after its days changed.
fn refresh_fire_dates(
    state: &mut StoreState,
    habit: &Habit,
    now: NaiveDateTime,
) -> Result<(), StoreError> {
    let StoreState {
        fire_times,
        notifications,
        ..
    } = state;
    for notification in notifications
        .values_mut()
        .filter(|notification| notification.habit_id == habit.id)
    {
        if let Some(fire_time) = fire_times.get(&notification.fire_time_id) {
            notification.fire_date = next_fire_date(fire_time, habit, now)?;
        }
    }
    Ok(())
}

fn next_fire_date(
    fire_time: &FireTime,
    habit: &Habit,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, StoreError> {
    fire_time
        .next_fire_date(habit, now)
        .ok_or(StoreError::InvalidFireTime {
            hour: fire_time.hour,
            minute: fire_time.minute,
        })
}

fn detach_fire_times(state: &mut StoreState, habit_id: &str) -> Vec<Notification> {
    state
        .fire_times
        .retain(|_, fire_time| fire_time.habit_id != habit_id);
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.notifications)
        .into_iter()
        .partition(|(_, notification)| notification.habit_id == habit_id);
    state.notifications = kept.into_iter().collect();
    removed.into_iter().map(|(_, notification)| notification).collect()
}

fn owned_notifications(state: &StoreState, habit_id: &str) -> Vec<Notification> {
    state
        .notifications
        .values()
        .filter(|notification| notification.habit_id == habit_id)
        .cloned()
        .collect()
}
