use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, instrument, warn};

use crate::{
    habit::{Habit, HabitChanges, HabitDraft},
    notification::Notification,
    notifications::{NotificationBackend, NotificationScheduler, ScheduleReport},
    store::HabitStore,
};

/// A habit together with the outcome of scheduling its reminders.
#[derive(Debug, Clone)]
pub struct ScheduledHabit {
    pub habit: Habit,
    pub report: ScheduleReport,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Pending requests removed because no notification record owns them.
    pub orphans_removed: usize,
    pub report: ScheduleReport,
}

/// Keeps the habit records and the backend's pending requests in step.
pub struct HabitService {
    store: HabitStore,
    scheduler: NotificationScheduler,
}

pub struct HabitServiceBuilder {
    store: Option<HabitStore>,
    backend: Option<Arc<dyn NotificationBackend>>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            backend: None,
        }
    }

    pub fn with_store(mut self, store: HabitStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn open_store(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let store = HabitStore::open(path)
            .with_context(|| format!("failed to open habit store at {}", path.display()))?;
        Ok(self.with_store(store))
    }

    pub fn with_backend(mut self, backend: Arc<dyn NotificationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<HabitService> {
        let backend = self
            .backend
            .ok_or_else(|| anyhow!("notification backend not configured"))?;
        Ok(HabitService {
            store: self.store.unwrap_or_default(),
            scheduler: NotificationScheduler::new(backend),
        })
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn store(&self) -> &HabitStore {
        &self.store
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_habit(&self, draft: HabitDraft) -> Result<ScheduledHabit> {
        let habit = self.store.create(draft).context("failed to create habit")?;
        let notifications = self.store.notifications_for(&habit.id);
        let report = self.schedule(notifications).await;
        info!(habit_id = %habit.id, scheduled = report.scheduled.len(), "habit created");
        Ok(ScheduledHabit { habit, report })
    }

    /// Applies `changes` and reschedules the habit's reminders so their content
    /// reflects the edited fields.
    #[instrument(skip(self, changes))]
    pub async fn edit_habit(&self, habit_id: &str, changes: HabitChanges) -> Result<ScheduledHabit> {
        let edit = self
            .store
            .edit(habit_id, changes)
            .with_context(|| format!("failed to edit habit `{habit_id}`"))?;
        self.scheduler.unschedule(&edit.removed).await;
        let report = self.schedule(edit.current).await;
        Ok(ScheduledHabit {
            habit: edit.habit,
            report,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_habit(&self, habit_id: &str) -> Result<()> {
        let removed = self
            .store
            .delete(habit_id)
            .with_context(|| format!("failed to delete habit `{habit_id}`"))?;
        self.scheduler.unschedule(&removed).await;
        info!(%habit_id, unscheduled = removed.len(), "habit deleted");
        Ok(())
    }

    /// Drops pending habit requests no record owns and schedules records that
    /// have no pending request.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let pending = self.scheduler.backend().pending_requests().await;
        let notifications = self.store.notifications();

        let known: HashSet<&str> = notifications
            .iter()
            .filter_map(|notification| notification.user_notification_id.as_deref())
            .collect();
        let orphans: Vec<String> = pending
            .iter()
            .filter(|request| request.habit_identifier().is_some())
            .filter(|request| !known.contains(request.identifier.as_str()))
            .map(|request| request.identifier.clone())
            .collect();
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "removing orphaned pending requests");
            self.scheduler.backend().remove_pending(&orphans).await;
        }

        let pending_ids: HashSet<&str> = pending
            .iter()
            .map(|request| request.identifier.as_str())
            .collect();
        let missing: Vec<Notification> = notifications
            .iter()
            .filter(|notification| {
                notification
                    .user_notification_id
                    .as_deref()
                    .map_or(true, |identifier| !pending_ids.contains(identifier))
            })
            .cloned()
            .collect();
        let report = self.schedule(missing).await;

        Ok(ReconcileReport {
            orphans_removed: orphans.len(),
            report,
        })
    }

    /// Records that the backend delivered the reminder stored under `identifier`.
    pub fn handle_delivery(&self, identifier: &str) -> Result<Notification> {
        self.store
            .mark_executed(identifier)
            .ok_or_else(|| anyhow!("no notification recorded for `{identifier}`"))
    }

    async fn schedule(&self, notifications: Vec<Notification>) -> ScheduleReport {
        let report = self.scheduler.schedule_all(&self.store, notifications).await;
        for notification in &report.scheduled {
            if let Some(identifier) = &notification.user_notification_id {
                self.store
                    .set_user_notification_id(&notification.id, identifier);
            }
        }
        for failure in &report.failed {
            warn!(
                notification_id = %failure.notification.id,
                error = %failure.error,
                "notification not scheduled"
            );
        }
        report
    }
}
