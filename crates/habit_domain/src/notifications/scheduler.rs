use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    habit::{FireTime, Habit},
    notification::Notification,
};

use super::{factory::make_notification_options, BackendError, NotificationBackend, PendingRequest};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("habit not found: {0}")]
    UnresolvedHabit(String),
    #[error("fire time not found: {0}")]
    UnresolvedFireTime(String),
    #[error("fire time `{fire_time_id}` has invalid time {hour:02}:{minute:02}")]
    InvalidFireTime {
        fire_time_id: String,
        hour: u32,
        minute: u32,
    },
    #[error("fire time `{fire_time_id}` does not belong to habit `{habit_id}`")]
    HabitMismatch {
        fire_time_id: String,
        habit_id: String,
    },
}

/// Read access to the records a notification points at.
pub trait HabitRecords: Send + Sync {
    fn habit(&self, id: &str) -> Option<Habit>;
    fn fire_time(&self, id: &str) -> Option<FireTime>;
}

#[derive(Debug, Clone)]
pub struct ScheduleFailure {
    pub notification: Notification,
    pub error: SchedulerError,
}

/// Outcome of a batch submission. Every input lands in exactly one list.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub scheduled: Vec<Notification>,
    pub failed: Vec<ScheduleFailure>,
}

impl ScheduleReport {
    pub fn attempted(&self) -> usize {
        self.scheduled.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Bridges notification records to the backend's pending requests.
#[derive(Clone)]
pub struct NotificationScheduler {
    backend: Arc<dyn NotificationBackend>,
}

impl NotificationScheduler {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn NotificationBackend> {
        &self.backend
    }

    /// Resolves the notification's records and builds its backend request,
    /// assigning an identifier to `notification` when it has none.
    pub fn make_request<R>(
        &self,
        records: &R,
        notification: &mut Notification,
    ) -> Result<PendingRequest, SchedulerError>
    where
        R: HabitRecords + ?Sized,
    {
        let fire_time = records
            .fire_time(&notification.fire_time_id)
            .ok_or_else(|| SchedulerError::UnresolvedFireTime(notification.fire_time_id.clone()))?;
        let habit = records
            .habit(&fire_time.habit_id)
            .ok_or_else(|| SchedulerError::UnresolvedHabit(fire_time.habit_id.clone()))?;
        let options = make_notification_options(&fire_time, &habit)?;
        let identifier = notification.ensure_identifier().to_string();
        Ok(PendingRequest {
            identifier,
            content: options.content,
            trigger: options.trigger,
        })
    }

    pub async fn schedule<R>(
        &self,
        records: &R,
        mut notification: Notification,
    ) -> Result<Notification, SchedulerError>
    where
        R: HabitRecords + ?Sized,
    {
        let request = self.make_request(records, &mut notification)?;
        let identifier = request.identifier.clone();
        self.backend.add(request).await.map_err(|err| {
            warn!(%identifier, %err, "backend refused notification");
            SchedulerError::from(err)
        })?;
        debug!(%identifier, habit_id = %notification.habit_id, "notification scheduled");
        Ok(notification)
    }

    /// Schedules on a spawned task and hands the outcome to `completion`.
    ///
    /// The request is built before returning, so a record that cannot be
    /// resolved never reaches the backend. Must be called inside a tokio runtime.
    pub fn schedule_with<R, F>(
        &self,
        records: &R,
        mut notification: Notification,
        completion: F,
    ) -> JoinHandle<()>
    where
        R: HabitRecords + ?Sized,
        F: FnOnce(Result<Notification, SchedulerError>) + Send + 'static,
    {
        let prepared = self.make_request(records, &mut notification);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let outcome = match prepared {
                Ok(request) => backend
                    .add(request)
                    .await
                    .map(|()| notification)
                    .map_err(SchedulerError::from),
                Err(err) => Err(err),
            };
            completion(outcome);
        })
    }

    /// Schedules every notification, submitting all of them before awaiting any.
    pub async fn schedule_all<R>(&self, records: &R, notifications: Vec<Notification>) -> ScheduleReport
    where
        R: HabitRecords + ?Sized,
    {
        let mut report = ScheduleReport::default();
        if notifications.is_empty() {
            return report;
        }

        let backend = &self.backend;
        let mut submissions = Vec::with_capacity(notifications.len());
        for mut notification in notifications {
            match self.make_request(records, &mut notification) {
                Ok(request) => submissions.push(async move {
                    let outcome = backend.add(request).await;
                    (notification, outcome)
                }),
                Err(error) => report.failed.push(ScheduleFailure {
                    notification,
                    error,
                }),
            }
        }

        for (notification, outcome) in join_all(submissions).await {
            match outcome {
                Ok(()) => report.scheduled.push(notification),
                Err(err) => report.failed.push(ScheduleFailure {
                    notification,
                    error: err.into(),
                }),
            }
        }

        if !report.is_success() {
            warn!(
                scheduled = report.scheduled.len(),
                failed = report.failed.len(),
                "some notifications could not be scheduled"
            );
        }
        report
    }

    /// Removes the pending requests of `notifications` in one backend call.
    pub async fn unschedule(&self, notifications: &[Notification]) {
        let identifiers = identifiers_of(notifications);
        if identifiers.is_empty() {
            return;
        }
        debug!(count = identifiers.len(), "unscheduling notifications");
        self.backend.remove_pending(&identifiers).await;
    }

    /// Fire-and-forget variant of [`Self::unschedule`].
    pub fn unschedule_detached(&self, notifications: &[Notification]) -> JoinHandle<()> {
        let identifiers = identifiers_of(notifications);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if !identifiers.is_empty() {
                backend.remove_pending(&identifiers).await;
            }
        })
    }
}

fn identifiers_of(notifications: &[Notification]) -> Vec<String> {
    notifications
        .iter()
        .filter_map(|notification| notification.user_notification_id.clone())
        .collect()
}
