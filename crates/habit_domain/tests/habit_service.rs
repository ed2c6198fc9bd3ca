use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Local;
use habit_domain::{
    habit::{FireTimeSpec, HabitChanges, HabitColor, HabitDraft},
    notifications::{
        CalendarTrigger, InMemoryNotificationCenter, NotificationBackend, NotificationContent,
        NotificationSound, PendingRequest, HABIT_IDENTIFIER_KEY,
    },
    HabitService, HabitStore,
};
use tempfile::tempdir;

fn draft(name: &str, fire_times: &[(u32, u32)]) -> HabitDraft {
    let today = Local::now().date_naive();
    HabitDraft {
        name: name.to_string(),
        color: HabitColor::Green,
        days: (0..5).map(|offset| today + chrono::Duration::days(offset)).collect(),
        fire_times: fire_times
            .iter()
            .map(|&(hour, minute)| FireTimeSpec::new(hour, minute))
            .collect(),
    }
}

fn foreign_request(identifier: &str, habit_id: Option<&str>) -> PendingRequest {
    let mut user_info = BTreeMap::new();
    if let Some(habit_id) = habit_id {
        user_info.insert(HABIT_IDENTIFIER_KEY.to_string(), habit_id.to_string());
    }
    PendingRequest {
        identifier: identifier.to_string(),
        content: NotificationContent {
            title: "Leftover".into(),
            subtitle: String::new(),
            body: String::new(),
            user_info,
            category_identifier: "OTHER".into(),
            sound: NotificationSound::Default,
            badge: 1,
        },
        trigger: CalendarTrigger::daily(12, 0),
    }
}

async fn pending_ids(center: &InMemoryNotificationCenter) -> Vec<String> {
    let mut ids: Vec<String> = center
        .pending_requests()
        .await
        .into_iter()
        .map(|request| request.identifier)
        .collect();
    ids.sort();
    ids
}

fn record_ids(store: &HabitStore, habit_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = store
        .notifications_for(habit_id)
        .into_iter()
        .filter_map(|notification| notification.user_notification_id)
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn habit_lifecycle_keeps_pending_requests_in_step() {
    let center = Arc::new(InMemoryNotificationCenter::new(true));
    let service = HabitService::builder()
        .with_backend(center.clone())
        .build()
        .expect("build habit service");

    let created = service
        .create_habit(draft("Drink Water", &[(8, 0), (14, 0)]))
        .await
        .expect("create habit");
    assert!(created.report.is_success());
    let habit_id = created.habit.id.clone();
    assert_eq!(pending_ids(&center).await, record_ids(service.store(), &habit_id));
    assert_eq!(center.pending_count(), 2);

    let renamed = service
        .edit_habit(
            &habit_id,
            HabitChanges {
                name: Some("Drink more water".into()),
                ..HabitChanges::default()
            },
        )
        .await
        .expect("rename habit");
    assert_eq!(renamed.habit.name, "Drink more water");
    let titles: Vec<String> = center
        .pending_requests()
        .await
        .into_iter()
        .map(|request| request.content.title)
        .collect();
    assert!(titles.iter().all(|title| title == "Drink more water"));
    assert_eq!(center.pending_count(), 2);

    let retimed = service
        .edit_habit(
            &habit_id,
            HabitChanges {
                fire_times: Some(vec![FireTimeSpec::new(9, 30)]),
                ..HabitChanges::default()
            },
        )
        .await
        .expect("change fire times");
    assert_eq!(retimed.report.scheduled.len(), 1);
    assert_eq!(pending_ids(&center).await, record_ids(service.store(), &habit_id));
    let pending = center.pending_requests().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].trigger, CalendarTrigger::daily(9, 30));

    service.delete_habit(&habit_id).await.expect("delete habit");
    assert_eq!(center.pending_count(), 0);
    assert!(service.delete_habit(&habit_id).await.is_err());
}

#[tokio::test]
async fn creation_without_authorization_keeps_records() {
    let center = Arc::new(InMemoryNotificationCenter::new(false));
    let service = HabitService::builder()
        .with_backend(center.clone())
        .build()
        .unwrap();

    let created = service
        .create_habit(draft("Read", &[(21, 0)]))
        .await
        .expect("habit is stored even when reminders are refused");

    assert_eq!(created.report.failed.len(), 1);
    assert_eq!(center.pending_count(), 0);
    assert_eq!(service.store().notifications_for(&created.habit.id).len(), 1);

    center.set_authorized(true);
    let reconciled = service.reconcile().await.expect("reconcile");
    assert_eq!(reconciled.report.scheduled.len(), 1);
    assert_eq!(
        pending_ids(&center).await,
        record_ids(service.store(), &created.habit.id)
    );
}

#[tokio::test]
async fn reconcile_removes_orphans_and_spares_foreign_requests() {
    let center = Arc::new(InMemoryNotificationCenter::new(true));
    let service = HabitService::builder()
        .with_backend(center.clone())
        .build()
        .unwrap();
    let created = service
        .create_habit(draft("Stretch", &[(7, 0)]))
        .await
        .unwrap();

    center
        .add(foreign_request("orphan", Some("deleted-habit")))
        .await
        .unwrap();
    center.add(foreign_request("calendar-event", None)).await.unwrap();

    let reconciled = service.reconcile().await.expect("reconcile");
    assert_eq!(reconciled.orphans_removed, 1);
    assert_eq!(reconciled.report.attempted(), 0);

    let mut expected = record_ids(service.store(), &created.habit.id);
    expected.push("calendar-event".to_string());
    expected.sort();
    assert_eq!(pending_ids(&center).await, expected);
}

#[tokio::test]
async fn delivery_marks_notification_executed() {
    let center = Arc::new(InMemoryNotificationCenter::new(true));
    let service = HabitService::builder()
        .with_backend(center.clone())
        .build()
        .unwrap();
    let created = service
        .create_habit(draft("Meditate", &[(6, 30)]))
        .await
        .unwrap();
    let identifier = created.report.scheduled[0]
        .user_notification_id
        .clone()
        .unwrap();

    let delivered = center.deliver(&identifier).expect("pending request");
    assert_eq!(
        delivered.habit_identifier(),
        Some(created.habit.id.as_str())
    );

    let marked = service.handle_delivery(&identifier).expect("mark executed");
    assert!(marked.was_executed);
    assert!(service.handle_delivery("unknown").is_err());
    assert_eq!(center.pending_count(), 1);
}

#[tokio::test]
async fn store_survives_restart_and_reconciles() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("habits.json");

    let first_center = Arc::new(InMemoryNotificationCenter::new(true));
    let service = HabitService::builder()
        .open_store(&path)
        .expect("open store")
        .with_backend(first_center)
        .build()
        .unwrap();
    let created = service
        .create_habit(draft("Journal", &[(22, 0), (22, 30)]))
        .await
        .unwrap();
    service.store().save(&path).expect("save store");

    let fresh_center = Arc::new(InMemoryNotificationCenter::new(true));
    let restarted = HabitService::builder()
        .open_store(&path)
        .expect("reopen store")
        .with_backend(fresh_center.clone())
        .build()
        .unwrap();
    let reconciled = restarted.reconcile().await.unwrap();

    assert_eq!(reconciled.report.scheduled.len(), 2);
    assert_eq!(
        pending_ids(&fresh_center).await,
        record_ids(restarted.store(), &created.habit.id)
    );
}

#[test]
fn builder_requires_backend() {
    assert!(HabitService::builder().build().is_err());
}
