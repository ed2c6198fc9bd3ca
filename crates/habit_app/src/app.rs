use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use habit_domain::{
    habit::HabitDraft,
    notifications::{memory::DEFAULT_MAX_PENDING, InMemoryNotificationCenter, NotificationBackend},
    HabitService,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_path: PathBuf,
    pub(crate) seed_path: Option<PathBuf>,
    pub(crate) max_pending: usize,
    pub(crate) notifications_authorized: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("HABIT_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("HABIT_SEED") {
            config.seed_path = Some(PathBuf::from(path));
        }
        if let Ok(limit) = std::env::var("HABIT_MAX_PENDING") {
            if let Ok(value) = limit.trim().parse::<usize>() {
                if value > 0 {
                    config.max_pending = value;
                }
            }
        }
        if let Ok(flag) = std::env::var("HABIT_NOTIFICATIONS_AUTHORIZED") {
            if let Some(value) = parse_flag(&flag) {
                config.notifications_authorized = value;
            }
        }
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("habits.json"),
            seed_path: None,
            max_pending: DEFAULT_MAX_PENDING,
            notifications_authorized: true,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Imports seed habits, brings the notification center in line with the store
/// and returns the pending requests as JSON.
pub async fn run(config: AppConfig) -> Result<String> {
    let center = Arc::new(
        InMemoryNotificationCenter::new(config.notifications_authorized)
            .with_max_pending(config.max_pending),
    );
    let service = HabitService::builder()
        .open_store(&config.data_path)?
        .with_backend(center.clone())
        .build()?;

    if let Some(seed) = &config.seed_path {
        import_seed(&service, seed).await?;
    }

    let reconciled = service.reconcile().await?;
    info!(
        orphans = reconciled.orphans_removed,
        scheduled = reconciled.report.scheduled.len(),
        failed = reconciled.report.failed.len(),
        "reminders reconciled"
    );

    service
        .store()
        .save(&config.data_path)
        .with_context(|| format!("failed to save habits to {}", config.data_path.display()))?;

    let mut pending = center.pending_requests().await;
    pending.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(serde_json::to_string_pretty(&pending)?)
}

/// Creates every seed habit whose name is not stored yet.
async fn import_seed(service: &HabitService, path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let drafts: Vec<HabitDraft> = serde_json::from_str(&contents)
        .with_context(|| format!("invalid seed file {}", path.display()))?;

    let mut known: HashSet<String> = service
        .store()
        .habits()
        .into_iter()
        .map(|habit| habit.name)
        .collect();
    let mut imported = 0;
    for draft in drafts {
        if known.contains(draft.name.trim()) {
            debug!(name = %draft.name, "seed habit already stored");
            continue;
        }
        match service.create_habit(draft).await {
            Ok(created) => {
                known.insert(created.habit.name.clone());
                imported += 1;
            }
            Err(err) => warn!(%err, "skipping seed habit"),
        }
    }
    info!(imported, "seed habits imported");
    Ok(imported)
}
