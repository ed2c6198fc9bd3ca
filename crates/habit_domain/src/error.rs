use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("a habit needs at least one challenge day")]
    NoDays,
    #[error("invalid fire time {hour:02}:{minute:02}")]
    InvalidFireTime { hour: u32, minute: u32 },
    #[error("habit not found: {0}")]
    HabitNotFound(String),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode store: {0}")]
    Json(#[from] serde_json::Error),
}
