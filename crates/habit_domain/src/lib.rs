pub mod category;
pub mod error;
pub mod habit;
pub mod notification;
pub mod notifications;
pub mod service;
pub mod store;

pub use crate::error::StoreError;
pub use crate::service::{HabitService, HabitServiceBuilder};
pub use crate::store::HabitStore;
