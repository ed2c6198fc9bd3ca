use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendError, NotificationBackend, PendingRequest};

/// Pending-request cap applied by mobile platforms.
pub const DEFAULT_MAX_PENDING: usize = 64;

/// Notification center that keeps pending requests in memory.
///
/// Used by the headless binary and as the test double for the scheduler.
pub struct InMemoryNotificationCenter {
    pending: Mutex<HashMap<String, PendingRequest>>,
    authorized: AtomicBool,
    max_pending: usize,
    latency: Option<Duration>,
}

impl InMemoryNotificationCenter {
    pub fn new(authorized: bool) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            authorized: AtomicBool::new(authorized),
            max_pending: DEFAULT_MAX_PENDING,
            latency: None,
        }
    }

    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = limit;
        self
    }

    /// Delays every `add` to mimic an asynchronous platform call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Fires the request stored under `identifier`, as the platform would at
    /// its trigger time. Repeating requests stay pending.
    pub fn deliver(&self, identifier: &str) -> Option<PendingRequest> {
        let mut pending = self.pending.lock();
        let request = pending.get(identifier)?.clone();
        if !request.trigger.repeats {
            pending.remove(identifier);
        }
        Some(request)
    }
}

impl Default for InMemoryNotificationCenter {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl NotificationBackend for InMemoryNotificationCenter {
    async fn add(&self, request: PendingRequest) -> Result<(), BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.is_authorized() {
            return Err(BackendError::AuthorizationDenied);
        }
        let mut pending = self.pending.lock();
        if !pending.contains_key(&request.identifier) && pending.len() >= self.max_pending {
            return Err(BackendError::ResourceLimitExceeded {
                limit: self.max_pending,
            });
        }
        pending.insert(request.identifier.clone(), request);
        Ok(())
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        let mut pending = self.pending.lock();
        for identifier in identifiers {
            pending.remove(identifier);
        }
    }

    async fn pending_requests(&self) -> Vec<PendingRequest> {
        self.pending.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{CalendarTrigger, NotificationContent, NotificationSound};
    use std::collections::BTreeMap;

    fn request(identifier: &str, title: &str) -> PendingRequest {
        PendingRequest {
            identifier: identifier.to_string(),
            content: NotificationContent {
                title: title.to_string(),
                subtitle: String::new(),
                body: String::new(),
                user_info: BTreeMap::new(),
                category_identifier: "DAY_PROMPT".to_string(),
                sound: NotificationSound::Default,
                badge: 1,
            },
            trigger: CalendarTrigger::daily(9, 0),
        }
    }

    #[tokio::test]
    async fn add_overwrites_same_identifier() {
        let center = InMemoryNotificationCenter::new(true);
        center.add(request("a", "first")).await.unwrap();
        center.add(request("a", "second")).await.unwrap();

        let pending = center.pending_requests().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content.title, "second");
    }

    #[tokio::test]
    async fn cap_ignores_overwrites() {
        let center = InMemoryNotificationCenter::new(true).with_max_pending(1);
        center.add(request("a", "first")).await.unwrap();
        center.add(request("a", "again")).await.unwrap();
        assert_eq!(
            center.add(request("b", "other")).await,
            Err(BackendError::ResourceLimitExceeded { limit: 1 })
        );
        assert_eq!(center.pending_count(), 1);
    }

    #[tokio::test]
    async fn unauthorized_center_stores_nothing() {
        let center = InMemoryNotificationCenter::new(false);
        assert_eq!(
            center.add(request("a", "first")).await,
            Err(BackendError::AuthorizationDenied)
        );
        assert_eq!(center.pending_count(), 0);
    }

    #[tokio::test]
    async fn repeating_requests_survive_delivery() {
        let center = InMemoryNotificationCenter::default();
        center.add(request("a", "first")).await.unwrap();
        assert!(center.deliver("a").is_some());
        assert!(center.deliver("missing").is_none());
        assert_eq!(center.pending_count(), 1);
    }
}
