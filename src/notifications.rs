use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 64;

/// Transient status message shown by the display layer.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    Pushed(Notification),
    Expired { id: u64 },
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    live: Vec<Notification>,
}

/// Holds auto-expiring notifications. Clones share the same set.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    inner: Arc<Mutex<BusInner>>,
    events: broadcast::Sender<BusEvent>,
    ttl: Duration,
}

impl NotificationBus {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(BusInner::default())),
            events,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a notification; it is removed automatically after the TTL.
    pub fn push(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let notification = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let notification = Notification {
                id: inner.next_id,
                message: message.into(),
                severity,
                created_at: Utc::now(),
                expires_at: Instant::now() + self.ttl,
            };
            inner.live.push(notification.clone());
            notification
        };
        let id = notification.id;

        match severity {
            Severity::Success => tracing::info!("[notify] {}", notification.message),
            Severity::Error => tracing::warn!("[notify] {}", notification.message),
        }
        let _ = self.events.send(BusEvent::Pushed(notification));

        // Outside a runtime, expiry still happens lazily in `live()`
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let bus = self.clone();
            handle.spawn(async move {
                tokio::time::sleep(bus.ttl).await;
                bus.expire(id);
            });
        }

        id
    }

    fn expire(&self, id: u64) {
        let removed = {
            let mut inner = self.lock();
            let before = inner.live.len();
            inner.live.retain(|n| n.id != id);
            inner.live.len() != before
        };
        if removed {
            let _ = self.events.send(BusEvent::Expired { id });
        }
    }

    /// Current live set, oldest first.
    pub fn live(&self) -> Vec<Notification> {
        let now = Instant::now();
        let (live, expired) = {
            let mut inner = self.lock();
            let expired: Vec<u64> = inner
                .live
                .iter()
                .filter(|n| n.expires_at <= now)
                .map(|n| n.id)
                .collect();
            inner.live.retain(|n| n.expires_at > now);
            (inner.live.clone(), expired)
        };
        for id in expired {
            let _ = self.events.send(BusEvent::Expired { id });
        }
        live
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }
}
