//! Outbound notification relay.
//!
//! Pure pass-through: every notification is stamped, broadcast to live
//! subscribers and kept in a bounded log for polling clients.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::types::{Notification, NotificationEntry};

/// Notifications retained for `GET /api/notifications`.
const LOG_CAPACITY: usize = 100;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotificationEntry>,
    log: Arc<RwLock<VecDeque<NotificationEntry>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            log: Arc::new(RwLock::new(VecDeque::with_capacity(LOG_CAPACITY))),
        }
    }

    /// Relay a notification outward.
    pub async fn relay(&self, notification: Notification) {
        let entry = NotificationEntry {
            timestamp: Utc::now(),
            notification,
        };
        debug!(notification = entry.notification.name(), "Relaying notification");

        {
            let mut log = self.log.write().await;
            if log.len() == LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(entry.clone());
        }

        // No subscribers is fine; the log still has it.
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEntry> {
        self.tx.subscribe()
    }

    /// Oldest first.
    pub async fn recent(&self) -> Vec<NotificationEntry> {
        self.log.read().await.iter().cloned().collect()
    }
}
