// src/services/notify.rs

use crate::session::{Notification, NotificationLevel, Notifier};

/// Sends candidate notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(
                candidate_id = %notification.candidate_id,
                "Notify: {}",
                notification.message
            ),
            NotificationLevel::Error => tracing::warn!(
                candidate_id = %notification.candidate_id,
                "Notify: {}",
                notification.message
            ),
        }
    }
}
