//! Notifier for development. Logs notifications to tracing output.

use async_trait::async_trait;
use tracing::info;
use warden_application::Notifier;
use warden_core::AppError;
use warden_domain::Notification;

/// Development notifier that logs each message instead of delivering it.
#[derive(Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates a new tracing notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notifications: Vec<Notification>) -> Vec<AppError> {
        let mut errors = Vec::new();
        for notification in notifications {
            match serde_json::to_string(&notification.message.variables) {
                Ok(variables) => info!(
                    user = %notification.user,
                    kind = ?notification.message.kind,
                    variables = %variables,
                    "notification sent"
                ),
                Err(error) => errors.push(AppError::Internal(format!(
                    "failed to render notification for '{}': {error}",
                    notification.user
                ))),
            }
        }

        errors
    }
}
