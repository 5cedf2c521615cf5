use async_trait::async_trait;

use warden_core::AppError;
use warden_domain::Notification;

/// Best-effort notification delivery port.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers notifications and returns one error per failed delivery.
    async fn notify(&self, notifications: Vec<Notification>) -> Vec<AppError>;
}
