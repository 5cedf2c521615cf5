use async_trait::async_trait;
use serde_json::Value;

use warden_core::AppResult;
use warden_domain::AuditAction;

/// Best-effort audit log port.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    /// Appends one audit entry.
    async fn log(&self, action: AuditAction, data: Value) -> AppResult<()>;
}
