use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use warden_application::AuditLogger;
use warden_core::AppResult;
use warden_domain::AuditAction;

/// Audit logger writing one structured event per entry.
#[derive(Clone, Default)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// Creates a new tracing audit logger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log(&self, action: AuditAction, data: Value) -> AppResult<()> {
        info!(target: "audit", action = action.as_str(), data = %data, "audit event");
        Ok(())
    }
}
