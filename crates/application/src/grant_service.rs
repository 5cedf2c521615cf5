use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::warn;
use validator::{Validate, ValidationError};

use warden_core::{AppError, AppResult, GovernanceError};
use warden_domain::{
    Appeal, AppealStatus, AuditAction, Grant, ListGrantsFilter, Notification, NotificationKind,
};

use crate::{AuditLogger, GrantRepository, Notifier, ProviderService, RevocationConfig};

mod bulk_revoke;
mod jobs;
mod ownership;
mod revoke;


pub use jobs::ExpirationReminderSummary;
pub use revoke::RevokeOptions;

/// Application service for the grant lifecycle.
#[derive(Clone)]
pub struct GrantService {
    repository: Arc<dyn GrantRepository>,
    provider_service: Arc<dyn ProviderService>,
    notifier: Arc<dyn Notifier>,
    audit_logger: Arc<dyn AuditLogger>,
    revocation_config: RevocationConfig,
}

/// Precondition for issuing a grant from an appeal.
#[derive(Debug, Validate)]
struct GrantCreation {
    #[validate(custom(function = "validate_appeal_approved"))]
    appeal_status: AppealStatus,
    #[validate(length(min = 1, message = "account_id is required"))]
    account_id: String,
    #[validate(length(min = 1, message = "account_type is required"))]
    account_type: String,
    #[validate(length(min = 1, message = "resource_id is required"))]
    resource_id: String,
}

fn validate_appeal_approved(status: &AppealStatus) -> Result<(), ValidationError> {
    if *status == AppealStatus::Active {
        return Ok(());
    }

    Err(ValidationError::new("appeal_not_approved")
        .with_message(format!("appeal status is {}, expected approved", status.as_str()).into()))
}

impl GrantService {
    /// Creates a grant service with default revocation limits.
    #[must_use]
    pub fn new(
        repository: Arc<dyn GrantRepository>,
        provider_service: Arc<dyn ProviderService>,
        notifier: Arc<dyn Notifier>,
        audit_logger: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            repository,
            provider_service,
            notifier,
            audit_logger,
            revocation_config: RevocationConfig::default(),
        }
    }

    /// Overrides bulk revocation limits.
    #[must_use]
    pub fn with_revocation_config(mut self, revocation_config: RevocationConfig) -> Self {
        self.revocation_config = revocation_config;
        self
    }

    /// Lists grants matching the filter.
    pub async fn list(&self, filter: &ListGrantsFilter) -> AppResult<Vec<Grant>> {
        self.repository
            .list(filter)
            .await
            .map_err(|error| persistence("listing grants", error))
    }

    /// Returns one grant.
    pub async fn get_by_id(&self, grant_id: &str) -> AppResult<Grant> {
        if grant_id.trim().is_empty() {
            return Err(GovernanceError::EmptyIdParam.into());
        }

        self.repository
            .find_by_id(grant_id)
            .await
            .map_err(|error| persistence("getting grant details", error))?
            .ok_or_else(|| GovernanceError::GrantNotFound.into())
    }

    /// Builds the active grant for an approved appeal.
    ///
    /// A relative duration is resolved to an absolute expiration here.
    pub fn prepare(&self, appeal: &Appeal) -> AppResult<Grant> {
        GrantCreation {
            appeal_status: appeal.status,
            account_id: appeal.account_id.clone(),
            account_type: appeal.account_type.clone(),
            resource_id: appeal.resource_id.clone(),
        }
        .validate()
        .map_err(|errors| {
            AppError::Validation(format!(
                "appeal '{}' is not eligible for a grant: {errors}",
                appeal.id
            ))
        })?;

        appeal.to_grant(Utc::now())
    }

    async fn send_notifications(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }

        for error in self.notifier.notify(notifications).await {
            warn!(error = %error, "failed to send notification");
        }
    }

    async fn audit(&self, action: AuditAction, data: serde_json::Value) {
        if let Err(error) = self.audit_logger.log(action, data).await {
            warn!(action = action.as_str(), error = %error, "failed to record audit log");
        }
    }

    fn revoked_notification(grant: &Grant) -> Notification {
        Notification::for_grant(&grant.created_by, NotificationKind::AccessRevoked, grant)
            .with_variable("revoke_reason", json!(grant.revoke_reason))
    }
}

pub(crate) fn persistence(context: &str, error: AppError) -> AppError {
    AppError::Persistence(format!("{context}: {error}"))
}
