use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use warden_core::{AppError, AppResult, GovernanceError};
use warden_domain::{
    Appeal, AppealStatus, Approval, AuditAction, ListAppealsFilter, ListApprovalsFilter,
    Notification, NotificationKind, Policy,
};

use crate::grant_service::persistence;
use crate::{
    ApprovalResolver, AppealRepository, AuditLogger, GrantRepository, GrantService,
    IdentityManager, Notifier, PolicyRepository, ProviderService, ResourceRepository,
};

mod actions;
mod activation;
mod approvers;
mod create;


pub use actions::ApprovalActionInput;
pub use create::CreateAppealInput;

/// Collaborators required by [`AppealService`].
#[derive(Clone)]
pub struct AppealServicePorts {
    /// Appeal persistence.
    pub appeals: Arc<dyn AppealRepository>,
    /// Grant persistence used on activation.
    pub grants: Arc<dyn GrantRepository>,
    /// Policy versions.
    pub policies: Arc<dyn PolicyRepository>,
    /// Provider resources.
    pub resources: Arc<dyn ResourceRepository>,
    /// Provider access.
    pub provider_service: Arc<dyn ProviderService>,
    /// Notification delivery.
    pub notifier: Arc<dyn Notifier>,
    /// Audit log.
    pub audit_logger: Arc<dyn AuditLogger>,
}

/// Application service for the appeal state machine.
#[derive(Clone)]
pub struct AppealService {
    repository: Arc<dyn AppealRepository>,
    grant_repository: Arc<dyn GrantRepository>,
    policy_repository: Arc<dyn PolicyRepository>,
    resource_repository: Arc<dyn ResourceRepository>,
    provider_service: Arc<dyn ProviderService>,
    notifier: Arc<dyn Notifier>,
    audit_logger: Arc<dyn AuditLogger>,
    grant_service: GrantService,
    resolver: ApprovalResolver,
    identity_manager: Option<Arc<dyn IdentityManager>>,
}

impl AppealService {
    /// Creates an appeal service.
    #[must_use]
    pub fn new(ports: AppealServicePorts, grant_service: GrantService) -> Self {
        Self {
            repository: ports.appeals,
            grant_repository: ports.grants,
            policy_repository: ports.policies,
            resource_repository: ports.resources,
            provider_service: ports.provider_service,
            notifier: ports.notifier,
            audit_logger: ports.audit_logger,
            grant_service,
            resolver: ApprovalResolver::new(),
            identity_manager: None,
        }
    }

    /// Enriches appeal creators from the policy identity provider.
    #[must_use]
    pub fn with_identity_manager(mut self, identity_manager: Arc<dyn IdentityManager>) -> Self {
        self.identity_manager = Some(identity_manager);
        self
    }

    /// Lists appeals matching the filter.
    pub async fn find(&self, filter: &ListAppealsFilter) -> AppResult<Vec<Appeal>> {
        self.repository
            .find(filter)
            .await
            .map_err(|error| persistence("listing appeals", error))
    }

    /// Returns one appeal.
    pub async fn get_by_id(&self, appeal_id: &str) -> AppResult<Appeal> {
        if appeal_id.trim().is_empty() {
            return Err(GovernanceError::AppealIdEmptyParam.into());
        }

        self.repository
            .find_by_id(appeal_id)
            .await
            .map_err(|error| persistence("getting appeal", error))?
            .ok_or_else(|| GovernanceError::AppealNotFound.into())
    }

    /// Lists approvals matching the filter.
    pub async fn list_approvals(&self, filter: &ListApprovalsFilter) -> AppResult<Vec<Approval>> {
        self.repository
            .list_approvals(filter)
            .await
            .map_err(|error| persistence("listing approvals", error))
    }

    /// Cancels a pending appeal.
    pub async fn cancel(&self, appeal_id: &str) -> AppResult<Appeal> {
        let mut appeal = self.get_by_id(appeal_id).await?;
        appeal.cancel(Utc::now())?;

        self.repository
            .update(&appeal)
            .await
            .map_err(|error| persistence("updating appeal", error))?;

        self.audit(
            AuditAction::AppealCancel,
            json!({"appeal_id": appeal.id, "created_by": appeal.created_by}),
        )
        .await;

        Ok(appeal)
    }

    async fn pinned_policy(&self, policy_id: &str, version: u32) -> AppResult<Policy> {
        if let Some(policy) = self
            .policy_repository
            .find_version(policy_id, version)
            .await
            .map_err(|error| persistence("getting policy", error))?
        {
            return Ok(policy);
        }

        let versions = self
            .policy_repository
            .list_versions(policy_id)
            .await
            .map_err(|error| persistence("getting policy", error))?;
        if versions.is_empty() {
            Err(GovernanceError::PolicyIdNotFound.into())
        } else {
            Err(GovernanceError::PolicyVersionNotFound.into())
        }
    }

    async fn send_notifications(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }

        for error in self.notifier.notify(notifications).await {
            warn!(error = %error, "failed to send notification");
        }
    }

    async fn audit(&self, action: AuditAction, data: Value) {
        if let Err(error) = self.audit_logger.log(action, data).await {
            warn!(action = action.as_str(), error = %error, "failed to record audit log");
        }
    }

    /// Builds the notifications describing the appeal's new state.
    fn state_notifications(appeal: &Appeal) -> Vec<Notification> {
        match appeal.status {
            AppealStatus::Active => vec![Notification::for_appeal(
                &appeal.created_by,
                NotificationKind::AppealApproved,
                appeal,
            )],
            AppealStatus::Rejected => vec![Notification::for_appeal(
                &appeal.created_by,
                NotificationKind::AppealRejected,
                appeal,
            )],
            AppealStatus::Pending => appeal
                .approvals
                .iter()
                .filter(|approval| approval.status == warden_domain::ApprovalStatus::Pending)
                .flat_map(|approval| approval.approvers.iter())
                .map(|approver| {
                    Notification::for_appeal(approver, NotificationKind::ApproverNotification, appeal)
                })
                .collect(),
            AppealStatus::Terminated | AppealStatus::Canceled => Vec::new(),
        }
    }
}

fn invalid_input(message: &str) -> AppError {
    AppError::Validation(message.to_owned())
}
