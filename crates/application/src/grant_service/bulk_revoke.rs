use super::*;

use tokio_util::sync::CancellationToken;
use tracing::info;

use warden_domain::RevokeGrantsFilter;

use crate::revocation_engine::{BulkRevokeReport, RevocationEngine, group_by_resource};

impl GrantService {
    /// Revokes every active grant of the filtered accounts.
    pub async fn bulk_revoke(
        &self,
        filter: &RevokeGrantsFilter,
        actor: &str,
        reason: &str,
    ) -> AppResult<BulkRevokeReport> {
        self.bulk_revoke_with_cancellation(filter, actor, reason, &CancellationToken::new())
            .await
    }

    /// Revokes every active grant of the filtered accounts until cancelled.
    ///
    /// Grants not started when `cancel` fires stay active and are reported as
    /// cancelled.
    pub async fn bulk_revoke_with_cancellation(
        &self,
        filter: &RevokeGrantsFilter,
        actor: &str,
        reason: &str,
        cancel: &CancellationToken,
    ) -> AppResult<BulkRevokeReport> {
        if filter.account_ids.is_empty() {
            return Err(GovernanceError::AccountIdsRequired.into());
        }

        if actor.trim().is_empty() {
            return Err(GovernanceError::EmptyActor.into());
        }

        let grants = self.list(&filter.active_grants()).await?;
        if grants.is_empty() {
            return Ok(BulkRevokeReport::default());
        }

        let report = self.revoke_grants(grants, actor, reason, cancel).await;
        info!(
            account_ids = ?filter.account_ids,
            revoked = report.revoked_ids().len(),
            failed = report.failed_ids().len(),
            cancelled = report.cancelled_ids().len(),
            "bulk revoke completed"
        );

        self.audit(
            AuditAction::GrantBulkRevoke,
            json!({
                "account_ids": filter.account_ids,
                "actor": actor,
                "reason": reason,
                "success_ids": report.revoked_ids(),
                "failed_ids": report.failed_ids(),
                "cancelled_ids": report.cancelled_ids(),
            }),
        )
        .await;

        Ok(report)
    }

    pub(super) async fn revoke_grants(
        &self,
        grants: Vec<Grant>,
        actor: &str,
        reason: &str,
        cancel: &CancellationToken,
    ) -> BulkRevokeReport {
        let engine = RevocationEngine::new(
            self.revocation_config,
            Arc::clone(&self.repository),
            Arc::clone(&self.provider_service),
        );

        engine
            .run(group_by_resource(grants), actor, reason, cancel)
            .await
    }
}
