use super::*;

use tracing::{error, info};

/// Switches for single-grant revocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevokeOptions {
    /// Only update the record; leave provider access untouched.
    pub skip_revoke_in_provider: bool,
    /// Do not notify the grant creator.
    pub skip_notifications: bool,
}

impl GrantService {
    /// Revokes one grant.
    ///
    /// The inactive record is persisted before the provider call. When the
    /// provider call fails the previous record is written back; if that write
    /// fails too, `AppError::RollbackFailed` is returned and the record may
    /// stay inactive while provider access remains.
    pub async fn revoke(
        &self,
        grant_id: &str,
        actor: &str,
        reason: &str,
        options: RevokeOptions,
    ) -> AppResult<Grant> {
        let previous = self.get_by_id(grant_id).await?;

        let mut grant = previous.clone();
        grant.revoke(actor, reason, Utc::now())?;

        self.repository
            .update(&grant)
            .await
            .map_err(|error| persistence("updating grant record", error))?;

        if !options.skip_revoke_in_provider
            && let Err(provider_error) = self.provider_service.revoke_access(&grant).await
        {
            let operation = format!("removing grant in provider: {provider_error}");
            if let Err(rollback_error) = self.repository.update(&previous).await {
                error!(
                    grant_id = %grant.id,
                    error = %provider_error,
                    rollback_error = %rollback_error,
                    "failed to rollback grant status"
                );
                return Err(AppError::RollbackFailed {
                    operation,
                    rollback: rollback_error.to_string(),
                });
            }

            return Err(AppError::Upstream(operation));
        }

        if !options.skip_notifications {
            self.send_notifications(vec![Self::revoked_notification(&grant)])
                .await;
        }

        info!(
            grant_id = %grant.id,
            actor = %actor,
            reason = %reason,
            "grant revoked"
        );

        self.audit(
            AuditAction::GrantRevoke,
            json!({
                "grant_id": grant.id,
                "account_id": grant.account_id,
                "resource_id": grant.resource_id,
                "actor": actor,
                "reason": reason,
            }),
        )
        .await;

        Ok(grant)
    }
}
