use super::*;

use tracing::{error, info};

use warden_domain::{Grant, GrantStatus, ListGrantsFilter};

const SYSTEM_ACTOR: &str = "system";
const WITHDRAWN_ACCESS_REASON: &str = "appeal could not be saved";

/// Access issued for an activated appeal that is not stored yet.
#[derive(Debug, Clone)]
pub(super) struct IssuedAccess {
    grant: Grant,
    superseded: Vec<Grant>,
}

impl AppealService {
    /// Issues access for an appeal that just became active.
    ///
    /// Requirement appeals are created first, then the grant is prepared,
    /// granted at the provider and persisted together with the grants it
    /// supersedes. The returned record withdraws the access again when the
    /// appeal itself fails to persist.
    pub(super) async fn activate(
        &self,
        appeal: &mut Appeal,
        policy: &Policy,
    ) -> AppResult<IssuedAccess> {
        self.create_requirement_appeals(appeal, policy).await?;

        let grant = self.grant_service.prepare(appeal)?;
        let superseded = self.active_grants_for(&grant).await?;

        self.provider_service
            .grant_access(&grant)
            .await
            .map_err(|error| AppError::Upstream(format!("granting access in provider: {error}")))?;

        let now = Utc::now();
        let mut batch: Vec<Grant> = superseded
            .iter()
            .cloned()
            .map(|mut previous| {
                previous.supersede(&appeal.created_by, &appeal.id, now);
                previous
            })
            .collect();
        batch.push(grant.clone());
        if let Err(persist_error) = self.grant_repository.bulk_upsert(&batch).await {
            let operation = format!("inserting grant record: {persist_error}");
            if let Err(revoke_error) = self.provider_service.revoke_access(&grant).await {
                error!(
                    appeal_id = %appeal.id,
                    error = %persist_error,
                    rollback_error = %revoke_error,
                    "failed to revoke access after grant persistence failure"
                );
                return Err(AppError::RollbackFailed {
                    operation,
                    rollback: revoke_error.to_string(),
                });
            }

            return Err(AppError::Persistence(operation));
        }

        info!(appeal_id = %appeal.id, grant_id = %grant.id, "appeal activated");
        appeal.grant = Some(grant.clone());
        Ok(IssuedAccess { grant, superseded })
    }

    /// Undoes issued access after the owning appeals failed to persist.
    ///
    /// Access is revoked at the provider, the new grant is marked inactive
    /// and superseded grants are restored. Returns `error` unchanged when
    /// every step succeeds.
    pub(super) async fn withdraw_access(&self, issued: &[IssuedAccess], error: AppError) -> AppError {
        if issued.is_empty() {
            return error;
        }

        let now = Utc::now();
        let mut failures = Vec::new();
        for access in issued {
            if let Err(revoke_error) = self.provider_service.revoke_access(&access.grant).await {
                failures.push(format!(
                    "revoking grant '{}' in provider: {revoke_error}",
                    access.grant.id
                ));
            }

            let mut withdrawn = access.grant.clone();
            if let Err(revoke_error) = withdrawn.revoke(SYSTEM_ACTOR, WITHDRAWN_ACCESS_REASON, now)
            {
                failures.push(format!("revoking grant '{}': {revoke_error}", withdrawn.id));
                continue;
            }

            let mut records = access.superseded.clone();
            records.push(withdrawn);
            if let Err(persist_error) = self.grant_repository.bulk_upsert(&records).await {
                failures.push(format!(
                    "restoring grant records for '{}': {persist_error}",
                    access.grant.id
                ));
            }
        }

        if failures.is_empty() {
            info!(grants = issued.len(), error = %error, "issued access withdrawn");
            return error;
        }

        let rollback = failures.join("; ");
        error!(error = %error, rollback_error = %rollback, "failed to withdraw issued access");
        AppError::RollbackFailed {
            operation: error.to_string(),
            rollback,
        }
    }

    async fn create_requirement_appeals(&self, appeal: &Appeal, policy: &Policy) -> AppResult<()> {
        let additional_appeals = self.resolver.matching_requirements(policy, appeal)?;
        for additional in additional_appeals {
            let input = CreateAppealInput {
                resource_id: additional.resource_id,
                account_id: appeal.account_id.clone(),
                account_type: appeal.account_type.clone(),
                role: additional.role,
                options: additional.options,
                policy: additional.policy,
                description: Some(format!("additional appeal required by appeal {}", appeal.id)),
                ..CreateAppealInput::default()
            };

            match self.create_boxed(&appeal.created_by, vec![input]).await {
                Ok(created) => {
                    for spawned in created {
                        info!(
                            appeal_id = %appeal.id,
                            additional_appeal_id = %spawned.id,
                            "additional appeal created"
                        );
                    }
                }
                Err(AppError::Governance(GovernanceError::AppealDuplicate)) => {
                    info!(appeal_id = %appeal.id, "additional appeal already pending, skipped");
                }
                Err(error) => {
                    warn!(appeal_id = %appeal.id, error = %error, "failed to create additional appeal");
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    async fn active_grants_for(&self, grant: &Grant) -> AppResult<Vec<Grant>> {
        self.grant_repository
            .list(&ListGrantsFilter {
                statuses: vec![GrantStatus::Active],
                account_ids: vec![grant.account_id.clone()],
                resource_ids: vec![grant.resource_id.clone()],
                roles: vec![grant.role.clone()],
                ..ListGrantsFilter::default()
            })
            .await
            .map_err(|error| persistence("listing active grants", error))
    }

    /// Terminates older active appeals for the same access as `appeal`.
    pub(super) async fn terminate_previous_appeals(&self, appeal: &Appeal) {
        let filter = ListAppealsFilter {
            statuses: vec![AppealStatus::Active],
            account_ids: vec![appeal.account_id.clone()],
            resource_ids: vec![appeal.resource_id.clone()],
            roles: vec![appeal.role.clone()],
            created_by: None,
        };
        let previous = match self.repository.find(&filter).await {
            Ok(previous) => previous,
            Err(error) => {
                warn!(appeal_id = %appeal.id, error = %error, "failed to list previous appeals");
                return;
            }
        };

        let now = Utc::now();
        for mut previous in previous.into_iter().filter(|previous| previous.id != appeal.id) {
            if previous.terminate(now).is_err() {
                continue;
            }

            if let Err(error) = self.repository.update(&previous).await {
                warn!(
                    appeal_id = %previous.id,
                    error = %error,
                    "failed to terminate previous appeal"
                );
            }
        }
    }
}
