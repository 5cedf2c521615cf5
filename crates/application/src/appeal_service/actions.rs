use super::*;

use std::str::FromStr;

use tracing::info;

use warden_domain::ApprovalAction;

/// Input payload for deciding an approval step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalActionInput {
    /// Appeal identifier.
    pub appeal_id: String,
    /// Approval step name or id.
    pub approval_name: String,
    /// Deciding actor.
    pub actor: String,
    /// `approve` or `reject`.
    pub action: String,
    /// Optional decision reason.
    pub reason: Option<String>,
}

impl AppealService {
    /// Approves or rejects one approval step.
    ///
    /// Approving the last open step activates the appeal and issues its
    /// grant; rejecting a step rejects the appeal and skips the remaining
    /// steps.
    pub async fn make_action(&self, input: ApprovalActionInput) -> AppResult<Appeal> {
        if input.appeal_id.trim().is_empty() {
            return Err(GovernanceError::AppealIdEmptyParam.into());
        }
        if input.approval_name.trim().is_empty() {
            return Err(GovernanceError::ApprovalIdEmptyParam.into());
        }
        let action = ApprovalAction::from_str(input.action.trim())?;

        let mut appeal = self.get_by_id(&input.appeal_id).await?;
        appeal.status.ensure_pending()?;

        let position = appeal
            .approval_position(&input.approval_name)
            .ok_or(GovernanceError::ApprovalNotFound)?;
        for previous in &appeal.approvals[..position] {
            previous.ensure_dependency_resolved()?;
        }

        let approval = &appeal.approvals[position];
        approval.ensure_pending()?;
        if !approval.is_approver(&input.actor) {
            return Err(GovernanceError::ActionForbidden.into());
        }
        let approval_name = approval.name.clone();

        let now = Utc::now();
        let actor = input.actor.trim();
        let mut issued = None;
        match action {
            ApprovalAction::Approve => {
                appeal.approvals[position].approve(Some(actor), input.reason.clone(), now);
                let policy = self
                    .pinned_policy(&appeal.policy_id, appeal.policy_version)
                    .await?;
                self.resolver.advance(&policy, &mut appeal, now)?;
                if appeal.status == AppealStatus::Active {
                    issued = Some(self.activate(&mut appeal, &policy).await?);
                }
            }
            ApprovalAction::Reject => {
                appeal.approvals[position].reject(Some(actor), input.reason.clone(), now);
                appeal.reject(now)?;
            }
        }

        if let Err(error) = self.repository.update(&appeal).await {
            let error = persistence("updating appeal", error);
            return Err(self.withdraw_access(issued.as_slice(), error).await);
        }
        if issued.is_some() {
            self.terminate_previous_appeals(&appeal).await;
        }

        info!(
            appeal_id = %appeal.id,
            approval = %approval_name,
            action = action.as_str(),
            actor = %actor,
            status = appeal.status.as_str(),
            "approval action applied"
        );

        let audit_action = match action {
            ApprovalAction::Approve => AuditAction::AppealApprove,
            ApprovalAction::Reject => AuditAction::AppealReject,
        };
        self.audit(
            audit_action,
            json!({
                "appeal_id": appeal.id,
                "approval_name": approval_name,
                "actor": actor,
                "reason": input.reason,
            }),
        )
        .await;

        self.send_notifications(Self::state_notifications(&appeal))
            .await;

        Ok(appeal)
    }
}
