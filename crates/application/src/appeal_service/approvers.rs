use super::*;

use warden_domain::EmailAddress;

impl AppealService {
    /// Adds an approver to a pending approval step.
    pub async fn add_approver(
        &self,
        appeal_id: &str,
        approval_id: &str,
        email: &str,
    ) -> AppResult<Appeal> {
        let (mut appeal, position, email) =
            self.approver_target(appeal_id, approval_id, email).await?;
        appeal.approvals[position].add_approver(&email, Utc::now())?;

        self.repository
            .update(&appeal)
            .await
            .map_err(|error| persistence("updating approval", error))?;

        let approval = &appeal.approvals[position];
        self.audit(
            AuditAction::ApproverAdd,
            json!({
                "appeal_id": appeal.id,
                "approval_id": approval.id,
                "approval_name": approval.name,
                "approver": email,
            }),
        )
        .await;

        self.send_notifications(vec![Notification::for_appeal(
            &email,
            NotificationKind::ApproverNotification,
            &appeal,
        )])
        .await;

        Ok(appeal)
    }

    /// Removes an approver from a pending approval step.
    pub async fn delete_approver(
        &self,
        appeal_id: &str,
        approval_id: &str,
        email: &str,
    ) -> AppResult<Appeal> {
        let (mut appeal, position, email) =
            self.approver_target(appeal_id, approval_id, email).await?;
        appeal.approvals[position].remove_approver(&email, Utc::now())?;

        self.repository
            .update(&appeal)
            .await
            .map_err(|error| persistence("updating approval", error))?;

        let approval = &appeal.approvals[position];
        self.audit(
            AuditAction::ApproverDelete,
            json!({
                "appeal_id": appeal.id,
                "approval_id": approval.id,
                "approval_name": approval.name,
                "approver": email,
            }),
        )
        .await;

        Ok(appeal)
    }

    async fn approver_target(
        &self,
        appeal_id: &str,
        approval_id: &str,
        email: &str,
    ) -> AppResult<(Appeal, usize, String)> {
        if appeal_id.trim().is_empty() {
            return Err(GovernanceError::AppealIdEmptyParam.into());
        }
        if approval_id.trim().is_empty() {
            return Err(GovernanceError::ApprovalIdEmptyParam.into());
        }
        let email = EmailAddress::new(email).map_err(|_| GovernanceError::ApproverEmail)?;

        let appeal = self.get_by_id(appeal_id).await?;
        appeal.status.ensure_pending()?;

        let position = appeal
            .approval_position(approval_id)
            .ok_or(GovernanceError::ApprovalNotFound)?;

        Ok((appeal, position, email.into()))
    }
}
