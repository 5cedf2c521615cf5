use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::GovernanceError;

use crate::appeal::{Appeal, AppealStatus};
use crate::policy::PolicyConfig;

/// Lifecycle status of one approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for an approver.
    Pending,
    /// Waiting for an earlier step.
    Blocked,
    /// Approved by an approver or by its predicate.
    Approved,
    /// Rejected by an approver or by its predicate.
    Rejected,
    /// Not applicable anymore.
    Skipped,
}

impl ApprovalStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }

    /// Returns true for approved and skipped steps.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Approved | Self::Skipped)
    }
}

impl FromStr for ApprovalStatus {
    type Err = GovernanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "blocked" => Ok(Self::Blocked),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "skipped" => Ok(Self::Skipped),
            _ => Err(GovernanceError::ApprovalStatusUnrecognized),
        }
    }
}

/// One approval step instance owned by an appeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Approval identifier.
    pub id: String,
    /// Policy step name.
    pub name: String,
    /// Evaluation order.
    pub index: usize,
    /// Owning appeal.
    pub appeal_id: String,
    /// Current status.
    pub status: ApprovalStatus,
    /// Actor that decided the step, if any.
    pub actor: Option<String>,
    /// Decision reason.
    pub reason: Option<String>,
    /// Eligible approvers; empty for auto steps.
    pub approvers: Vec<String>,
    /// Pinned policy id.
    pub policy_id: String,
    /// Pinned policy version.
    pub policy_version: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Approval {
    /// Creates a blocked approval step.
    #[must_use]
    pub fn new(
        appeal_id: &str,
        name: &str,
        index: usize,
        policy: &PolicyConfig,
        approvers: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            index,
            appeal_id: appeal_id.to_owned(),
            status: ApprovalStatus::Blocked,
            actor: None,
            reason: None,
            approvers,
            policy_id: policy.id.clone(),
            policy_version: policy.version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns whether a person decides this step.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        !self.approvers.is_empty()
    }

    /// Returns whether the actor may decide this step.
    #[must_use]
    pub fn is_approver(&self, actor: &str) -> bool {
        let actor = actor.trim();
        self.approvers
            .iter()
            .any(|approver| approver.eq_ignore_ascii_case(actor))
    }

    /// Checks that a later step may be acted on given this earlier step.
    pub fn ensure_dependency_resolved(&self) -> Result<(), GovernanceError> {
        match self.status {
            ApprovalStatus::Approved | ApprovalStatus::Skipped => Ok(()),
            ApprovalStatus::Blocked => Err(GovernanceError::ApprovalDependencyIsBlocked),
            ApprovalStatus::Pending => Err(GovernanceError::ApprovalDependencyIsPending),
            ApprovalStatus::Rejected => Err(GovernanceError::AppealStatusRejected),
        }
    }

    /// Checks that this step is waiting for a decision.
    pub fn ensure_pending(&self) -> Result<(), GovernanceError> {
        match self.status {
            ApprovalStatus::Pending => Ok(()),
            ApprovalStatus::Blocked => Err(GovernanceError::ApprovalStatusBlocked),
            ApprovalStatus::Approved => Err(GovernanceError::ApprovalStatusApproved),
            ApprovalStatus::Rejected => Err(GovernanceError::ApprovalStatusRejected),
            ApprovalStatus::Skipped => Err(GovernanceError::ApprovalStatusSkipped),
        }
    }

    /// Marks the step approved.
    pub fn approve(&mut self, actor: Option<&str>, reason: Option<String>, now: DateTime<Utc>) {
        self.decide(ApprovalStatus::Approved, actor, reason, now);
    }

    /// Marks the step rejected.
    pub fn reject(&mut self, actor: Option<&str>, reason: Option<String>, now: DateTime<Utc>) {
        self.decide(ApprovalStatus::Rejected, actor, reason, now);
    }

    /// Marks the step skipped.
    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.status = ApprovalStatus::Skipped;
        self.updated_at = now;
    }

    /// Moves a blocked step to pending.
    pub fn unblock(&mut self, now: DateTime<Utc>) {
        if self.status == ApprovalStatus::Blocked {
            self.status = ApprovalStatus::Pending;
            self.updated_at = now;
        }
    }

    /// Adds an approver to a pending manual step.
    pub fn add_approver(&mut self, email: &str, now: DateTime<Utc>) -> Result<(), GovernanceError> {
        if self.status != ApprovalStatus::Pending || !self.is_manual() || self.is_approver(email) {
            return Err(GovernanceError::UnableToAddApprover);
        }

        self.approvers.push(email.to_owned());
        self.updated_at = now;
        Ok(())
    }

    /// Removes an approver from a pending manual step.
    pub fn remove_approver(
        &mut self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GovernanceError> {
        if self.status != ApprovalStatus::Pending || !self.is_manual() {
            return Err(GovernanceError::UnableToDeleteApprover);
        }

        let Some(position) = self
            .approvers
            .iter()
            .position(|approver| approver.eq_ignore_ascii_case(email.trim()))
        else {
            return Err(GovernanceError::ApproverNotFound);
        };

        if self.approvers.len() == 1 {
            return Err(GovernanceError::UnableToDeleteApprover);
        }

        self.approvers.remove(position);
        self.updated_at = now;
        Ok(())
    }

    fn decide(
        &mut self,
        status: ApprovalStatus,
        actor: Option<&str>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.actor = actor.map(str::to_owned);
        self.reason = reason.filter(|value| !value.trim().is_empty());
        self.updated_at = now;
    }
}

/// Approval listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListApprovalsFilter {
    /// Only steps this approver may decide.
    #[serde(default)]
    pub approver: Option<String>,
    /// Accepted step statuses; empty accepts all.
    #[serde(default)]
    pub statuses: Vec<ApprovalStatus>,
    /// Accepted appeal statuses; empty accepts all.
    #[serde(default)]
    pub appeal_statuses: Vec<AppealStatus>,
    /// Only steps of appeals for this account.
    #[serde(default)]
    pub account_id: Option<String>,
}

impl ListApprovalsFilter {
    /// Returns whether the step of the appeal passes the filter.
    #[must_use]
    pub fn matches(&self, appeal: &Appeal, approval: &Approval) -> bool {
        self.approver
            .as_deref()
            .is_none_or(|approver| approval.is_approver(approver))
            && (self.statuses.is_empty() || self.statuses.contains(&approval.status))
            && (self.appeal_statuses.is_empty() || self.appeal_statuses.contains(&appeal.status))
            && self
                .account_id
                .as_deref()
                .is_none_or(|account_id| appeal.account_id == account_id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use warden_core::GovernanceError;

    use super::{Approval, ApprovalStatus};
    use crate::PolicyConfig;

    fn approval(status: ApprovalStatus) -> Approval {
        let mut approval = Approval::new(
            "appeal-1",
            "review",
            0,
            &PolicyConfig {
                id: "policy".to_owned(),
                version: 1,
            },
            vec!["a@example.com".to_owned()],
            Utc::now(),
        );
        approval.status = status;
        approval
    }

    #[test]
    fn dependency_errors_follow_previous_status() {
        assert!(approval(ApprovalStatus::Approved).ensure_dependency_resolved().is_ok());
        assert!(approval(ApprovalStatus::Skipped).ensure_dependency_resolved().is_ok());
        assert_eq!(
            approval(ApprovalStatus::Pending).ensure_dependency_resolved(),
            Err(GovernanceError::ApprovalDependencyIsPending)
        );
        assert_eq!(
            approval(ApprovalStatus::Blocked).ensure_dependency_resolved(),
            Err(GovernanceError::ApprovalDependencyIsBlocked)
        );
        assert_eq!(
            approval(ApprovalStatus::Rejected).ensure_dependency_resolved(),
            Err(GovernanceError::AppealStatusRejected)
        );
    }

    #[test]
    fn approvers_are_matched_case_insensitively() {
        assert!(approval(ApprovalStatus::Pending).is_approver(" A@Example.com"));
        assert!(!approval(ApprovalStatus::Pending).is_approver("b@example.com"));
    }

    #[test]
    fn last_approver_cannot_be_removed() {
        let mut pending = approval(ApprovalStatus::Pending);
        assert_eq!(
            pending.remove_approver("a@example.com", Utc::now()),
            Err(GovernanceError::UnableToDeleteApprover)
        );
        assert_eq!(
            pending.remove_approver("z@example.com", Utc::now()),
            Err(GovernanceError::ApproverNotFound)
        );

        assert!(pending.add_approver("b@example.com", Utc::now()).is_ok());
        assert!(pending.remove_approver("a@example.com", Utc::now()).is_ok());
        assert_eq!(pending.approvers, vec!["b@example.com".to_owned()]);
    }

    #[test]
    fn approvers_cannot_change_on_decided_steps() {
        let mut approved = approval(ApprovalStatus::Approved);
        assert_eq!(
            approved.add_approver("b@example.com", Utc::now()),
            Err(GovernanceError::UnableToAddApprover)
        );
    }

    #[test]
    fn unknown_status_is_unrecognized() {
        assert_eq!(
            ApprovalStatus::from_str("done"),
            Err(GovernanceError::ApprovalStatusUnrecognized)
        );
    }
}
