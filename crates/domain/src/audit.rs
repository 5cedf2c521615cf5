use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by governance use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when appeals are created.
    AppealBulkInsert,
    /// Emitted when an appeal is canceled.
    AppealCancel,
    /// Emitted when an approval step is approved.
    AppealApprove,
    /// Emitted when an approval step is rejected.
    AppealReject,
    /// Emitted when an approver is added to a step.
    ApproverAdd,
    /// Emitted when an approver is removed from a step.
    ApproverDelete,
    /// Emitted when a grant is revoked.
    GrantRevoke,
    /// Emitted when grants are revoked in bulk.
    GrantBulkRevoke,
    /// Emitted when a grant is updated.
    GrantUpdate,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppealBulkInsert => "appeal.bulk_insert",
            Self::AppealCancel => "appeal.cancel",
            Self::AppealApprove => "appeal.approve",
            Self::AppealReject => "appeal.reject",
            Self::ApproverAdd => "appeal.approver.add",
            Self::ApproverDelete => "appeal.approver.delete",
            Self::GrantRevoke => "grant.revoke",
            Self::GrantBulkRevoke => "grant.bulk_revoke",
            Self::GrantUpdate => "grant.update",
        }
    }
}
