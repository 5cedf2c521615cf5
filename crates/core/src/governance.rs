use thiserror::Error;

use crate::ErrorKind;

/// Named errors raised by appeal, approval and grant operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum GovernanceError {
    /// Grant id parameter is empty.
    #[error("grant id is required")]
    EmptyIdParam,
    /// Appeal id parameter is empty.
    #[error("appeal id is required")]
    AppealIdEmptyParam,
    /// Approval id or name parameter is empty.
    #[error("approval id or name is required")]
    ApprovalIdEmptyParam,
    /// Bulk revocation filter carries no account ids.
    #[error("account_ids is required")]
    AccountIdsRequired,
    /// Owner parameter is empty.
    #[error("owner should not be empty")]
    EmptyOwner,
    /// Revocation actor is empty.
    #[error("actor should not be empty")]
    EmptyActor,

    /// Grant does not exist.
    #[error("grant not found")]
    GrantNotFound,
    /// Appeal does not exist.
    #[error("appeal not found")]
    AppealNotFound,
    /// Approval step does not exist on the appeal.
    #[error("approval not found")]
    ApprovalNotFound,
    /// Approver is not assigned to the approval step.
    #[error("approver not found")]
    ApproverNotFound,
    /// Resource does not exist.
    #[error("resource not found")]
    ResourceNotFound,
    /// Policy id is unknown.
    #[error("unable to find approval policy for specified id")]
    PolicyIdNotFound,
    /// Policy version is unknown.
    #[error("unable to find approval policy for specified version")]
    PolicyVersionNotFound,

    /// Action is neither approve nor reject.
    #[error("invalid action value")]
    ActionInvalidValue,
    /// Actor is not an approver of the step.
    #[error("user is not allowed to make action on this approval step")]
    ActionForbidden,
    /// Account differs from the creator for a user account.
    #[error("creating an appeal for another individual user is not allowed")]
    CannotCreateAppealForOtherUser,

    /// Appeal was already canceled.
    #[error("appeal already canceled")]
    AppealStatusCanceled,
    /// Appeal was already approved.
    #[error("appeal already approved")]
    AppealStatusActive,
    /// Appeal was already rejected.
    #[error("appeal already rejected")]
    AppealStatusRejected,
    /// Appeal was already terminated.
    #[error("appeal already terminated")]
    AppealStatusTerminated,
    /// Stored appeal status is not recognized.
    #[error("unrecognized appeal status")]
    AppealStatusUnrecognized,
    /// A pending appeal for the same account, resource and role exists.
    #[error("appeal with the same resource and role already exists")]
    AppealDuplicate,
    /// Account already holds active access and the provider allows no extension.
    #[error("user still has an active access")]
    AppealFoundActiveAccess,
    /// Active access expires later than the provider's extension window.
    #[error("user is not eligible for extension")]
    AppealNotEligibleForExtension,
    /// Resource was deleted.
    #[error("resource is deleted")]
    ResourceIsDeleted,

    /// An earlier approval step is still blocked.
    #[error("found previous approval step that is still blocked")]
    ApprovalDependencyIsBlocked,
    /// An earlier approval step is still pending.
    #[error("found previous approval step that is still pending")]
    ApprovalDependencyIsPending,
    /// Approval step is blocked.
    #[error("approval step is blocked")]
    ApprovalStatusBlocked,
    /// Approval step was already approved.
    #[error("approval already approved")]
    ApprovalStatusApproved,
    /// Approval step was already rejected.
    #[error("approval already rejected")]
    ApprovalStatusRejected,
    /// Approval step was skipped.
    #[error("approval already skipped")]
    ApprovalStatusSkipped,
    /// Stored approval status is not recognized.
    #[error("unrecognized approval status")]
    ApprovalStatusUnrecognized,
    /// Approver cannot be added to the step.
    #[error("unable to add a new approver")]
    UnableToAddApprover,
    /// Approver cannot be removed from the step.
    #[error("unable to remove approver")]
    UnableToDeleteApprover,

    /// Approver is not a valid email address.
    #[error("approver is not a valid email")]
    ApproverEmail,
    /// Approver expression resolved to a non-string value.
    #[error("approver expression must resolve to a string or a list of strings")]
    ApproverInvalidType,
    /// Requirement condition field has an unsupported prefix.
    #[error("condition field must start with $resource. or $appeal.")]
    InvalidConditionField,

    /// Grant is already inactive.
    #[error("grant is already inactive")]
    GrantAlreadyInactive,
}

impl GovernanceError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyIdParam
            | Self::AppealIdEmptyParam
            | Self::ApprovalIdEmptyParam
            | Self::AccountIdsRequired
            | Self::EmptyOwner
            | Self::EmptyActor
            | Self::ActionInvalidValue
            | Self::ApproverEmail
            | Self::CannotCreateAppealForOtherUser => ErrorKind::InvalidInput,
            Self::GrantNotFound
            | Self::AppealNotFound
            | Self::ApprovalNotFound
            | Self::ApproverNotFound
            | Self::ResourceNotFound => ErrorKind::NotFound,
            Self::PolicyIdNotFound
            | Self::PolicyVersionNotFound
            | Self::ApproverInvalidType
            | Self::InvalidConditionField => ErrorKind::Configuration,
            Self::ActionForbidden => ErrorKind::Forbidden,
            Self::AppealStatusCanceled
            | Self::AppealStatusActive
            | Self::AppealStatusRejected
            | Self::AppealStatusTerminated
            | Self::AppealStatusUnrecognized
            | Self::AppealDuplicate
            | Self::AppealFoundActiveAccess
            | Self::AppealNotEligibleForExtension
            | Self::ResourceIsDeleted
            | Self::ApprovalDependencyIsBlocked
            | Self::ApprovalDependencyIsPending
            | Self::ApprovalStatusBlocked
            | Self::ApprovalStatusApproved
            | Self::ApprovalStatusRejected
            | Self::ApprovalStatusSkipped
            | Self::ApprovalStatusUnrecognized
            | Self::UnableToAddApprover
            | Self::UnableToDeleteApprover
            | Self::GrantAlreadyInactive => ErrorKind::InvalidStateTransition,
        }
    }
}
