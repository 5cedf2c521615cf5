//! Domain entities and invariants of access governance.

#![forbid(unsafe_code)]

mod appeal;
mod approval;
mod audit;
mod duration;
mod email;
mod expression;
mod grant;
mod notification;
mod policy;
mod provider;
mod requirement;
mod resource;

pub use appeal::{Appeal, AppealOptions, AppealStatus, ApprovalAction, ListAppealsFilter};
pub use approval::{Approval, ApprovalStatus, ListApprovalsFilter};
pub use audit::AuditAction;
pub use duration::parse_access_duration;
pub use email::EmailAddress;
pub use expression::{Expression, value_at_path};
pub use grant::{Grant, GrantSource, GrantStatus, ListGrantsFilter, RevokeGrantsFilter};
pub use notification::{Notification, NotificationKind, NotificationMessage};
pub use policy::{ApprovalStepStrategy, IamConfig, Policy, PolicyConfig, PolicyInput, Step};
pub use provider::ProviderAppealConfig;
pub use requirement::{
    AdditionalAppeal, Condition, MatchCondition, Requirement, RequirementTrigger, TriggerPattern,
};
pub use resource::Resource;
