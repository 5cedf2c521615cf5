//! Application services and ports.

#![forbid(unsafe_code)]

mod appeal_service;
mod approval_resolver;
mod governance_ports;
mod grant_service;
mod revocation_engine;

#[cfg(test)]
mod test_support;

pub use appeal_service::{
    AppealService, AppealServicePorts, ApprovalActionInput, CreateAppealInput,
};
pub use approval_resolver::ApprovalResolver;
pub use governance_ports::{
    AppealRepository, AuditLogger, GrantRepository, IdentityManager, Notifier, PolicyRepository,
    ProviderService, ResourceRepository,
};
pub use grant_service::{ExpirationReminderSummary, GrantService, RevokeOptions};
pub use revocation_engine::{
    BulkRevokeReport, ResourceGroup, RevocationConfig, RevocationEngine, RevocationOutcome,
    RevocationStatus, group_by_resource,
};
