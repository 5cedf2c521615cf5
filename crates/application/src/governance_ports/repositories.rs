use async_trait::async_trait;

use warden_core::AppResult;
use warden_domain::{
    Appeal, Approval, Grant, ListAppealsFilter, ListApprovalsFilter, ListGrantsFilter, Policy,
    Resource,
};

/// Repository port for grant persistence.
///
/// Implementations are shared by concurrent revocation workers.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists grants matching the filter.
    async fn list(&self, filter: &ListGrantsFilter) -> AppResult<Vec<Grant>>;

    /// Finds one grant by id.
    async fn find_by_id(&self, grant_id: &str) -> AppResult<Option<Grant>>;

    /// Replaces an existing grant.
    async fn update(&self, grant: &Grant) -> AppResult<()>;

    /// Inserts or replaces grants in one batch.
    async fn bulk_upsert(&self, grants: &[Grant]) -> AppResult<()>;
}

/// Repository port for appeals and their embedded approvals.
#[async_trait]
pub trait AppealRepository: Send + Sync {
    /// Lists appeals matching the filter.
    async fn find(&self, filter: &ListAppealsFilter) -> AppResult<Vec<Appeal>>;

    /// Finds one appeal by id.
    async fn find_by_id(&self, appeal_id: &str) -> AppResult<Option<Appeal>>;

    /// Replaces an existing appeal and its approvals.
    async fn update(&self, appeal: &Appeal) -> AppResult<()>;

    /// Inserts or replaces appeals in one batch.
    async fn bulk_upsert(&self, appeals: &[Appeal]) -> AppResult<()>;

    /// Lists approvals matching the filter.
    async fn list_approvals(&self, filter: &ListApprovalsFilter) -> AppResult<Vec<Approval>>;
}

/// Repository port for immutable policy versions.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Stores a new policy version; existing versions are never replaced.
    async fn create(&self, policy: &Policy) -> AppResult<()>;

    /// Finds one policy version.
    async fn find_version(&self, policy_id: &str, version: u32) -> AppResult<Option<Policy>>;

    /// Lists every stored version of one policy, oldest first.
    async fn list_versions(&self, policy_id: &str) -> AppResult<Vec<Policy>>;

    /// Lists every stored policy version.
    async fn list(&self) -> AppResult<Vec<Policy>>;
}

/// Repository port for provider resources.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Finds one resource by id.
    async fn find_by_id(&self, resource_id: &str) -> AppResult<Option<Resource>>;
}
