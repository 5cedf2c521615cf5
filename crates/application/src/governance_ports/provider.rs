use async_trait::async_trait;

use warden_core::AppResult;
use warden_domain::{Grant, PolicyConfig, ProviderAppealConfig, Resource};

/// Port to the external systems that hold the actual access.
///
/// Grant and revoke calls must be idempotent: repeating a call for access
/// that is already in the requested state succeeds.
#[async_trait]
pub trait ProviderService: Send + Sync {
    /// Grants access at the provider.
    async fn grant_access(&self, grant: &Grant) -> AppResult<()>;

    /// Removes access at the provider.
    async fn revoke_access(&self, grant: &Grant) -> AppResult<()>;

    /// Returns the policy the provider configuration assigns to a resource.
    async fn resolve_policy(&self, resource: &Resource) -> AppResult<PolicyConfig>;

    /// Returns the appeal settings of the provider owning a resource.
    ///
    /// `None` means the provider places no limit on re-requesting access.
    async fn appeal_config(&self, resource: &Resource) -> AppResult<Option<ProviderAppealConfig>>;
}
