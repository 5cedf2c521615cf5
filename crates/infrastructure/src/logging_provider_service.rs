//! Provider adapter for development. Logs access changes to tracing output.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use warden_application::ProviderService;
use warden_core::{AppError, AppResult};
use warden_domain::{Grant, PolicyConfig, ProviderAppealConfig, Resource};

/// Access change recorded by [`LoggingProviderService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// Access was granted.
    Grant {
        /// Grant identifier.
        grant_id: String,
    },
    /// Access was removed.
    Revoke {
        /// Grant identifier.
        grant_id: String,
    },
}

/// Development provider that records calls instead of reaching a real system.
#[derive(Debug, Default)]
pub struct LoggingProviderService {
    resource_policies: HashMap<String, PolicyConfig>,
    default_policy: Option<PolicyConfig>,
    appeal_config: Option<ProviderAppealConfig>,
    calls: RwLock<Vec<ProviderCall>>,
}

impl LoggingProviderService {
    /// Creates a provider without policy assignments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns policies to resource ids.
    #[must_use]
    pub fn with_resource_policies(mut self, resource_policies: HashMap<String, PolicyConfig>) -> Self {
        self.resource_policies = resource_policies;
        self
    }

    /// Assigns the policy used for resources without an explicit assignment.
    #[must_use]
    pub fn with_default_policy(mut self, default_policy: Option<PolicyConfig>) -> Self {
        self.default_policy = default_policy;
        self
    }

    /// Sets the appeal settings reported for every resource.
    #[must_use]
    pub fn with_appeal_config(mut self, appeal_config: Option<ProviderAppealConfig>) -> Self {
        self.appeal_config = appeal_config;
        self
    }

    /// Returns every recorded call in order.
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ProviderService for LoggingProviderService {
    async fn grant_access(&self, grant: &Grant) -> AppResult<()> {
        info!(
            grant_id = %grant.id,
            account_id = %grant.account_id,
            resource_id = %grant.resource_id,
            role = %grant.role,
            "provider access granted"
        );
        self.calls.write().await.push(ProviderCall::Grant {
            grant_id: grant.id.clone(),
        });

        Ok(())
    }

    async fn revoke_access(&self, grant: &Grant) -> AppResult<()> {
        info!(
            grant_id = %grant.id,
            account_id = %grant.account_id,
            resource_id = %grant.resource_id,
            role = %grant.role,
            "provider access revoked"
        );
        self.calls.write().await.push(ProviderCall::Revoke {
            grant_id: grant.id.clone(),
        });

        Ok(())
    }

    async fn resolve_policy(&self, resource: &Resource) -> AppResult<PolicyConfig> {
        self.resource_policies
            .get(&resource.id)
            .or(self.default_policy.as_ref())
            .cloned()
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no policy assigned to resource '{}' of provider '{}'",
                    resource.id, resource.provider_urn
                ))
            })
    }

    async fn appeal_config(&self, _resource: &Resource) -> AppResult<Option<ProviderAppealConfig>> {
        Ok(self.appeal_config.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use serde_json::Map;
    use warden_application::ProviderService;
    use warden_core::AppError;
    use warden_domain::{PolicyConfig, ProviderAppealConfig, Resource};

    use super::LoggingProviderService;

    fn resource(id: &str) -> Resource {
        Resource {
            id: id.to_owned(),
            provider_type: "gcs".to_owned(),
            provider_urn: "gcs-main".to_owned(),
            resource_type: "bucket".to_owned(),
            urn: format!("gs://{id}"),
            name: id.to_owned(),
            details: Map::new(),
            labels: BTreeMap::new(),
            is_deleted: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn policy(id: &str) -> PolicyConfig {
        PolicyConfig {
            id: id.to_owned(),
            version: 1,
        }
    }

    #[tokio::test]
    async fn resource_assignment_wins_over_default() {
        let provider = LoggingProviderService::new()
            .with_resource_policies(HashMap::from([("logs".to_owned(), policy("restricted"))]))
            .with_default_policy(Some(policy("standard")));

        let assigned = provider.resolve_policy(&resource("logs")).await;
        assert!(matches!(assigned, Ok(ref config) if config.id == "restricted"));

        let fallback = provider.resolve_policy(&resource("assets")).await;
        assert!(matches!(fallback, Ok(ref config) if config.id == "standard"));
    }

    #[tokio::test]
    async fn missing_assignment_is_a_configuration_error() {
        let provider = LoggingProviderService::new();

        let result = provider.resolve_policy(&resource("logs")).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn appeal_config_is_reported_for_every_resource() {
        let provider = LoggingProviderService::new().with_appeal_config(Some(ProviderAppealConfig {
            allow_active_access_extension_in: Some("24h".to_owned()),
        }));

        let config = provider.appeal_config(&resource("logs")).await;
        assert!(matches!(
            config,
            Ok(Some(ref config)) if config.allow_active_access_extension_in.as_deref() == Some("24h")
        ));

        let unset = LoggingProviderService::new().appeal_config(&resource("logs")).await;
        assert!(matches!(unset, Ok(None)));
    }
}
