//! JSON seed data for in-memory governance stores.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use warden_application::PolicyRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{Appeal, Grant, Policy, PolicyConfig, ProviderAppealConfig, Resource};

use crate::{
    InMemoryAppealRepository, InMemoryGrantRepository, InMemoryPolicyRepository,
    InMemoryResourceRepository, LoggingProviderService,
};

/// Initial contents of the in-memory stores.
#[derive(Debug, Default, Deserialize)]
pub struct GovernanceSeed {
    /// Policy versions; validated on load.
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Provider resources.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Existing grants.
    #[serde(default)]
    pub grants: Vec<Grant>,
    /// Existing appeals.
    #[serde(default)]
    pub appeals: Vec<Appeal>,
    /// Policy assignment per resource id.
    #[serde(default)]
    pub resource_policies: HashMap<String, PolicyConfig>,
    /// Policy for resources without an assignment.
    #[serde(default)]
    pub default_policy: Option<PolicyConfig>,
    /// Provider appeal settings applied to every resource.
    #[serde(default)]
    pub appeal_config: Option<ProviderAppealConfig>,
}

/// In-memory adapters filled from a [`GovernanceSeed`].
#[derive(Debug)]
pub struct SeededStores {
    /// Grant store.
    pub grants: InMemoryGrantRepository,
    /// Appeal store.
    pub appeals: InMemoryAppealRepository,
    /// Policy store.
    pub policies: InMemoryPolicyRepository,
    /// Resource catalog.
    pub resources: InMemoryResourceRepository,
    /// Provider adapter with the seeded policy assignments.
    pub provider: LoggingProviderService,
}

impl GovernanceSeed {
    /// Parses seed JSON.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw)
            .map_err(|error| AppError::Validation(format!("invalid governance seed: {error}")))
    }

    /// Reads and parses a seed file.
    pub async fn load(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::Configuration(format!(
                "failed to read governance seed '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_json(&raw)
    }

    /// Builds the in-memory stores.
    pub async fn into_stores(self) -> AppResult<SeededStores> {
        let policies = InMemoryPolicyRepository::new();
        for policy in &self.policies {
            policies.create(policy).await?;
        }

        Ok(SeededStores {
            grants: InMemoryGrantRepository::with_grants(self.grants),
            appeals: InMemoryAppealRepository::with_appeals(self.appeals),
            policies,
            resources: InMemoryResourceRepository::with_resources(self.resources),
            provider: LoggingProviderService::new()
                .with_resource_policies(self.resource_policies)
                .with_default_policy(self.default_policy)
                .with_appeal_config(self.appeal_config),
        })
    }
}
