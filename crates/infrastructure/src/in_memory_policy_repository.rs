use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_application::PolicyRepository;
use warden_core::{AppError, AppResult};
use warden_domain::Policy;

/// In-memory store of immutable policy versions.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<BTreeMap<(String, u32), Policy>>,
}

impl InMemoryPolicyRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn create(&self, policy: &Policy) -> AppResult<()> {
        let key = (policy.id().as_str().to_owned(), policy.version());
        let mut policies = self.policies.write().await;

        if policies.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "policy '{}' version {} already exists",
                key.0, key.1
            )));
        }

        policies.insert(key, policy.clone());
        Ok(())
    }

    async fn find_version(&self, policy_id: &str, version: u32) -> AppResult<Option<Policy>> {
        Ok(self
            .policies
            .read()
            .await
            .get(&(policy_id.to_owned(), version))
            .cloned())
    }

    async fn list_versions(&self, policy_id: &str) -> AppResult<Vec<Policy>> {
        Ok(self
            .policies
            .read()
            .await
            .iter()
            .filter_map(|((stored_id, _), policy)| (stored_id == policy_id).then_some(policy.clone()))
            .collect())
    }

    async fn list(&self) -> AppResult<Vec<Policy>> {
        Ok(self.policies.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use warden_application::PolicyRepository;
    use warden_core::AppError;
    use warden_domain::{ApprovalStepStrategy, Policy, PolicyInput, Step};

    use super::InMemoryPolicyRepository;

    fn policy(version: u32, description: &str) -> Policy {
        Policy::new(PolicyInput {
            id: "bq".to_owned(),
            version,
            description: Some(description.to_owned()),
            steps: vec![Step {
                name: "owner".to_owned(),
                description: None,
                when: None,
                strategy: ApprovalStepStrategy::Manual,
                approve_if: None,
                rejection_reason: None,
                allow_failed: false,
                approvers: vec!["owner@example.com".to_owned()],
            }],
            requirements: Vec::new(),
            iam: None,
            labels: BTreeMap::new(),
        })
        .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn versions_are_never_replaced() {
        let repository = InMemoryPolicyRepository::new();
        assert!(repository.create(&policy(1, "first")).await.is_ok());
        assert!(repository.create(&policy(2, "second")).await.is_ok());

        let duplicate = repository.create(&policy(1, "rewritten")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let versions = repository.list_versions("bq").await;
        assert!(versions.is_ok());
        let versions = versions.unwrap_or_default();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version(), 1);
        assert_eq!(versions[0].description(), Some("first"));
        assert_eq!(versions[1].version(), 2);

        let found = repository.find_version("bq", 2).await;
        assert!(matches!(found, Ok(Some(ref policy)) if policy.description() == Some("second")));
        assert!(matches!(repository.find_version("bq", 3).await, Ok(None)));
        assert!(matches!(repository.list().await, Ok(ref all) if all.len() == 2));
    }

    #[tokio::test]
    async fn unknown_policy_has_no_versions() {
        let repository = InMemoryPolicyRepository::new();

        let versions = repository.list_versions("missing").await;
        assert!(matches!(versions, Ok(ref versions) if versions.is_empty()));
    }
}
