use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_application::GrantRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{Grant, ListGrantsFilter};


/// In-memory grant repository implementation.
#[derive(Debug, Default)]
pub struct InMemoryGrantRepository {
    grants: RwLock<HashMap<String, Grant>>,
}

impl InMemoryGrantRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given grants.
    #[must_use]
    pub fn with_grants(grants: Vec<Grant>) -> Self {
        Self {
            grants: RwLock::new(
                grants
                    .into_iter()
                    .map(|grant| (grant.id.clone(), grant))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn list(&self, filter: &ListGrantsFilter) -> AppResult<Vec<Grant>> {
        let grants = self.grants.read().await;

        let mut values: Vec<Grant> = grants
            .values()
            .filter(|grant| filter.matches(grant))
            .cloned()
            .collect();
        values.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(values)
    }

    async fn find_by_id(&self, grant_id: &str) -> AppResult<Option<Grant>> {
        Ok(self.grants.read().await.get(grant_id).cloned())
    }

    async fn update(&self, grant: &Grant) -> AppResult<()> {
        let mut grants = self.grants.write().await;
        let Some(stored) = grants.get_mut(&grant.id) else {
            return Err(AppError::NotFound(format!(
                "grant '{}' does not exist",
                grant.id
            )));
        };

        *stored = grant.clone();
        Ok(())
    }

    async fn bulk_upsert(&self, grants: &[Grant]) -> AppResult<()> {
        let mut stored = self.grants.write().await;
        for grant in grants {
            stored.insert(grant.id.clone(), grant.clone());
        }

        Ok(())
    }
}
