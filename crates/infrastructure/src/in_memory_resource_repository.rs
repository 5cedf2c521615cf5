use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_application::ResourceRepository;
use warden_core::AppResult;
use warden_domain::Resource;

/// In-memory catalog of provider resources.
#[derive(Debug, Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<HashMap<String, Resource>>,
}

impl InMemoryResourceRepository {
    /// Creates a catalog holding the given resources.
    #[must_use]
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        Self {
            resources: RwLock::new(
                resources
                    .into_iter()
                    .map(|resource| (resource.id.clone(), resource))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn find_by_id(&self, resource_id: &str) -> AppResult<Option<Resource>> {
        Ok(self.resources.read().await.get(resource_id).cloned())
    }
}
