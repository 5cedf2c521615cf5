use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_application::AppealRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{Appeal, Approval, ListAppealsFilter, ListApprovalsFilter};


/// In-memory appeal repository; approvals are stored inside their appeal.
#[derive(Debug, Default)]
pub struct InMemoryAppealRepository {
    appeals: RwLock<HashMap<String, Appeal>>,
}

impl InMemoryAppealRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given appeals.
    #[must_use]
    pub fn with_appeals(appeals: Vec<Appeal>) -> Self {
        Self {
            appeals: RwLock::new(
                appeals
                    .into_iter()
                    .map(|appeal| (appeal.id.clone(), appeal))
                    .collect(),
            ),
        }
    }
}

fn sorted(mut appeals: Vec<Appeal>) -> Vec<Appeal> {
    appeals.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    appeals
}

#[async_trait]
impl AppealRepository for InMemoryAppealRepository {
    async fn find(&self, filter: &ListAppealsFilter) -> AppResult<Vec<Appeal>> {
        let appeals = self.appeals.read().await;

        Ok(sorted(
            appeals
                .values()
                .filter(|appeal| filter.matches(appeal))
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_id(&self, appeal_id: &str) -> AppResult<Option<Appeal>> {
        Ok(self.appeals.read().await.get(appeal_id).cloned())
    }

    async fn update(&self, appeal: &Appeal) -> AppResult<()> {
        let mut appeals = self.appeals.write().await;
        let Some(stored) = appeals.get_mut(&appeal.id) else {
            return Err(AppError::NotFound(format!(
                "appeal '{}' does not exist",
                appeal.id
            )));
        };

        *stored = appeal.clone();
        Ok(())
    }

    async fn bulk_upsert(&self, appeals: &[Appeal]) -> AppResult<()> {
        let mut stored = self.appeals.write().await;
        for appeal in appeals {
            stored.insert(appeal.id.clone(), appeal.clone());
        }

        Ok(())
    }

    async fn list_approvals(&self, filter: &ListApprovalsFilter) -> AppResult<Vec<Approval>> {
        let appeals = self.appeals.read().await;

        Ok(sorted(appeals.values().cloned().collect())
            .iter()
            .flat_map(|appeal| {
                appeal
                    .approvals
                    .iter()
                    .filter(|approval| filter.matches(appeal, approval))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}
