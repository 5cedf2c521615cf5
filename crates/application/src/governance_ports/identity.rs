use async_trait::async_trait;
use serde_json::Value;

use warden_core::AppResult;
use warden_domain::IamConfig;

/// Port to the identity provider that describes appeal creators.
#[async_trait]
pub trait IdentityManager: Send + Sync {
    /// Fetches the raw profile of a user.
    async fn fetch_user(&self, iam: &IamConfig, email: &str) -> AppResult<Value>;
}
