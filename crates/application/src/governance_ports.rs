mod audit;
mod identity;
mod notifier;
mod provider;
mod repositories;

pub use audit::AuditLogger;
pub use identity::IdentityManager;
pub use notifier::Notifier;
pub use provider::ProviderService;
pub use repositories::{AppealRepository, GrantRepository, PolicyRepository, ResourceRepository};
