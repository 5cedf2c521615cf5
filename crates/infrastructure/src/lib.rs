//! Infrastructure adapters for governance ports.

#![forbid(unsafe_code)]

mod governance_seed;
mod in_memory_appeal_repository;
mod in_memory_grant_repository;
mod in_memory_policy_repository;
mod in_memory_resource_repository;
mod logging_provider_service;
mod tracing_audit_logger;
mod tracing_notifier;

pub use governance_seed::{GovernanceSeed, SeededStores};
pub use in_memory_appeal_repository::InMemoryAppealRepository;
pub use in_memory_grant_repository::InMemoryGrantRepository;
pub use in_memory_policy_repository::InMemoryPolicyRepository;
pub use in_memory_resource_repository::InMemoryResourceRepository;
pub use logging_provider_service::{LoggingProviderService, ProviderCall};
pub use tracing_audit_logger::TracingAuditLogger;
pub use tracing_notifier::TracingNotifier;
