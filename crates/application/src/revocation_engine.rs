//! Rate-limited fan-out of grant revocations across resources.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use warden_domain::Grant;

use crate::{GrantRepository, ProviderService};

mod config;
mod limiter;


pub use config::RevocationConfig;

use limiter::RevocationLimiter;

/// Active grants of one resource, revoked in order by a single worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGroup {
    /// Shared resource id.
    pub resource_id: String,
    /// Grants of the resource.
    pub grants: Vec<Grant>,
}

/// Groups grants by resource id, ordered by resource id.
///
/// Runs on the calling task before any worker starts. The map is consumed
/// here and each group is moved into the work queue, so workers never share
/// the grouping state.
#[must_use]
pub fn group_by_resource(grants: Vec<Grant>) -> Vec<ResourceGroup> {
    let mut groups: BTreeMap<String, Vec<Grant>> = BTreeMap::new();
    for grant in grants {
        groups
            .entry(grant.resource_id.clone())
            .or_default()
            .push(grant);
    }

    groups
        .into_iter()
        .map(|(resource_id, grants)| ResourceGroup {
            resource_id,
            grants,
        })
        .collect()
}

/// Result of one grant revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Grant was revoked at the provider and persisted.
    Revoked,
    /// Revocation failed; the grant stays active.
    Failed {
        /// Failure description.
        reason: String,
    },
    /// Cancellation arrived before the grant was processed.
    Cancelled,
}

/// Grant and the result of its revocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RevocationOutcome {
    /// Revoked grant on success, unchanged grant otherwise.
    pub grant: Grant,
    /// Result.
    pub status: RevocationStatus,
}

impl RevocationOutcome {
    fn revoked(grant: Grant) -> Self {
        Self {
            grant,
            status: RevocationStatus::Revoked,
        }
    }

    fn failed(grant: Grant, reason: String) -> Self {
        Self {
            grant,
            status: RevocationStatus::Failed { reason },
        }
    }

    fn cancelled(grant: Grant) -> Self {
        Self {
            grant,
            status: RevocationStatus::Cancelled,
        }
    }
}

/// Aggregated outcomes of a bulk revocation; one entry per submitted grant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRevokeReport {
    outcomes: Vec<RevocationOutcome>,
}

impl BulkRevokeReport {
    /// Returns every outcome.
    #[must_use]
    pub fn outcomes(&self) -> &[RevocationOutcome] {
        &self.outcomes
    }

    /// Returns every processed grant.
    #[must_use]
    pub fn grants(&self) -> Vec<&Grant> {
        self.outcomes.iter().map(|outcome| &outcome.grant).collect()
    }

    /// Consumes the report into the processed grants.
    #[must_use]
    pub fn into_grants(self) -> Vec<Grant> {
        self.outcomes
            .into_iter()
            .map(|outcome| outcome.grant)
            .collect()
    }

    /// Ids of revoked grants.
    #[must_use]
    pub fn revoked_ids(&self) -> Vec<String> {
        self.ids_where(|status| matches!(status, RevocationStatus::Revoked))
    }

    /// Ids of grants whose revocation failed.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<String> {
        self.ids_where(|status| matches!(status, RevocationStatus::Failed { .. }))
    }

    /// Ids of grants skipped by cancellation.
    #[must_use]
    pub fn cancelled_ids(&self) -> Vec<String> {
        self.ids_where(|status| matches!(status, RevocationStatus::Cancelled))
    }

    /// Number of processed grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true when no grant was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn ids_where(&self, predicate: impl Fn(&RevocationStatus) -> bool) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.status))
            .map(|outcome| outcome.grant.id.clone())
            .collect()
    }
}

/// Bounded worker pool revoking resource groups under a shared rate limit.
#[derive(Clone)]
pub struct RevocationEngine {
    config: RevocationConfig,
    repository: Arc<dyn GrantRepository>,
    provider_service: Arc<dyn ProviderService>,
}

impl RevocationEngine {
    /// Creates a revocation engine.
    #[must_use]
    pub fn new(
        config: RevocationConfig,
        repository: Arc<dyn GrantRepository>,
        provider_service: Arc<dyn ProviderService>,
    ) -> Self {
        Self {
            config,
            repository,
            provider_service,
        }
    }

    /// Revokes every grant of every group and waits for all outcomes.
    ///
    /// Every submitted grant yields exactly one outcome. Cancellation is
    /// checked between grants and while waiting for a permit; grants not
    /// started by then are reported as cancelled.
    pub async fn run(
        &self,
        groups: Vec<ResourceGroup>,
        actor: &str,
        reason: &str,
        cancel: &CancellationToken,
    ) -> BulkRevokeReport {
        let submitted: HashMap<String, Grant> = groups
            .iter()
            .flat_map(|group| group.grants.iter())
            .map(|grant| (grant.id.clone(), grant.clone()))
            .collect();
        let expected = groups.iter().map(|group| group.grants.len()).sum::<usize>();
        if expected == 0 {
            return BulkRevokeReport::default();
        }

        let worker_count = self.config.max_workers.min(groups.len()).max(1);
        let queue = Arc::new(Mutex::new(VecDeque::from(groups)));
        let limiter = Arc::new(RevocationLimiter::start(&self.config, cancel));
        let (sender, mut receiver) = mpsc::channel(self.config.batch_size.max(worker_count));

        let mut workers = JoinSet::new();
        for worker_index in 0..worker_count {
            let worker = RevocationWorker {
                queue: Arc::clone(&queue),
                limiter: Arc::clone(&limiter),
                repository: Arc::clone(&self.repository),
                provider_service: Arc::clone(&self.provider_service),
                results: sender.clone(),
                actor: actor.to_owned(),
                reason: reason.to_owned(),
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run(worker_index));
        }
        drop(sender);

        let mut outcomes = Vec::with_capacity(expected);
        while outcomes.len() < expected {
            match receiver.recv().await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(join_error) = joined {
                error!(error = %join_error, "revocation worker stopped unexpectedly");
            }
        }
        drop(limiter);

        if outcomes.len() < expected {
            let reported: HashSet<String> = outcomes
                .iter()
                .map(|outcome| outcome.grant.id.clone())
                .collect();
            for (grant_id, grant) in submitted {
                if !reported.contains(&grant_id) {
                    outcomes.push(RevocationOutcome::failed(
                        grant,
                        "revocation worker stopped before reporting".to_owned(),
                    ));
                }
            }
        }

        let report = BulkRevokeReport { outcomes };
        let failed_ids = report.failed_ids();
        let cancelled_ids = report.cancelled_ids();
        info!(
            total = report.len(),
            success_ids = ?report.revoked_ids(),
            "bulk revocation finished"
        );
        if !failed_ids.is_empty() {
            warn!(failed_ids = ?failed_ids, "bulk revocation had failures");
        }
        if !cancelled_ids.is_empty() {
            warn!(cancelled_ids = ?cancelled_ids, "bulk revocation was cancelled");
        }

        report
    }
}

struct RevocationWorker {
    queue: Arc<Mutex<VecDeque<ResourceGroup>>>,
    limiter: Arc<RevocationLimiter>,
    repository: Arc<dyn GrantRepository>,
    provider_service: Arc<dyn ProviderService>,
    results: mpsc::Sender<RevocationOutcome>,
    actor: String,
    reason: String,
    cancel: CancellationToken,
}

impl RevocationWorker {
    async fn run(self, worker_index: usize) {
        loop {
            let Some(group) = self.queue.lock().await.pop_front() else {
                break;
            };

            for grant in group.grants {
                let outcome = self.revoke(grant).await;
                if self.results.send(outcome).await.is_err() {
                    warn!(worker = worker_index, "revocation results receiver dropped");
                    return;
                }
            }
        }
    }

    async fn revoke(&self, grant: Grant) -> RevocationOutcome {
        if self.cancel.is_cancelled() || !self.limiter.acquire(&self.cancel).await {
            return RevocationOutcome::cancelled(grant);
        }

        let mut revoked = grant.clone();
        if let Err(error) = revoked.revoke(&self.actor, &self.reason, Utc::now()) {
            return RevocationOutcome::failed(grant, error.to_string());
        }

        if let Err(error) = self.provider_service.revoke_access(&revoked).await {
            warn!(grant_id = %grant.id, error = %error, "failed to revoke grant in provider");
            return RevocationOutcome::failed(grant, format!("removing grant in provider: {error}"));
        }

        if let Err(error) = self.repository.update(&revoked).await {
            warn!(grant_id = %grant.id, error = %error, "failed to persist revoked grant");
            return RevocationOutcome::failed(grant, format!("updating grant record: {error}"));
        }

        RevocationOutcome::revoked(revoked)
    }
}
