//! In-process fakes shared by service tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use warden_core::{AppError, AppResult};
use warden_domain::{
    Appeal, AppealStatus, Approval, ApprovalStepStrategy, AuditAction, Expression, Grant, GrantSource,
    GrantStatus, IamConfig, ListAppealsFilter, ListApprovalsFilter, ListGrantsFilter,
    Notification, Policy, PolicyConfig, PolicyInput, ProviderAppealConfig, Requirement, Resource,
    Step, TriggerPattern,
};

use crate::{
    AppealRepository, AppealService, AppealServicePorts, AuditLogger, GrantRepository,
    GrantService, IdentityManager, Notifier, PolicyRepository, ProviderService,
    ResourceRepository,
};

#[derive(Default)]
pub(crate) struct FakeGrantRepository {
    pub(crate) grants: Mutex<Vec<Grant>>,
    pub(crate) update_calls: Mutex<usize>,
    pub(crate) list_calls: Mutex<usize>,
    pub(crate) find_calls: Mutex<usize>,
    pub(crate) fail_updates_from: Option<usize>,
    pub(crate) failing_grant_ids: HashSet<String>,
    pub(crate) fail_bulk_upsert: bool,
}

impl FakeGrantRepository {
    pub(crate) fn with_grants(grants: Vec<Grant>) -> Self {
        Self {
            grants: Mutex::new(grants),
            ..Self::default()
        }
    }

    pub(crate) async fn stored(&self, grant_id: &str) -> Option<Grant> {
        self.grants
            .lock()
            .await
            .iter()
            .find(|grant| grant.id == grant_id)
            .cloned()
    }
}

#[async_trait]
impl GrantRepository for FakeGrantRepository {
    async fn list(&self, filter: &ListGrantsFilter) -> AppResult<Vec<Grant>> {
        *self.list_calls.lock().await += 1;
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| filter.matches(grant))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, grant_id: &str) -> AppResult<Option<Grant>> {
        *self.find_calls.lock().await += 1;
        Ok(self.stored(grant_id).await)
    }

    async fn update(&self, grant: &Grant) -> AppResult<()> {
        let call = {
            let mut calls = self.update_calls.lock().await;
            *calls += 1;
            *calls - 1
        };
        if self.fail_updates_from.is_some_and(|from| call >= from)
            || self.failing_grant_ids.contains(&grant.id)
        {
            return Err(AppError::Persistence("grant store unavailable".to_owned()));
        }

        let mut grants = self.grants.lock().await;
        match grants.iter_mut().find(|stored| stored.id == grant.id) {
            Some(stored) => *stored = grant.clone(),
            None => return Err(AppError::NotFound(format!("grant '{}'", grant.id))),
        }
        Ok(())
    }

    async fn bulk_upsert(&self, grants: &[Grant]) -> AppResult<()> {
        if self.fail_bulk_upsert {
            return Err(AppError::Persistence("grant store unavailable".to_owned()));
        }

        let mut stored = self.grants.lock().await;
        for grant in grants {
            match stored.iter_mut().find(|existing| existing.id == grant.id) {
                Some(existing) => *existing = grant.clone(),
                None => stored.push(grant.clone()),
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeProviderService {
    pub(crate) granted: Mutex<Vec<String>>,
    pub(crate) revoked: Mutex<Vec<String>>,
    pub(crate) failing_revokes: HashSet<String>,
    pub(crate) fail_revokes: bool,
    pub(crate) fail_grant_access: bool,
    pub(crate) default_policy: Option<PolicyConfig>,
    pub(crate) appeal_config: Option<ProviderAppealConfig>,
    pub(crate) revoke_delay: Option<Duration>,
    pub(crate) cancel_after_revokes: Option<(usize, CancellationToken)>,
    pub(crate) in_flight: Mutex<HashMap<String, usize>>,
    pub(crate) overlapping_resources: Mutex<HashSet<String>>,
}

impl FakeProviderService {
    pub(crate) fn with_policy(policy: PolicyConfig) -> Self {
        Self {
            default_policy: Some(policy),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProviderService for FakeProviderService {
    async fn grant_access(&self, grant: &Grant) -> AppResult<()> {
        if self.fail_grant_access {
            return Err(AppError::Upstream("provider unreachable".to_owned()));
        }

        self.granted.lock().await.push(grant.id.clone());
        Ok(())
    }

    async fn revoke_access(&self, grant: &Grant) -> AppResult<()> {
        {
            let mut in_flight = self.in_flight.lock().await;
            let count = in_flight.entry(grant.resource_id.clone()).or_default();
            *count += 1;
            if *count > 1 {
                self.overlapping_resources
                    .lock()
                    .await
                    .insert(grant.resource_id.clone());
            }
        }

        if let Some(delay) = self.revoke_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(count) = self.in_flight.lock().await.get_mut(&grant.resource_id) {
            *count -= 1;
        }

        if self.fail_revokes || self.failing_revokes.contains(&grant.id) {
            return Err(AppError::Upstream("provider rejected revoke".to_owned()));
        }

        let mut revoked = self.revoked.lock().await;
        revoked.push(grant.id.clone());
        if let Some((after, cancel)) = &self.cancel_after_revokes
            && revoked.len() >= *after
        {
            cancel.cancel();
        }
        Ok(())
    }

    async fn resolve_policy(&self, resource: &Resource) -> AppResult<PolicyConfig> {
        self.default_policy.clone().ok_or_else(|| {
            AppError::Upstream(format!("no policy configured for '{}'", resource.id))
        })
    }

    async fn appeal_config(&self, _resource: &Resource) -> AppResult<Option<ProviderAppealConfig>> {
        Ok(self.appeal_config.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifier {
    pub(crate) sent: Mutex<Vec<Notification>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, notifications: Vec<Notification>) -> Vec<AppError> {
        if self.fail {
            return notifications
                .iter()
                .map(|notification| {
                    AppError::Upstream(format!("cannot reach {}", notification.user))
                })
                .collect();
        }

        self.sent.lock().await.extend(notifications);
        Vec::new()
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditLogger {
    pub(crate) entries: Mutex<Vec<(AuditAction, Value)>>,
}

impl FakeAuditLogger {
    pub(crate) async fn actions(&self) -> Vec<AuditAction> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(action, _)| *action)
            .collect()
    }
}

#[async_trait]
impl AuditLogger for FakeAuditLogger {
    async fn log(&self, action: AuditAction, data: Value) -> AppResult<()> {
        self.entries.lock().await.push((action, data));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAppealRepository {
    pub(crate) appeals: Mutex<Vec<Appeal>>,
    pub(crate) fail_writes: AtomicBool,
}

impl FakeAppealRepository {
    pub(crate) async fn stored(&self, appeal_id: &str) -> Option<Appeal> {
        self.appeals
            .lock()
            .await
            .iter()
            .find(|appeal| appeal.id == appeal_id)
            .cloned()
    }

    fn ensure_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("appeal store unavailable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl AppealRepository for FakeAppealRepository {
    async fn find(&self, filter: &ListAppealsFilter) -> AppResult<Vec<Appeal>> {
        Ok(self
            .appeals
            .lock()
            .await
            .iter()
            .filter(|appeal| filter.matches(appeal))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, appeal_id: &str) -> AppResult<Option<Appeal>> {
        Ok(self.stored(appeal_id).await)
    }

    async fn update(&self, appeal: &Appeal) -> AppResult<()> {
        self.ensure_writable()?;
        let mut appeals = self.appeals.lock().await;
        match appeals.iter_mut().find(|stored| stored.id == appeal.id) {
            Some(stored) => *stored = appeal.clone(),
            None => return Err(AppError::NotFound(format!("appeal '{}'", appeal.id))),
        }
        Ok(())
    }

    async fn bulk_upsert(&self, appeals: &[Appeal]) -> AppResult<()> {
        self.ensure_writable()?;
        let mut stored = self.appeals.lock().await;
        for appeal in appeals {
            match stored.iter_mut().find(|existing| existing.id == appeal.id) {
                Some(existing) => *existing = appeal.clone(),
                None => stored.push(appeal.clone()),
            }
        }
        Ok(())
    }

    async fn list_approvals(&self, filter: &ListApprovalsFilter) -> AppResult<Vec<Approval>> {
        Ok(self
            .appeals
            .lock()
            .await
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

#[derive(Default)]
pub(crate) struct FakePolicyRepository {
    pub(crate) policies: Mutex<Vec<Policy>>,
}

#[async_trait]
impl PolicyRepository for FakePolicyRepository {
    async fn create(&self, policy: &Policy) -> AppResult<()> {
        self.policies.lock().await.push(policy.clone());
        Ok(())
    }

    async fn find_version(&self, policy_id: &str, version: u32) -> AppResult<Option<Policy>> {
        Ok(self
            .policies
            .lock()
            .await
            .iter()
            .find(|policy| policy.id().as_str() == policy_id && policy.version() == version)
            .cloned())
    }

    async fn list_versions(&self, policy_id: &str) -> AppResult<Vec<Policy>> {
        Ok(self
            .policies
            .lock()
            .await
            .iter()
            .filter(|policy| policy.id().as_str() == policy_id)
            .cloned()
            .collect())
    }

    async fn list(&self) -> AppResult<Vec<Policy>> {
        Ok(self.policies.lock().await.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeResourceRepository {
    pub(crate) resources: Mutex<Vec<Resource>>,
}

#[async_trait]
impl ResourceRepository for FakeResourceRepository {
    async fn find_by_id(&self, resource_id: &str) -> AppResult<Option<Resource>> {
        Ok(self
            .resources
            .lock()
            .await
            .iter()
            .find(|resource| resource.id == resource_id)
            .cloned())
    }
}

pub(crate) struct FakeIdentityManager {
    pub(crate) profile: Value,
}

#[async_trait]
impl IdentityManager for FakeIdentityManager {
    async fn fetch_user(&self, _iam: &IamConfig, _email: &str) -> AppResult<Value> {
        Ok(self.profile.clone())
    }
}

pub(crate) fn grant(id: &str, resource_id: &str, account_id: &str) -> Grant {
    let now = Utc::now();
    Grant {
        id: id.to_owned(),
        status: GrantStatus::Active,
        status_in_provider: Some(GrantStatus::Active),
        account_id: account_id.to_owned(),
        account_type: "user".to_owned(),
        resource_id: resource_id.to_owned(),
        role: "viewer".to_owned(),
        permissions: vec!["read".to_owned()],
        is_permanent: true,
        expiration_date: None,
        appeal_id: None,
        source: GrantSource::Appeal,
        revoked_by: None,
        revoked_at: None,
        revoke_reason: None,
        created_by: account_id.to_owned(),
        owner: account_id.to_owned(),
        resource: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn resource(id: &str) -> Resource {
    Resource {
        id: id.to_owned(),
        provider_type: "bigquery".to_owned(),
        provider_urn: "bq-main".to_owned(),
        resource_type: "dataset".to_owned(),
        urn: format!("project:{id}"),
        name: id.to_owned(),
        details: Map::new(),
        labels: BTreeMap::new(),
        is_deleted: false,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn pending_appeal(resource: Resource, account_id: &str) -> Appeal {
    let now = Utc::now();
    Appeal {
        id: "appeal-1".to_owned(),
        resource_id: resource.id.clone(),
        policy_id: String::new(),
        policy_version: 0,
        status: AppealStatus::Pending,
        account_id: account_id.to_owned(),
        account_type: "user".to_owned(),
        created_by: account_id.to_owned(),
        creator: None,
        role: "viewer".to_owned(),
        permissions: vec!["read".to_owned()],
        options: None,
        details: Map::new(),
        labels: BTreeMap::new(),
        description: None,
        resource: Some(resource),
        approvals: Vec::new(),
        grant: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn trigger_pattern(source: &str) -> TriggerPattern {
    TriggerPattern::new(source).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn manual_step(name: &str, approvers: &[&str]) -> Step {
    Step {
        name: name.to_owned(),
        description: None,
        when: None,
        strategy: ApprovalStepStrategy::Manual,
        approve_if: None,
        rejection_reason: None,
        allow_failed: false,
        approvers: approvers.iter().map(|approver| (*approver).to_owned()).collect(),
    }
}

pub(crate) fn auto_step(name: &str, approve_if: Expression, allow_failed: bool) -> Step {
    Step {
        name: name.to_owned(),
        description: None,
        when: None,
        strategy: ApprovalStepStrategy::Auto,
        approve_if: Some(approve_if),
        rejection_reason: Some(format!("{name} failed")),
        allow_failed,
        approvers: Vec::new(),
    }
}

pub(crate) fn policy(id: &str, steps: Vec<Step>, requirements: Vec<Requirement>) -> Policy {
    Policy::new(PolicyInput {
        id: id.to_owned(),
        version: 1,
        description: None,
        steps,
        requirements,
        iam: None,
        labels: BTreeMap::new(),
    })
    .unwrap_or_else(|_| unreachable!())
}

pub(crate) struct AppealHarness {
    pub(crate) service: AppealService,
    pub(crate) appeals: Arc<FakeAppealRepository>,
    pub(crate) grants: Arc<FakeGrantRepository>,
    pub(crate) provider: Arc<FakeProviderService>,
    pub(crate) notifier: Arc<FakeNotifier>,
    pub(crate) audit: Arc<FakeAuditLogger>,
}

impl AppealHarness {
    pub(crate) fn with_ports(
        policies: Vec<Policy>,
        resources: Vec<Resource>,
        grants: FakeGrantRepository,
        provider: FakeProviderService,
    ) -> Self {
        let appeals = Arc::new(FakeAppealRepository::default());
        let grants = Arc::new(grants);
        let provider = Arc::new(provider);
        let notifier = Arc::new(FakeNotifier::default());
        let audit = Arc::new(FakeAuditLogger::default());

        let grant_service = GrantService::new(
            grants.clone(),
            provider.clone(),
            notifier.clone(),
            audit.clone(),
        );
        let service = AppealService::new(
            AppealServicePorts {
                appeals: appeals.clone(),
                grants: grants.clone(),
                policies: Arc::new(FakePolicyRepository {
                    policies: Mutex::new(policies),
                }),
                resources: Arc::new(FakeResourceRepository {
                    resources: Mutex::new(resources),
                }),
                provider_service: provider.clone(),
                notifier: notifier.clone(),
                audit_logger: audit.clone(),
            },
            grant_service,
        );

        Self {
            service,
            appeals,
            grants,
            provider,
            notifier,
            audit,
        }
    }
}
