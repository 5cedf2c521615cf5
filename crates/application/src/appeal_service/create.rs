use super::activation::IssuedAccess;
use super::*;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Map;
use tracing::info;

use warden_domain::{
    AppealOptions, EmailAddress, IamConfig, PolicyConfig, Resource, value_at_path,
};

const USER_ACCOUNT_TYPE: &str = "user";

/// Input payload for requesting access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateAppealInput {
    /// Target resource.
    pub resource_id: String,
    /// Account receiving access.
    pub account_id: String,
    /// Account kind.
    pub account_type: String,
    /// Requested role.
    pub role: String,
    /// Provider permissions implied by the role.
    pub permissions: Vec<String>,
    /// Requested access window.
    pub options: Option<AppealOptions>,
    /// Explicit policy; the provider assigned policy applies otherwise.
    pub policy: Option<PolicyConfig>,
    /// Free-form details.
    pub details: Map<String, Value>,
    /// Free-form labels.
    pub labels: BTreeMap<String, String>,
    /// Optional description.
    pub description: Option<String>,
}

type CreateFuture<'a> = Pin<Box<dyn Future<Output = AppResult<Vec<Appeal>>> + Send + 'a>>;

impl AppealService {
    /// Creates appeals, resolves their approval chains and persists them.
    ///
    /// Appeals whose chain resolves without a manual step are activated and
    /// granted before persistence.
    pub async fn create(&self, actor: &str, inputs: Vec<CreateAppealInput>) -> AppResult<Vec<Appeal>> {
        if actor.trim().is_empty() {
            return Err(invalid_input("appeal creator is required"));
        }

        let now = Utc::now();
        let mut appeals = Vec::with_capacity(inputs.len());
        let mut issued: Vec<IssuedAccess> = Vec::new();
        for input in inputs {
            match self.draft_and_activate(actor, input, now).await {
                Ok((appeal, access)) => {
                    appeals.push(appeal);
                    issued.extend(access);
                }
                Err(error) => return Err(self.withdraw_access(&issued, error).await),
            }
        }

        if let Err(error) = self.repository.bulk_upsert(&appeals).await {
            let error = persistence("inserting appeals", error);
            return Err(self.withdraw_access(&issued, error).await);
        }
        for appeal in appeals
            .iter()
            .filter(|appeal| appeal.status == AppealStatus::Active)
        {
            self.terminate_previous_appeals(appeal).await;
        }

        info!(
            actor = %actor,
            appeal_ids = ?appeals.iter().map(|appeal| appeal.id.as_str()).collect::<Vec<_>>(),
            "appeals created"
        );

        self.audit(
            AuditAction::AppealBulkInsert,
            json!({
                "actor": actor,
                "appeals": appeals.iter().map(|appeal| json!({
                    "id": appeal.id,
                    "resource_id": appeal.resource_id,
                    "account_id": appeal.account_id,
                    "role": appeal.role,
                    "status": appeal.status.as_str(),
                })).collect::<Vec<_>>(),
            }),
        )
        .await;

        let notifications = appeals
            .iter()
            .flat_map(Self::state_notifications)
            .collect();
        self.send_notifications(notifications).await;

        Ok(appeals)
    }

    pub(super) fn create_boxed<'a>(
        &'a self,
        actor: &'a str,
        inputs: Vec<CreateAppealInput>,
    ) -> CreateFuture<'a> {
        Box::pin(self.create(actor, inputs))
    }

    async fn draft_and_activate(
        &self,
        actor: &str,
        input: CreateAppealInput,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<(Appeal, Option<IssuedAccess>)> {
        let (mut appeal, policy) = self.draft(actor, input, now).await?;
        if appeal.status != AppealStatus::Active {
            return Ok((appeal, None));
        }

        let access = self.activate(&mut appeal, &policy).await?;
        Ok((appeal, Some(access)))
    }

    async fn draft(
        &self,
        actor: &str,
        input: CreateAppealInput,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<(Appeal, Policy)> {
        validate_input(actor, &input)?;
        self.ensure_no_pending_duplicate(&input).await?;

        let resource = self
            .resource_repository
            .find_by_id(&input.resource_id)
            .await
            .map_err(|error| persistence("getting resource", error))?
            .ok_or(GovernanceError::ResourceNotFound)?;
        if resource.is_deleted {
            return Err(GovernanceError::ResourceIsDeleted.into());
        }
        self.ensure_extension_allowed(&input, &resource, now).await?;

        let policy_config = match input.policy {
            Some(policy_config) => policy_config,
            None => self
                .provider_service
                .resolve_policy(&resource)
                .await
                .map_err(|error| {
                    AppError::Upstream(format!(
                        "resolving policy for resource '{}': {error}",
                        resource.id
                    ))
                })?,
        };
        let policy = self
            .pinned_policy(&policy_config.id, policy_config.version)
            .await?;

        let creator = match policy.iam() {
            Some(iam) => self.fetch_creator(iam, actor).await?,
            None => None,
        };

        let mut appeal = Appeal {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: input.resource_id,
            policy_id: policy_config.id,
            policy_version: policy_config.version,
            status: AppealStatus::Pending,
            account_id: input.account_id,
            account_type: input.account_type,
            created_by: actor.to_owned(),
            creator,
            role: input.role,
            permissions: input.permissions,
            options: input.options,
            details: input.details,
            labels: input.labels,
            description: input.description,
            resource: Some(resource),
            approvals: Vec::new(),
            grant: None,
            created_at: now,
            updated_at: now,
        };

        self.resolver.resolve(&policy, &mut appeal, now)?;
        Ok((appeal, policy))
    }

    async fn ensure_no_pending_duplicate(&self, input: &CreateAppealInput) -> AppResult<()> {
        let pending = self
            .repository
            .find(&ListAppealsFilter {
                statuses: vec![AppealStatus::Pending],
                account_ids: vec![input.account_id.clone()],
                resource_ids: vec![input.resource_id.clone()],
                roles: vec![input.role.clone()],
                created_by: None,
            })
            .await
            .map_err(|error| persistence("listing pending appeals", error))?;

        if pending.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::AppealDuplicate.into())
        }
    }

    async fn ensure_extension_allowed(
        &self,
        input: &CreateAppealInput,
        resource: &Resource,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<()> {
        let active = self
            .repository
            .find(&ListAppealsFilter {
                statuses: vec![AppealStatus::Active],
                account_ids: vec![input.account_id.clone()],
                resource_ids: vec![input.resource_id.clone()],
                roles: vec![input.role.clone()],
                created_by: None,
            })
            .await
            .map_err(|error| persistence("listing active appeals", error))?;
        if active.is_empty() {
            return Ok(());
        }

        let config = self
            .provider_service
            .appeal_config(resource)
            .await
            .map_err(|error| {
                AppError::Upstream(format!(
                    "getting appeal config for resource '{}': {error}",
                    resource.id
                ))
            })?;
        let Some(config) = config else {
            return Ok(());
        };

        active
            .iter()
            .try_for_each(|appeal| config.ensure_extension_allowed(appeal, now))
    }

    async fn fetch_creator(&self, iam: &IamConfig, actor: &str) -> AppResult<Option<Value>> {
        let Some(identity_manager) = &self.identity_manager else {
            return Ok(None);
        };

        let profile = identity_manager.fetch_user(iam, actor).await.map_err(|error| {
            AppError::Upstream(format!("fetching creator's user info: {error}"))
        })?;
        if iam.schema.is_empty() {
            return Ok(Some(profile));
        }

        let mut creator = Map::new();
        for (attribute, path) in &iam.schema {
            if let Some(value) = value_at_path(&profile, path)? {
                creator.insert(attribute.clone(), value.clone());
            }
        }

        Ok(Some(Value::Object(creator)))
    }
}

fn validate_input(actor: &str, input: &CreateAppealInput) -> AppResult<()> {
    for (value, field) in [
        (&input.resource_id, "resource_id"),
        (&input.account_id, "account_id"),
        (&input.account_type, "account_type"),
        (&input.role, "role"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }

    if let Some(options) = &input.options {
        options.validate()?;
    }

    if input.account_type == USER_ACCOUNT_TYPE {
        let account = EmailAddress::new(input.account_id.as_str())?;
        if !account.as_str().eq_ignore_ascii_case(actor.trim()) {
            return Err(GovernanceError::CannotCreateAppealForOtherUser.into());
        }
    }

    Ok(())
}
