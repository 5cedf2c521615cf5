use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use warden_core::{AppError, AppResult, GovernanceError};

use crate::approval::{Approval, ApprovalStatus};
use crate::duration::parse_access_duration;
use crate::grant::{Grant, GrantSource, GrantStatus};
use crate::resource::Resource;

/// Lifecycle status of an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    /// Waiting for approvals.
    Pending,
    /// Fully approved; access is granted.
    #[serde(alias = "approved")]
    Active,
    /// Rejected by an approval step.
    Rejected,
    /// Superseded or ended after activation.
    Terminated,
    /// Canceled by the requester.
    Canceled,
}

impl AppealStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Terminated => "terminated",
            Self::Canceled => "canceled",
        }
    }

    /// Checks that the appeal still accepts actions.
    pub fn ensure_pending(&self) -> Result<(), GovernanceError> {
        match self {
            Self::Pending => Ok(()),
            Self::Active => Err(GovernanceError::AppealStatusActive),
            Self::Rejected => Err(GovernanceError::AppealStatusRejected),
            Self::Terminated => Err(GovernanceError::AppealStatusTerminated),
            Self::Canceled => Err(GovernanceError::AppealStatusCanceled),
        }
    }
}

impl FromStr for AppealStatus {
    type Err = GovernanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" | "approved" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            "terminated" => Ok(Self::Terminated),
            "canceled" => Ok(Self::Canceled),
            _ => Err(GovernanceError::AppealStatusUnrecognized),
        }
    }
}

/// Decision applied to an approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Approve the step.
    Approve,
    /// Reject the step and the appeal.
    Reject,
}

impl ApprovalAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for ApprovalAction {
    type Err = GovernanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(GovernanceError::ActionInvalidValue),
        }
    }
}

/// Requested access window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealOptions {
    /// Absolute expiration.
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Relative duration such as `24h`; `0` requests permanent access.
    #[serde(default)]
    pub duration: Option<String>,
}

impl AppealOptions {
    /// Validates the duration format.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(duration) = &self.duration {
            parse_access_duration(duration)?;
        }

        Ok(())
    }

    /// Resolves the expiration relative to `now`; `None` means permanent.
    pub fn expiration_from(&self, now: DateTime<Utc>) -> AppResult<Option<DateTime<Utc>>> {
        if let Some(duration) = &self.duration {
            return Ok(parse_access_duration(duration)?.map(|duration| now + duration));
        }

        Ok(self.expiration_date)
    }
}

/// Access request for a role on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    /// Appeal identifier.
    pub id: String,
    /// Target resource.
    pub resource_id: String,
    /// Pinned policy id.
    pub policy_id: String,
    /// Pinned policy version.
    pub policy_version: u32,
    /// Current status.
    pub status: AppealStatus,
    /// Account receiving access.
    pub account_id: String,
    /// Account kind, for example `user` or `service_account`.
    pub account_type: String,
    /// Requesting actor.
    pub created_by: String,
    /// Identity-provider profile of the creator.
    #[serde(default)]
    pub creator: Option<Value>,
    /// Requested role.
    pub role: String,
    /// Provider permissions implied by the role.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Requested access window.
    #[serde(default)]
    pub options: Option<AppealOptions>,
    /// Free-form details.
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Resource snapshot.
    #[serde(default)]
    pub resource: Option<Resource>,
    /// Ordered approval steps.
    #[serde(default)]
    pub approvals: Vec<Approval>,
    /// Grant issued on activation.
    #[serde(default)]
    pub grant: Option<Grant>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Appeal {
    /// Returns when the access held through this appeal ends, if ever.
    #[must_use]
    pub fn access_expiration(&self) -> Option<DateTime<Utc>> {
        self.grant
            .as_ref()
            .and_then(|grant| grant.expiration_date)
            .or_else(|| {
                self.options
                    .as_ref()
                    .and_then(|options| options.expiration_date)
            })
    }

    /// Returns the JSON context used by step and requirement expressions.
    pub fn evaluation_context(&self) -> AppResult<Value> {
        let appeal = serde_json::to_value(self).map_err(|error| {
            AppError::Internal(format!("failed to serialize appeal '{}': {error}", self.id))
        })?;

        Ok(json!({
            "appeal": appeal,
            "resource": self.resource,
            "creator": self.creator,
        }))
    }

    /// Returns the approval with the given id or name.
    #[must_use]
    pub fn approval(&self, id_or_name: &str) -> Option<&Approval> {
        self.approvals
            .iter()
            .find(|approval| approval.id == id_or_name || approval.name == id_or_name)
    }

    /// Returns the position of the approval with the given id or name.
    #[must_use]
    pub fn approval_position(&self, id_or_name: &str) -> Option<usize> {
        self.approvals
            .iter()
            .position(|approval| approval.id == id_or_name || approval.name == id_or_name)
    }

    /// Cancels a pending appeal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), GovernanceError> {
        self.status.ensure_pending()?;
        self.status = AppealStatus::Canceled;
        self.updated_at = now;
        Ok(())
    }

    /// Marks a pending appeal active.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), GovernanceError> {
        self.status.ensure_pending()?;
        self.status = AppealStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    /// Rejects a pending appeal and skips every undecided step.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), GovernanceError> {
        self.status.ensure_pending()?;
        for approval in &mut self.approvals {
            if matches!(
                approval.status,
                ApprovalStatus::Pending | ApprovalStatus::Blocked
            ) {
                approval.skip(now);
            }
        }

        self.status = AppealStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    /// Terminates a pending or active appeal.
    pub fn terminate(&mut self, now: DateTime<Utc>) -> Result<(), GovernanceError> {
        match self.status {
            AppealStatus::Pending | AppealStatus::Active => {
                self.status = AppealStatus::Terminated;
                self.updated_at = now;
                Ok(())
            }
            other => other.ensure_pending(),
        }
    }

    /// Builds the grant issued for this appeal.
    pub fn to_grant(&self, now: DateTime<Utc>) -> AppResult<Grant> {
        let expiration_date = match &self.options {
            Some(options) => options.expiration_from(now)?,
            None => None,
        };

        Ok(Grant {
            id: uuid::Uuid::new_v4().to_string(),
            status: GrantStatus::Active,
            status_in_provider: Some(GrantStatus::Active),
            account_id: self.account_id.clone(),
            account_type: self.account_type.clone(),
            resource_id: self.resource_id.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
            is_permanent: expiration_date.is_none(),
            expiration_date,
            appeal_id: Some(self.id.clone()),
            source: GrantSource::Appeal,
            revoked_by: None,
            revoked_at: None,
            revoke_reason: None,
            created_by: self.created_by.clone(),
            owner: self.created_by.clone(),
            resource: self.resource.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Appeal listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAppealsFilter {
    /// Accepted statuses; empty accepts all.
    #[serde(default)]
    pub statuses: Vec<AppealStatus>,
    /// Accepted accounts; empty accepts all.
    #[serde(default)]
    pub account_ids: Vec<String>,
    /// Accepted resources; empty accepts all.
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Accepted roles; empty accepts all.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Only appeals created by this actor.
    #[serde(default)]
    pub created_by: Option<String>,
}

impl ListAppealsFilter {
    /// Returns whether the appeal passes the filter.
    #[must_use]
    pub fn matches(&self, appeal: &Appeal) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&appeal.status))
            && (self.account_ids.is_empty() || self.account_ids.contains(&appeal.account_id))
            && (self.resource_ids.is_empty() || self.resource_ids.contains(&appeal.resource_id))
            && (self.roles.is_empty() || self.roles.contains(&appeal.role))
            && self
                .created_by
                .as_deref()
                .is_none_or(|created_by| appeal.created_by == created_by)
    }
}
