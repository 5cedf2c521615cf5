use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{AppError, GovernanceError};

use crate::resource::Resource;

/// Lifecycle status of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Access is in effect.
    Active,
    /// Access was revoked or superseded.
    Inactive,
}

impl GrantStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for GrantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!(
                "unknown grant status '{value}'"
            ))),
        }
    }
}

/// Provenance of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Issued for an approved appeal.
    Appeal,
    /// Imported from the provider.
    Import,
}

/// Materialized access of an account to a resource role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant identifier.
    pub id: String,
    /// Current status.
    pub status: GrantStatus,
    /// Last status observed in the provider.
    #[serde(default)]
    pub status_in_provider: Option<GrantStatus>,
    /// Account holding the access.
    pub account_id: String,
    /// Account kind.
    pub account_type: String,
    /// Target resource.
    pub resource_id: String,
    /// Granted role.
    pub role: String,
    /// Provider permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Whether the grant never expires.
    pub is_permanent: bool,
    /// Expiration; `None` for permanent grants.
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Originating appeal, absent for imported grants.
    #[serde(default)]
    pub appeal_id: Option<String>,
    /// Provenance.
    pub source: GrantSource,
    /// Revoking actor.
    #[serde(default)]
    pub revoked_by: Option<String>,
    /// Revocation time.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revocation reason.
    #[serde(default)]
    pub revoke_reason: Option<String>,
    /// Actor that requested the access.
    pub created_by: String,
    /// Accountable owner.
    pub owner: String,
    /// Resource snapshot.
    #[serde(default)]
    pub resource: Option<Resource>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    /// Returns whether the grant is in effect.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }

    /// Returns the sorted permissions joined with `;`.
    #[must_use]
    pub fn permissions_key(&self) -> String {
        let mut permissions = self.permissions.clone();
        permissions.sort();
        permissions.join(";")
    }

    /// Returns whether a non-permanent grant expired before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_permanent
            && self
                .expiration_date
                .is_some_and(|expiration| expiration < now)
    }

    /// Returns whether the grant expires within `days` days of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        !self.is_permanent
            && self.expiration_date.is_some_and(|expiration| {
                expiration >= now && expiration <= now + Duration::days(days)
            })
    }

    /// Revokes an active grant.
    pub fn revoke(
        &mut self,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GovernanceError> {
        if actor.trim().is_empty() {
            return Err(GovernanceError::EmptyActor);
        }

        if !self.is_active() {
            return Err(GovernanceError::GrantAlreadyInactive);
        }

        self.status = GrantStatus::Inactive;
        self.revoked_by = Some(actor.to_owned());
        self.revoked_at = Some(now);
        self.revoke_reason = Some(reason.to_owned());
        self.updated_at = now;
        Ok(())
    }

    /// Deactivates a grant replaced by a newer appeal for the same access.
    ///
    /// Provider access is kept; only the record changes.
    pub fn supersede(&mut self, actor: &str, appeal_id: &str, now: DateTime<Utc>) {
        self.status = GrantStatus::Inactive;
        self.revoked_by = Some(actor.to_owned());
        self.revoked_at = Some(now);
        self.revoke_reason = Some(format!("extended by appeal {appeal_id}"));
        self.updated_at = now;
    }
}

/// Grant listing filter; empty lists accept all values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGrantsFilter {
    /// Accepted statuses.
    #[serde(default)]
    pub statuses: Vec<GrantStatus>,
    /// Accepted accounts.
    #[serde(default)]
    pub account_ids: Vec<String>,
    /// Accepted account kinds.
    #[serde(default)]
    pub account_types: Vec<String>,
    /// Accepted resources.
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Accepted roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Accepted provider types.
    #[serde(default)]
    pub provider_types: Vec<String>,
    /// Accepted provider URNs.
    #[serde(default)]
    pub provider_urns: Vec<String>,
    /// Accepted resource types.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Accepted resource URNs.
    #[serde(default)]
    pub resource_urns: Vec<String>,
    /// Only grants created by this actor.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Only grants owned by this actor.
    #[serde(default)]
    pub owner: Option<String>,
    /// Only grants expiring strictly before this instant.
    #[serde(default)]
    pub expiration_date_before: Option<DateTime<Utc>>,
    /// Only grants expiring strictly after this instant.
    #[serde(default)]
    pub expiration_date_after: Option<DateTime<Utc>>,
    /// Only permanent or only expiring grants.
    #[serde(default)]
    pub is_permanent: Option<bool>,
}

impl ListGrantsFilter {
    /// Returns whether the grant passes the filter.
    #[must_use]
    pub fn matches(&self, grant: &Grant) -> bool {
        accepts(&self.statuses, &grant.status)
            && accepts(&self.account_ids, &grant.account_id)
            && accepts(&self.account_types, &grant.account_type)
            && accepts(&self.resource_ids, &grant.resource_id)
            && accepts(&self.roles, &grant.role)
            && self.matches_resource(grant.resource.as_ref())
            && self
                .created_by
                .as_deref()
                .is_none_or(|created_by| grant.created_by == created_by)
            && self.owner.as_deref().is_none_or(|owner| grant.owner == owner)
            && self.expiration_date_before.is_none_or(|before| {
                grant
                    .expiration_date
                    .is_some_and(|expiration| expiration < before)
            })
            && self.expiration_date_after.is_none_or(|after| {
                grant
                    .expiration_date
                    .is_some_and(|expiration| expiration > after)
            })
            && self
                .is_permanent
                .is_none_or(|is_permanent| grant.is_permanent == is_permanent)
    }

    fn matches_resource(&self, resource: Option<&Resource>) -> bool {
        let unconstrained = self.provider_types.is_empty()
            && self.provider_urns.is_empty()
            && self.resource_types.is_empty()
            && self.resource_urns.is_empty();
        if unconstrained {
            return true;
        }

        resource.is_some_and(|resource| {
            accepts(&self.provider_types, &resource.provider_type)
                && accepts(&self.provider_urns, &resource.provider_urn)
                && accepts(&self.resource_types, &resource.resource_type)
                && accepts(&self.resource_urns, &resource.urn)
        })
    }
}

fn accepts<T: PartialEq>(accepted: &[T], value: &T) -> bool {
    accepted.is_empty() || accepted.contains(value)
}

/// Selection of grants for bulk revocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeGrantsFilter {
    /// Accounts whose grants are revoked; required.
    #[serde(default)]
    pub account_ids: Vec<String>,
    /// Accepted provider types.
    #[serde(default)]
    pub provider_types: Vec<String>,
    /// Accepted provider URNs.
    #[serde(default)]
    pub provider_urns: Vec<String>,
    /// Accepted resource types.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Accepted resource URNs.
    #[serde(default)]
    pub resource_urns: Vec<String>,
}

impl RevokeGrantsFilter {
    /// Returns the listing filter selecting the active grants to revoke.
    #[must_use]
    pub fn active_grants(&self) -> ListGrantsFilter {
        ListGrantsFilter {
            statuses: vec![GrantStatus::Active],
            account_ids: self.account_ids.clone(),
            provider_types: self.provider_types.clone(),
            provider_urns: self.provider_urns.clone(),
            resource_types: self.resource_types.clone(),
            resource_urns: self.resource_urns.clone(),
            ..ListGrantsFilter::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use warden_core::GovernanceError;

    use super::{Grant, GrantSource, GrantStatus, ListGrantsFilter, RevokeGrantsFilter};

    fn grant() -> Grant {
        let now = Utc::now();
        Grant {
            id: "grant-1".to_owned(),
            status: GrantStatus::Active,
            status_in_provider: Some(GrantStatus::Active),
            account_id: "user@x.com".to_owned(),
            account_type: "user".to_owned(),
            resource_id: "res-1".to_owned(),
            role: "viewer".to_owned(),
            permissions: vec!["write".to_owned(), "read".to_owned()],
            is_permanent: false,
            expiration_date: Some(now + Duration::days(2)),
            appeal_id: Some("appeal-1".to_owned()),
            source: GrantSource::Appeal,
            revoked_by: None,
            revoked_at: None,
            revoke_reason: None,
            created_by: "user@x.com".to_owned(),
            owner: "user@x.com".to_owned(),
            resource: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn revoke_requires_actor_and_active_status() {
        let mut grant = grant();
        assert_eq!(
            grant.revoke(" ", "cleanup", Utc::now()),
            Err(GovernanceError::EmptyActor)
        );
        assert!(grant.is_active());

        assert!(grant.revoke("admin@x.com", "cleanup", Utc::now()).is_ok());
        assert_eq!(grant.status, GrantStatus::Inactive);
        assert_eq!(grant.revoked_by.as_deref(), Some("admin@x.com"));
        assert_eq!(grant.revoke_reason.as_deref(), Some("cleanup"));

        let before = grant.clone();
        assert_eq!(
            grant.revoke("admin@x.com", "again", Utc::now()),
            Err(GovernanceError::GrantAlreadyInactive)
        );
        assert_eq!(grant, before);
    }

    #[test]
    fn expiry_windows() {
        let grant = grant();
        let now = Utc::now();
        assert!(!grant.is_expired_at(now));
        assert!(grant.is_expired_at(now + Duration::days(3)));
        assert!(grant.expires_within(now, 3));
        assert!(!grant.expires_within(now, 1));
    }

    #[test]
    fn filters_without_resource_snapshot_reject_provider_constraints() {
        let filter = ListGrantsFilter {
            provider_types: vec!["bigquery".to_owned()],
            ..ListGrantsFilter::default()
        };
        assert!(!filter.matches(&grant()));

        let filter = RevokeGrantsFilter {
            account_ids: vec!["user@x.com".to_owned()],
            ..RevokeGrantsFilter::default()
        }
        .active_grants();
        assert!(filter.matches(&grant()));
    }

    proptest! {
        #[test]
        fn permissions_key_ignores_order(mut permissions in proptest::collection::vec("[a-z]{1,8}", 0..6)) {
            let mut grant = grant();
            grant.permissions = permissions.clone();
            let key = grant.permissions_key();

            permissions.reverse();
            grant.permissions = permissions;
            prop_assert_eq!(grant.permissions_key(), key);
        }
    }
}
