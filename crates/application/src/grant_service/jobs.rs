use super::*;

use chrono::DateTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use warden_domain::GrantStatus;

use crate::revocation_engine::{BulkRevokeReport, RevocationStatus};

const SYSTEM_ACTOR: &str = "system";
const EXPIRED_REVOKE_REASON: &str = "Automatically revoked";

/// Result of one expiration reminder run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationReminderSummary {
    /// Grants expiring inside the widest window.
    pub grants: usize,
    /// Notifications handed to the notifier.
    pub notifications: usize,
    /// Notifications the notifier failed to deliver.
    pub failures: usize,
}

impl GrantService {
    /// Revokes active, non-permanent grants that expired before `now`.
    pub async fn revoke_expired_grants(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> AppResult<BulkRevokeReport> {
        let filter = ListGrantsFilter {
            statuses: vec![GrantStatus::Active],
            expiration_date_before: Some(now),
            is_permanent: Some(false),
            ..ListGrantsFilter::default()
        };
        let grants = self.list(&filter).await?;
        if grants.is_empty() {
            return Ok(BulkRevokeReport::default());
        }

        info!(count = grants.len(), "revoking expired grants");
        let report = self
            .revoke_grants(grants, SYSTEM_ACTOR, EXPIRED_REVOKE_REASON, cancel)
            .await;

        let notifications = report
            .outcomes()
            .iter()
            .filter(|outcome| outcome.status == RevocationStatus::Revoked)
            .map(|outcome| Self::revoked_notification(&outcome.grant))
            .collect();
        self.send_notifications(notifications).await;

        Ok(report)
    }

    /// Sends reminders for active grants expiring within one of `days`.
    ///
    /// Each grant is reminded once, for the smallest window it falls in.
    pub async fn notify_expiring_grants(
        &self,
        now: DateTime<Utc>,
        days: &[i64],
    ) -> AppResult<ExpirationReminderSummary> {
        let mut windows: Vec<i64> = days.iter().copied().filter(|day| *day > 0).collect();
        windows.sort_unstable();
        windows.dedup();
        let Some(widest) = windows.last().copied() else {
            return Ok(ExpirationReminderSummary::default());
        };

        let filter = ListGrantsFilter {
            statuses: vec![GrantStatus::Active],
            expiration_date_after: Some(now),
            expiration_date_before: Some(now + chrono::Duration::days(widest)),
            is_permanent: Some(false),
            ..ListGrantsFilter::default()
        };
        let grants = self.list(&filter).await?;

        let notifications: Vec<Notification> = grants
            .iter()
            .filter_map(|grant| {
                let window = windows
                    .iter()
                    .copied()
                    .find(|day| grant.expires_within(now, *day))?;
                Some(
                    Notification::for_grant(&grant.owner, NotificationKind::ExpirationReminder, grant)
                        .with_variable("days_left", json!(window)),
                )
            })
            .collect();

        let sent = notifications.len();
        let failures = if notifications.is_empty() {
            Vec::new()
        } else {
            self.notifier.notify(notifications).await
        };
        for error in &failures {
            warn!(error = %error, "failed to send expiration reminder");
        }

        Ok(ExpirationReminderSummary {
            grants: grants.len(),
            notifications: sent,
            failures: failures.len(),
        })
    }
}
