use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::appeal::Appeal;
use crate::grant::Grant;

/// Kind of message delivered to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Appeal was fully approved.
    AppealApproved,
    /// Appeal was rejected.
    AppealRejected,
    /// Approver has a pending step.
    ApproverNotification,
    /// Grant was revoked.
    AccessRevoked,
    /// Grant is about to expire.
    ExpirationReminder,
    /// Grant owner changed.
    GrantOwnerChanged,
}

/// Template key and variables of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Template key.
    pub kind: NotificationKind,
    /// Template variables.
    pub variables: Map<String, Value>,
}

/// Message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub user: String,
    /// Routing labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Message.
    pub message: NotificationMessage,
}

impl Notification {
    /// Builds an appeal notification for `user`.
    #[must_use]
    pub fn for_appeal(user: &str, kind: NotificationKind, appeal: &Appeal) -> Self {
        let resource_name = appeal
            .resource
            .as_ref()
            .map(|resource| resource.display_name())
            .unwrap_or_else(|| appeal.resource_id.clone());

        Self::new(
            user,
            kind,
            json!({
                "appeal_id": appeal.id,
                "resource_name": resource_name,
                "role": appeal.role,
                "account_id": appeal.account_id,
                "account_type": appeal.account_type,
                "requestor": appeal.created_by,
            }),
        )
        .with_label("appeal_id", &appeal.id)
    }

    /// Builds a grant notification for `user`.
    #[must_use]
    pub fn for_grant(user: &str, kind: NotificationKind, grant: &Grant) -> Self {
        let resource_name = grant
            .resource
            .as_ref()
            .map(|resource| resource.display_name())
            .unwrap_or_else(|| grant.resource_id.clone());

        Self::new(
            user,
            kind,
            json!({
                "grant_id": grant.id,
                "appeal_id": grant.appeal_id,
                "resource_name": resource_name,
                "role": grant.role,
                "account_id": grant.account_id,
                "account_type": grant.account_type,
                "requestor": grant.owner,
                "expiration_date": grant.expiration_date,
            }),
        )
        .with_label("grant_id", &grant.id)
    }

    /// Adds a template variable.
    #[must_use]
    pub fn with_variable(mut self, key: &str, value: Value) -> Self {
        self.message.variables.insert(key.to_owned(), value);
        self
    }

    fn new(user: &str, kind: NotificationKind, variables: Value) -> Self {
        let variables = match variables {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            user: user.to_owned(),
            labels: BTreeMap::new(),
            message: NotificationMessage { kind, variables },
        }
    }

    fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_owned(), value.to_owned());
        self
    }
}
