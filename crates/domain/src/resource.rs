use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider resource snapshot that appeals and grants refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier.
    pub id: String,
    /// Provider type, for example `bigquery`.
    pub provider_type: String,
    /// Provider instance URN.
    pub provider_urn: String,
    /// Resource type inside the provider, for example `dataset`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource URN inside the provider.
    pub urn: String,
    /// Display name.
    pub name: String,
    /// Free-form provider details.
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Whether the resource was removed from the provider.
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource {
    /// Returns the `Name (provider_type: urn)` label used in notifications.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({}: {})", self.name, self.provider_type, self.urn)
    }
}
