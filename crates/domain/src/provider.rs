use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult, GovernanceError};

use crate::{Appeal, parse_access_duration};

/// Appeal settings a provider applies to its resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAppealConfig {
    /// How long before expiry active access may be re-requested, for
    /// example `24h`. Empty means active access cannot be extended.
    #[serde(default)]
    pub allow_active_access_extension_in: Option<String>,
}

impl ProviderAppealConfig {
    /// Returns the extension window, or `None` when extension is disabled.
    pub fn extension_window(&self) -> AppResult<Option<Duration>> {
        let Some(window) = self
            .allow_active_access_extension_in
            .as_deref()
            .filter(|window| !window.trim().is_empty())
        else {
            return Ok(None);
        };

        let parsed = parse_access_duration(window).map_err(|error| {
            AppError::Configuration(format!(
                "invalid allow_active_access_extension_in '{window}': {error}"
            ))
        })?;
        Ok(Some(parsed.unwrap_or_else(Duration::zero)))
    }

    /// Checks whether a new appeal may extend the access held through `active`.
    ///
    /// Access without an expiration can always be extended.
    pub fn ensure_extension_allowed(&self, active: &Appeal, now: DateTime<Utc>) -> AppResult<()> {
        let Some(window) = self.extension_window()? else {
            return Err(GovernanceError::AppealFoundActiveAccess.into());
        };

        match active.access_expiration() {
            Some(expiration) if expiration - now > window => {
                Err(GovernanceError::AppealNotEligibleForExtension.into())
            }
            _ => Ok(()),
        }
    }
}
