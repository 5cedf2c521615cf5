use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::{AppError, AppResult, GovernanceError};

use crate::appeal::AppealOptions;
use crate::expression::value_at_path;
use crate::policy::PolicyConfig;
use crate::resource::Resource;

/// Rule spawning additional appeals when its trigger matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Trigger evaluated against the parent appeal.
    pub on: RequirementTrigger,
    /// Appeals to create when triggered.
    pub appeals: Vec<AdditionalAppeal>,
}

impl Requirement {
    pub(crate) fn validate(&self) -> AppResult<()> {
        if self.appeals.is_empty() {
            return Err(AppError::Validation(
                "requirement must define at least one additional appeal".to_owned(),
            ));
        }

        for appeal in &self.appeals {
            if appeal.resource_id.trim().is_empty() || appeal.role.trim().is_empty() {
                return Err(AppError::Validation(
                    "additional appeal requires resource_id and role".to_owned(),
                ));
            }
        }

        self.on.validate()
    }
}

/// Anchored regular expression compiled once when the trigger is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TriggerPattern {
    source: String,
    regex: Regex,
}

impl TriggerPattern {
    /// Compiles `source` so that it must match a whole value.
    pub fn new(source: &str) -> AppResult<Self> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|error| {
            AppError::Configuration(format!("invalid requirement pattern '{source}': {error}"))
        })?;

        Ok(Self {
            source: source.to_owned(),
            regex,
        })
    }

    /// Returns whether the whole value matches.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for TriggerPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for TriggerPattern {
    type Error = AppError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::new(&source)
    }
}

impl From<TriggerPattern> for String {
    fn from(pattern: TriggerPattern) -> Self {
        pattern.source
    }
}

/// Pattern set matched against an appeal's provider, resource and role.
///
/// An absent pattern matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementTrigger {
    /// Provider type pattern.
    #[serde(default)]
    pub provider_type: Option<TriggerPattern>,
    /// Provider URN pattern.
    #[serde(default)]
    pub provider_urn: Option<TriggerPattern>,
    /// Resource type pattern.
    #[serde(default)]
    pub resource_type: Option<TriggerPattern>,
    /// Resource URN pattern.
    #[serde(default)]
    pub resource_urn: Option<TriggerPattern>,
    /// Role pattern.
    #[serde(default)]
    pub role: Option<TriggerPattern>,
    /// Extra field equality conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl RequirementTrigger {
    /// Returns whether the trigger matches the appeal resource and role.
    ///
    /// `context` is the appeal evaluation context used by conditions.
    pub fn matches(&self, resource: &Resource, role: &str, context: &Value) -> AppResult<bool> {
        let checks = [
            (&self.provider_type, resource.provider_type.as_str()),
            (&self.provider_urn, resource.provider_urn.as_str()),
            (&self.resource_type, resource.resource_type.as_str()),
            (&self.resource_urn, resource.urn.as_str()),
            (&self.role, role),
        ];

        for (pattern, value) in checks {
            if pattern.as_ref().is_some_and(|pattern| !pattern.is_match(value)) {
                return Ok(false);
            }
        }

        for condition in &self.conditions {
            if !condition.is_match(context)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn validate(&self) -> AppResult<()> {
        for condition in &self.conditions {
            condition.context_path()?;
        }

        Ok(())
    }
}

/// Field equality predicate used by requirement triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field path starting with `$resource.` or `$appeal.`.
    pub field: String,
    /// Match rule.
    #[serde(rename = "match")]
    pub match_rule: MatchCondition,
}

/// Match rule of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCondition {
    /// Value the field must equal.
    pub eq: Value,
}

impl Condition {
    /// Returns whether the condition holds in the evaluation context.
    pub fn is_match(&self, context: &Value) -> AppResult<bool> {
        let path = self.context_path()?;
        Ok(value_at_path(context, path)?.is_some_and(|actual| *actual == self.match_rule.eq))
    }

    fn context_path(&self) -> AppResult<&str> {
        let field = self.field.trim();
        if field.starts_with("$resource.") || field.starts_with("$appeal.") {
            return Ok(&field[1..]);
        }

        Err(GovernanceError::InvalidConditionField.into())
    }
}

/// Appeal spawned when a requirement triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalAppeal {
    /// Target resource identifier.
    pub resource_id: String,
    /// Requested role.
    pub role: String,
    /// Optional access options.
    #[serde(default)]
    pub options: Option<AppealOptions>,
    /// Explicit policy; the resource's provider policy applies otherwise.
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
}
