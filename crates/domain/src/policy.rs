use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::{AppError, AppResult, GovernanceError, NonEmptyString};

use crate::email::EmailAddress;
use crate::expression::{Expression, value_at_path};
use crate::requirement::Requirement;

/// How an approval step is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStepStrategy {
    /// Decided by evaluating `approve_if`.
    Auto,
    /// Decided by one of the approvers.
    Manual,
}

/// One approval step of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Gate deciding whether the step applies to an appeal.
    #[serde(default)]
    pub when: Option<Expression>,
    /// Decision strategy.
    pub strategy: ApprovalStepStrategy,
    /// Predicate for auto steps.
    #[serde(default)]
    pub approve_if: Option<Expression>,
    /// Reason recorded when an auto step rejects.
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Whether a failed auto step is skipped instead of rejecting the appeal.
    #[serde(default)]
    pub allow_failed: bool,
    /// Static emails or `$`-prefixed field paths.
    #[serde(default)]
    pub approvers: Vec<String>,
}

impl Step {
    /// Returns whether the step applies to the evaluation context.
    pub fn applies_to(&self, context: &Value) -> AppResult<bool> {
        match &self.when {
            Some(expression) => expression.evaluate(context),
            None => Ok(true),
        }
    }

    /// Resolves the approver set against the evaluation context.
    ///
    /// The result is deduplicated, normalized and keeps declaration order.
    pub fn resolve_approvers(&self, context: &Value) -> AppResult<Vec<String>> {
        let mut approvers: Vec<String> = Vec::new();
        for source in &self.approvers {
            for candidate in resolve_approver_source(source, context)? {
                let email = EmailAddress::new(candidate)
                    .map_err(|_| AppError::from(GovernanceError::ApproverEmail))?;
                let email = String::from(email);
                if !approvers.contains(&email) {
                    approvers.push(email);
                }
            }
        }

        Ok(approvers)
    }

    fn validate(&self) -> AppResult<()> {
        NonEmptyString::new(self.name.as_str())
            .map_err(|_| AppError::Validation("policy step name must not be empty".to_owned()))?;

        if let Some(when) = &self.when {
            when.validate()?;
        }

        match self.strategy {
            ApprovalStepStrategy::Auto => {
                let Some(approve_if) = &self.approve_if else {
                    return Err(AppError::Validation(format!(
                        "auto step '{}' requires approve_if",
                        self.name
                    )));
                };
                approve_if.validate()?;
            }
            ApprovalStepStrategy::Manual => {
                if self.approvers.is_empty() {
                    return Err(AppError::Validation(format!(
                        "manual step '{}' requires at least one approver",
                        self.name
                    )));
                }

                for approver in &self.approvers {
                    if !approver.trim_start().starts_with('$') && !EmailAddress::is_valid(approver)
                    {
                        return Err(AppError::Validation(format!(
                            "manual step '{}' has invalid approver '{approver}'",
                            self.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn resolve_approver_source(source: &str, context: &Value) -> AppResult<Vec<String>> {
    let source = source.trim();
    if !source.starts_with('$') {
        return Ok(vec![source.to_owned()]);
    }

    match value_at_path(context, source)? {
        Some(Value::String(email)) => Ok(vec![email.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or(AppError::from(GovernanceError::ApproverInvalidType))
            })
            .collect(),
        Some(_) => Err(GovernanceError::ApproverInvalidType.into()),
        None => Err(AppError::Configuration(format!(
            "approver expression '{source}' did not resolve to a value"
        ))),
    }
}

/// Identity-provider metadata used to enrich the appeal creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamConfig {
    /// Identity provider kind, for example `http`.
    pub provider: String,
    /// Provider specific configuration.
    #[serde(default)]
    pub config: Value,
    /// Mapping of creator attribute name to identity-provider field path.
    #[serde(default)]
    pub schema: BTreeMap<String, String>,
}

/// Reference to a specific policy version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Policy identifier.
    pub id: String,
    /// Policy version.
    pub version: u32,
}

/// Input payload for creating a policy version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// Policy identifier shared across versions.
    pub id: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered approval steps.
    pub steps: Vec<Step>,
    /// Requirements spawning additional appeals.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Optional identity-provider metadata.
    #[serde(default)]
    pub iam: Option<IamConfig>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Immutable, versioned approval policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyInput", into = "PolicyInput")]
pub struct Policy {
    id: NonEmptyString,
    version: u32,
    description: Option<String>,
    steps: Vec<Step>,
    requirements: Vec<Requirement>,
    iam: Option<IamConfig>,
    labels: BTreeMap<String, String>,
}

impl Policy {
    /// Creates a validated policy version.
    pub fn new(input: PolicyInput) -> AppResult<Self> {
        let id = NonEmptyString::new(input.id)
            .map_err(|_| AppError::Validation("policy id must not be empty".to_owned()))?;

        if input.version == 0 {
            return Err(AppError::Validation(format!(
                "policy '{}' version must be at least 1",
                id.as_str()
            )));
        }

        if input.steps.is_empty() {
            return Err(AppError::Validation(format!(
                "policy '{}' must define at least one step",
                id.as_str()
            )));
        }

        let mut step_names = HashSet::new();
        for step in &input.steps {
            step.validate()?;
            if !step_names.insert(step.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "policy '{}' has duplicate step '{}'",
                    id.as_str(),
                    step.name
                )));
            }
        }

        for requirement in &input.requirements {
            requirement.validate()?;
        }

        Ok(Self {
            id,
            version: input.version,
            description: input.description,
            steps: input.steps,
            requirements: input.requirements,
            iam: input.iam,
            labels: input.labels,
        })
    }

    /// Returns the policy identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the version number.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the ordered steps.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the step with the given name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }

    /// Returns the requirements.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Returns the identity-provider metadata.
    #[must_use]
    pub fn iam(&self) -> Option<&IamConfig> {
        self.iam.as_ref()
    }

    /// Returns the labels.
    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Returns the version reference pinned on appeals.
    #[must_use]
    pub fn config(&self) -> PolicyConfig {
        PolicyConfig {
            id: self.id.as_str().to_owned(),
            version: self.version,
        }
    }
}

impl TryFrom<PolicyInput> for Policy {
    type Error = AppError;

    fn try_from(value: PolicyInput) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Policy> for PolicyInput {
    fn from(value: Policy) -> Self {
        Self {
            id: value.id.into(),
            version: value.version,
            description: value.description,
            steps: value.steps,
            requirements: value.requirements,
            iam: value.iam,
            labels: value.labels,
        }
    }
}
