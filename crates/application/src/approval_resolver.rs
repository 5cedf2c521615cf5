//! Policy interpretation for appeal approval chains.

use chrono::{DateTime, Utc};

use warden_core::{AppError, AppResult};
use warden_domain::{
    AdditionalAppeal, Appeal, AppealStatus, Approval, ApprovalStatus, ApprovalStepStrategy,
    Policy, Step,
};

#[cfg(test)]
mod tests;

/// Builds and advances approval chains from policy steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalResolver;

impl ApprovalResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Replaces the appeal approvals with the applicable policy steps and
    /// advances the chain.
    ///
    /// Steps whose `when` is false are omitted. Manual steps resolve their
    /// approver set here. Requirement triggers are evaluated as a dry run so
    /// malformed conditions fail the creation.
    pub fn resolve(&self, policy: &Policy, appeal: &mut Appeal, now: DateTime<Utc>) -> AppResult<()> {
        let context = appeal.evaluation_context()?;
        let policy_config = policy.config();

        let mut approvals = Vec::new();
        for step in policy.steps() {
            if !step.applies_to(&context)? {
                continue;
            }

            let approvers = match step.strategy {
                ApprovalStepStrategy::Auto => Vec::new(),
                ApprovalStepStrategy::Manual => step.resolve_approvers(&context)?,
            };
            approvals.push(Approval::new(
                &appeal.id,
                &step.name,
                approvals.len(),
                &policy_config,
                approvers,
                now,
            ));
        }

        self.matching_requirements(policy, appeal)?;

        appeal.policy_id = policy_config.id;
        appeal.policy_version = policy_config.version;
        appeal.approvals = approvals;
        self.advance(policy, appeal, now)
    }

    /// Moves the chain forward until it needs a manual decision.
    ///
    /// Auto steps are decided once every earlier step is approved or
    /// skipped. A rejected step rejects the appeal; a fully resolved chain
    /// activates it.
    pub fn advance(&self, policy: &Policy, appeal: &mut Appeal, now: DateTime<Utc>) -> AppResult<()> {
        if appeal.status != AppealStatus::Pending {
            return Ok(());
        }

        let context = appeal.evaluation_context()?;
        for index in 0..appeal.approvals.len() {
            let status = appeal.approvals[index].status;
            match status {
                ApprovalStatus::Approved | ApprovalStatus::Skipped => continue,
                ApprovalStatus::Pending => return Ok(()),
                ApprovalStatus::Rejected => {
                    appeal.reject(now)?;
                    return Ok(());
                }
                ApprovalStatus::Blocked => {}
            }

            let step = policy_step(policy, &appeal.approvals[index].name)?;
            let approval = &mut appeal.approvals[index];
            match step.strategy {
                ApprovalStepStrategy::Manual => {
                    approval.unblock(now);
                    return Ok(());
                }
                ApprovalStepStrategy::Auto => {
                    let approved = match &step.approve_if {
                        Some(expression) => expression.evaluate(&context)?,
                        None => false,
                    };

                    if approved {
                        approval.approve(None, None, now);
                    } else if step.allow_failed {
                        approval.skip(now);
                    } else {
                        approval.reject(None, step.rejection_reason.clone(), now);
                        appeal.reject(now)?;
                        return Ok(());
                    }
                }
            }
        }

        appeal.activate(now)?;
        Ok(())
    }

    /// Returns the additional appeals whose requirement trigger matches.
    pub fn matching_requirements(
        &self,
        policy: &Policy,
        appeal: &Appeal,
    ) -> AppResult<Vec<AdditionalAppeal>> {
        if policy.requirements().is_empty() {
            return Ok(Vec::new());
        }

        let Some(resource) = &appeal.resource else {
            return Err(AppError::Internal(format!(
                "appeal '{}' has no resource snapshot",
                appeal.id
            )));
        };

        let context = appeal.evaluation_context()?;
        let mut additional_appeals = Vec::new();
        for requirement in policy.requirements() {
            if requirement.on.matches(resource, &appeal.role, &context)? {
                additional_appeals.extend(requirement.appeals.iter().cloned());
            }
        }

        Ok(additional_appeals)
    }
}

fn policy_step<'a>(policy: &'a Policy, name: &str) -> AppResult<&'a Step> {
    policy.step(name).ok_or_else(|| {
        AppError::Configuration(format!(
            "policy '{}' version {} has no step '{name}'",
            policy.id().as_str(),
            policy.version()
        ))
    })
}
