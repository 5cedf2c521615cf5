use chrono::Utc;
use serde_json::json;

use warden_core::{AppError, GovernanceError};
use warden_domain::{
    AdditionalAppeal, AppealStatus, ApprovalStatus, Condition, Expression, MatchCondition, Requirement,
    RequirementTrigger,
};

use crate::test_support::{
    auto_step, manual_step, pending_appeal, policy, resource, trigger_pattern,
};

use super::ApprovalResolver;

fn role_is(role: &str) -> Expression {
    Expression::Eq {
        field: "$appeal.role".to_owned(),
        value: json!(role),
    }
}

#[test]
fn resolve_opens_first_manual_step_and_blocks_the_rest() {
    let policy = policy(
        "bq",
        vec![
            manual_step("lead", &["lead@example.com"]),
            manual_step("owner", &["owner@example.com"]),
        ],
        Vec::new(),
    );
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(appeal.policy_id, "bq");
    assert_eq!(appeal.policy_version, 1);
    assert_eq!(appeal.status, AppealStatus::Pending);
    let statuses: Vec<_> = appeal.approvals.iter().map(|a| a.status).collect();
    assert_eq!(statuses, vec![ApprovalStatus::Pending, ApprovalStatus::Blocked]);
    assert_eq!(appeal.approvals[1].index, 1);
    assert_eq!(appeal.approvals[0].approvers, vec!["lead@example.com"]);
}

#[test]
fn resolve_omits_steps_whose_gate_is_false() {
    let mut gated = manual_step("security", &["sec@example.com"]);
    gated.when = Some(role_is("admin"));
    let policy = policy(
        "bq",
        vec![gated, manual_step("owner", &["owner@example.com"])],
        Vec::new(),
    );
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(appeal.approvals.len(), 1);
    assert_eq!(appeal.approvals[0].name, "owner");
    assert_eq!(appeal.approvals[0].index, 0);
    assert_eq!(appeal.approvals[0].status, ApprovalStatus::Pending);
}

#[test]
fn passing_auto_steps_activate_the_appeal() {
    let policy = policy(
        "bq",
        vec![
            auto_step("role-check", role_is("viewer"), false),
            auto_step("always", Expression::Literal { value: true }, false),
        ],
        Vec::new(),
    );
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(appeal.status, AppealStatus::Active);
    assert!(
        appeal
            .approvals
            .iter()
            .all(|approval| approval.status == ApprovalStatus::Approved && approval.actor.is_none())
    );
}

#[test]
fn failing_auto_step_rejects_and_skips_remaining_steps() {
    let policy = policy(
        "bq",
        vec![
            auto_step("role-check", role_is("admin"), false),
            manual_step("owner", &["owner@example.com"]),
        ],
        Vec::new(),
    );
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(appeal.status, AppealStatus::Rejected);
    assert_eq!(appeal.approvals[0].status, ApprovalStatus::Rejected);
    assert_eq!(appeal.approvals[0].reason.as_deref(), Some("role-check failed"));
    assert_eq!(appeal.approvals[1].status, ApprovalStatus::Skipped);
}

#[test]
fn failing_auto_step_with_allow_failed_is_skipped() {
    let policy = policy(
        "bq",
        vec![
            auto_step("role-check", role_is("admin"), true),
            manual_step("owner", &["owner@example.com"]),
        ],
        Vec::new(),
    );
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(appeal.status, AppealStatus::Pending);
    assert_eq!(appeal.approvals[0].status, ApprovalStatus::Skipped);
    assert_eq!(appeal.approvals[1].status, ApprovalStatus::Pending);
}

#[test]
fn auto_step_after_manual_step_waits_for_the_decision() {
    let policy = policy(
        "bq",
        vec![
            manual_step("owner", &["owner@example.com"]),
            auto_step("always", Expression::Literal { value: true }, false),
        ],
        Vec::new(),
    );
    let resolver = ApprovalResolver::new();
    let mut appeal = pending_appeal(resource("dataset-1"), "a@example.com");
    assert!(resolver.resolve(&policy, &mut appeal, Utc::now()).is_ok());
    assert_eq!(appeal.approvals[1].status, ApprovalStatus::Blocked);

    let now = Utc::now();
    appeal.approvals[0].approve(Some("owner@example.com"), None, now);
    assert!(resolver.advance(&policy, &mut appeal, now).is_ok());

    assert_eq!(appeal.approvals[1].status, ApprovalStatus::Approved);
    assert_eq!(appeal.status, AppealStatus::Active);
}

#[test]
fn approvers_resolve_from_resource_fields() {
    let mut dataset = resource("dataset-1");
    dataset
        .details
        .insert("owners".to_owned(), json!(["Owner@Example.com", "b@example.com"]));
    dataset
        .details
        .insert("steward".to_owned(), json!("b@example.com"));
    let policy = policy(
        "bq",
        vec![manual_step(
            "owner",
            &["$resource.details.owners", "$appeal.resource.details.steward"],
        )],
        Vec::new(),
    );
    let mut appeal = pending_appeal(dataset, "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(result.is_ok());

    assert_eq!(
        appeal.approvals[0].approvers,
        vec!["owner@example.com", "b@example.com"]
    );
}

#[test]
fn invalid_resolved_approver_fails_resolution() {
    let mut dataset = resource("dataset-1");
    dataset
        .details
        .insert("owner".to_owned(), json!("not-an-email"));
    let policy = policy(
        "bq",
        vec![manual_step("owner", &["$resource.details.owner"])],
        Vec::new(),
    );
    let mut appeal = pending_appeal(dataset, "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(matches!(
        result,
        Err(AppError::Governance(GovernanceError::ApproverEmail))
    ));
}

#[test]
fn non_string_approver_field_is_rejected() {
    let mut dataset = resource("dataset-1");
    dataset.details.insert("owner".to_owned(), json!(42));
    let policy = policy(
        "bq",
        vec![manual_step("owner", &["$resource.details.owner"])],
        Vec::new(),
    );
    let mut appeal = pending_appeal(dataset, "a@example.com");

    let result = ApprovalResolver::new().resolve(&policy, &mut appeal, Utc::now());
    assert!(matches!(
        result,
        Err(AppError::Governance(GovernanceError::ApproverInvalidType))
    ));
}

#[test]
fn matching_requirements_follow_trigger_patterns() {
    let requirement = Requirement {
        on: RequirementTrigger {
            provider_type: Some(trigger_pattern("big.*")),
            role: Some(trigger_pattern("viewer|editor")),
            ..RequirementTrigger::default()
        },
        appeals: vec![AdditionalAppeal {
            resource_id: "workspace-1".to_owned(),
            role: "member".to_owned(),
            options: None,
            policy: None,
        }],
    };
    let policy = policy(
        "bq",
        vec![manual_step("owner", &["owner@example.com"])],
        vec![requirement],
    );
    let resolver = ApprovalResolver::new();

    let appeal = pending_appeal(resource("dataset-1"), "a@example.com");
    let matched = resolver.matching_requirements(&policy, &appeal);
    assert!(matched.is_ok());
    let matched = matched.unwrap_or_else(|_| unreachable!());
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].resource_id, "workspace-1");

    let mut admin = pending_appeal(resource("dataset-1"), "a@example.com");
    admin.role = "viewer-admin".to_owned();
    let matched = resolver.matching_requirements(&policy, &admin);
    assert!(matches!(matched, Ok(ref appeals) if appeals.is_empty()));
}

#[test]
fn condition_outside_appeal_and_resource_is_rejected() {
    let trigger = RequirementTrigger {
        conditions: vec![Condition {
            field: "$creator.department".to_owned(),
            match_rule: MatchCondition { eq: json!("data") },
        }],
        ..RequirementTrigger::default()
    };
    let appeal = pending_appeal(resource("dataset-1"), "a@example.com");
    let context = appeal.evaluation_context();
    assert!(context.is_ok());
    let context = context.unwrap_or_else(|_| unreachable!());

    let result = trigger.matches(&resource("dataset-1"), &appeal.role, &context);
    assert!(matches!(
        result,
        Err(AppError::Governance(GovernanceError::InvalidConditionField))
    ));
}
