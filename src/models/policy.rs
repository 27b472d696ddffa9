use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::action::Action;
use crate::models::object::ObjectRef;

/// Provenance tag on a policy, used to scope bulk removal and replacement
/// without disturbing unrelated grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    SubmissionDefault,
    Workflow,
    Custom,
    Inherited,
}

impl PolicyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::SubmissionDefault => "submission_default",
            PolicyType::Workflow => "workflow",
            PolicyType::Custom => "custom",
            PolicyType::Inherited => "inherited",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submission_default" => Some(PolicyType::SubmissionDefault),
            "workflow" => Some(PolicyType::Workflow),
            "custom" => Some(PolicyType::Custom),
            "inherited" => Some(PolicyType::Inherited),
            _ => None,
        }
    }
}

/// The principal a policy grants to: a group, a single account, or neither.
/// A policy with neither is an inert default row and matches no caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    Group(Uuid),
    Account(Uuid),
}

/// The atomic access-control grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub id: Uuid,
    pub object: ObjectRef,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<PolicyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourcePolicy {
    pub fn principal(&self) -> Option<Principal> {
        match (self.group_id, self.account_id) {
            (Some(group), _) => Some(Principal::Group(group)),
            (None, Some(account)) => Some(Principal::Account(account)),
            (None, None) => None,
        }
    }

    /// Whether the policy's validity window contains `on`. Both bounds are
    /// inclusive; a missing bound is open.
    pub fn is_valid_on(&self, on: NaiveDate) -> bool {
        if let Some(start) = self.start_date {
            if on < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if on > end {
                return false;
            }
        }
        true
    }
}

impl Loggable for ResourcePolicy {
    fn entity_type() -> &'static str { "policy" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Fields accepted when creating or modifying a single policy in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyForm {
    pub action: Action,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub policy_type: Option<PolicyType>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PolicyForm {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            group_id: None,
            account_id: None,
            start_date: None,
            end_date: None,
            policy_type: None,
            name: None,
            description: None,
            reason: None,
        }
    }
}
