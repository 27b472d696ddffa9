use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// Where a submitted work sits in its processing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositState {
    /// Initial; depositor-editable.
    Workspace,
    /// In review.
    Workflow,
    /// Terminal; publicly visible.
    Archived,
    /// Terminal; hidden but retained.
    Withdrawn,
}

impl DepositState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositState::Workspace => "workspace",
            DepositState::Workflow => "workflow",
            DepositState::Archived => "archived",
            DepositState::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "workspace" => Some(DepositState::Workspace),
            "workflow" => Some(DepositState::Workflow),
            "archived" => Some(DepositState::Archived),
            "withdrawn" => Some(DepositState::Withdrawn),
            _ => None,
        }
    }

    /// Content and metadata may only change while the deposit is editable.
    pub fn permits_content_mutation(&self) -> bool {
        matches!(self, DepositState::Workspace)
    }
}

impl fmt::Display for DepositState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of an operation arriving at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ReplaceContent,
    AddContent,
    RemoveContent,
    EditMetadata,
    DeleteObject,
    /// Metadata-only state toggle (e.g. withdraw/reinstate); always allowed.
    ToggleState,
    Read,
    Statement,
}

impl OperationKind {
    pub fn mutates_content(&self) -> bool {
        matches!(
            self,
            OperationKind::ReplaceContent
                | OperationKind::AddContent
                | OperationKind::RemoveContent
                | OperationKind::EditMetadata
                | OperationKind::DeleteObject
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ReplaceContent => "replace_content",
            OperationKind::AddContent => "add_content",
            OperationKind::RemoveContent => "remove_content",
            OperationKind::EditMetadata => "edit_metadata",
            OperationKind::DeleteObject => "delete_object",
            OperationKind::ToggleState => "toggle_state",
            OperationKind::Read => "read",
            OperationKind::Statement => "statement",
        }
    }
}

/// Lifecycle row for one deposited object. `in_progress` tracks whether a
/// multi-step submission is still open on the depositor's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    pub object_id: Uuid,
    pub state: DepositState,
    pub in_progress: bool,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for DepositRecord {
    fn entity_type() -> &'static str { "deposit" }
    fn subject_id(&self) -> Uuid { self.object_id }
    fn severity(&self) -> Severity { Severity::Critical }
}
