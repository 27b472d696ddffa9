use std::fmt;

use serde::{Deserialize, Serialize};

/// Grantable actions. `default_item_read` / `default_bitstream_read` are the
/// template actions a collection carries for policies that will be stamped
/// onto newly deposited items and bitstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Delete,
    Add,
    Remove,
    Admin,
    WithdrawnRead,
    DefaultItemRead,
    DefaultBitstreamRead,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Admin => "admin",
            Action::WithdrawnRead => "withdrawn_read",
            Action::DefaultItemRead => "default_item_read",
            Action::DefaultBitstreamRead => "default_bitstream_read",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Action::Read),
            "write" => Some(Action::Write),
            "delete" => Some(Action::Delete),
            "add" => Some(Action::Add),
            "remove" => Some(Action::Remove),
            "admin" => Some(Action::Admin),
            "withdrawn_read" => Some(Action::WithdrawnRead),
            "default_item_read" => Some(Action::DefaultItemRead),
            "default_bitstream_read" => Some(Action::DefaultBitstreamRead),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-side action filter. The wildcard exists only here: `Action` has no
/// "any" member, so a wildcard can never be granted or matched as a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFilter {
    Any,
    Only(Action),
}

impl ActionFilter {
    pub fn matches(&self, action: Action) -> bool {
        match self {
            ActionFilter::Any => true,
            ActionFilter::Only(wanted) => *wanted == action,
        }
    }
}
