use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs. Controls retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical events: long-term retention, never auto-delete
    Critical,
    /// Important events: medium-term retention (default)
    Important,
    /// Noise events: aggressively trimmed
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Trait for entities that can be recorded in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g. "policy", "group"); becomes the prefix in
    /// event names like "policy.created".
    fn entity_type() -> &'static str;

    /// The subject ID (usually the entity's primary key)
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action ("deleted" is always critical).
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
