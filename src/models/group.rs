use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// Name of the implicit group every caller belongs to.
pub const ANONYMOUS: &str = "Anonymous";

/// Named set of accounts. Groups may contain other groups; resolution of
/// nested membership is transitive and cycle-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Group {
    fn entity_type() -> &'static str { "group" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}
