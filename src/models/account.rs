use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// An authenticated identity. Anonymous callers carry no `Account` at all;
/// `is_admin` marks the System Administrator role (global bypass).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Account {
    fn entity_type() -> &'static str { "account" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}
