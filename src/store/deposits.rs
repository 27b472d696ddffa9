use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::deposit_from_row;
use crate::errors::AccessResult;
use crate::models::{DepositRecord, DepositState};

/// Deposit state reader/writer keyed by object id.
#[derive(Clone)]
pub struct DepositStateStore {
    pool: SqlitePool,
}

impl DepositStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record_of(&self, object_id: Uuid) -> AccessResult<Option<DepositRecord>> {
        let row = sqlx::query("SELECT * FROM deposit_states WHERE object_id = ?")
            .bind(object_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    /// Create the lifecycle row for a fresh deposit (Workspace, in
    /// progress). Existing rows are left untouched.
    pub async fn open(&self, object_id: Uuid) -> AccessResult<DepositRecord> {
        let record = DepositRecord {
            object_id,
            state: DepositState::Workspace,
            in_progress: true,
            updated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT OR IGNORE INTO deposit_states (object_id, state, in_progress, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(object_id.to_string())
        .bind(record.state.as_str())
        .bind(record.in_progress as i64)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        match self.record_of(object_id).await? {
            Some(existing) => Ok(existing),
            None => Ok(record),
        }
    }

    pub async fn set_state(&self, object_id: Uuid, state: DepositState) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO deposit_states (object_id, state, in_progress, updated_at)
             VALUES (?, ?, 0, ?)
             ON CONFLICT(object_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(object_id.to_string())
        .bind(state.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_in_progress(&self, object_id: Uuid, in_progress: bool) -> AccessResult<()> {
        sqlx::query("UPDATE deposit_states SET in_progress = ?, updated_at = ? WHERE object_id = ?")
            .bind(in_progress as i64)
            .bind(Utc::now())
            .bind(object_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
