use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::object_from_row;
use crate::errors::AccessResult;
use crate::models::ObjectRef;

/// Registry of governed objects and their containment hierarchy.
#[derive(Clone)]
pub struct ObjectStore {
    pool: SqlitePool,
}

impl ObjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, object: ObjectRef, parent_id: Option<Uuid>) -> AccessResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO archive_objects (id, kind, parent_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(object.id.to_string())
        .bind(object.kind.as_str())
        .bind(parent_id.map(|p| p.to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> AccessResult<Option<ObjectRef>> {
        let row = sqlx::query("SELECT id, kind FROM archive_objects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(object_from_row).transpose()
    }

    /// Containing object, if any (bitstream -> bundle -> item -> collection
    /// -> community).
    pub async fn parent_of(&self, id: Uuid) -> AccessResult<Option<ObjectRef>> {
        let row = sqlx::query(
            "SELECT p.id AS id, p.kind AS kind
             FROM archive_objects c
             JOIN archive_objects p ON c.parent_id = p.id
             WHERE c.id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(object_from_row).transpose()
    }

    /// Drop an object together with its policies and lifecycle row. A
    /// destroyed object must not leave grants behind.
    pub async fn delete(&self, object: ObjectRef) -> AccessResult<()> {
        let id = object.id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM resource_policies WHERE object_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM deposit_states WHERE object_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM archive_objects WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
