use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::{account_from_row, group_from_row};
use crate::errors::{AccessError, AccessResult};
use crate::models::{group, Account, Group};

/// Account/group directory: identities, membership edges, and the cascades
/// that keep policies free of dangling principals.
#[derive(Clone)]
pub struct GroupDirectory {
    pool: SqlitePool,
}

impl GroupDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_account(
        &self,
        email: &str,
        name: &str,
        is_admin: bool,
    ) -> AccessResult<Account> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            is_admin,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO accounts (id, email, name, is_admin, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account.id.to_string())
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.is_admin as i64)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn find_account(&self, id: Uuid) -> AccessResult<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn find_account_by_email(&self, email: &str) -> AccessResult<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn create_group(&self, name: &str, description: Option<&str>) -> AccessResult<Group> {
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO actor_groups (id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.description.as_deref())
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("UNIQUE") => {
                AccessError::conflict(format!("group name already exists: {}", name))
            }
            other => AccessError::Database(other),
        })?;

        Ok(group)
    }

    pub async fn find_group(&self, id: Uuid) -> AccessResult<Option<Group>> {
        let row = sqlx::query("SELECT * FROM actor_groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(group_from_row).transpose()
    }

    pub async fn find_group_by_name(&self, name: &str) -> AccessResult<Option<Group>> {
        let row = sqlx::query("SELECT * FROM actor_groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(group_from_row).transpose()
    }

    pub async fn anonymous_group(&self) -> AccessResult<Option<Group>> {
        self.find_group_by_name(group::ANONYMOUS).await
    }

    pub async fn list_groups(&self) -> AccessResult<Vec<Group>> {
        let rows = sqlx::query("SELECT * FROM actor_groups ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(group_from_row).collect()
    }

    pub async fn add_account_to_group(&self, group_id: Uuid, account_id: Uuid) -> AccessResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO group_member_accounts (group_id, account_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(group_id.to_string())
        .bind(account_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_account_from_group(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> AccessResult<()> {
        sqlx::query("DELETE FROM group_member_accounts WHERE group_id = ? AND account_id = ?")
            .bind(group_id.to_string())
            .bind(account_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_subgroup(&self, parent_id: Uuid, child_id: Uuid) -> AccessResult<()> {
        if parent_id == child_id {
            return Err(AccessError::bad_request("a group cannot contain itself"));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO group_member_groups (parent_group_id, child_group_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(parent_id.to_string())
        .bind(child_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Direct (non-transitive) group memberships of an account.
    pub async fn direct_groups_of_account(&self, account_id: Uuid) -> AccessResult<Vec<Uuid>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT group_id FROM group_member_accounts WHERE account_id = ?")
                .bind(account_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|e| AccessError::internal(format!("invalid uuid in group_id: {}", e)))
            })
            .collect()
    }

    /// Groups that directly contain the given group. Membership in a child
    /// group implies membership in every group containing it.
    pub async fn parent_groups_of(&self, group_id: Uuid) -> AccessResult<Vec<Uuid>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT parent_group_id FROM group_member_groups WHERE child_group_id = ?",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|s| {
                Uuid::parse_str(s).map_err(|e| {
                    AccessError::internal(format!("invalid uuid in parent_group_id: {}", e))
                })
            })
            .collect()
    }

    /// Delete a group together with its membership edges and every policy
    /// that references it, in one transaction. A grant must never dangle.
    pub async fn delete_group(&self, group_id: Uuid) -> AccessResult<()> {
        let id = group_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM resource_policies WHERE group_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_member_accounts WHERE group_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM group_member_groups WHERE parent_group_id = ? OR child_group_id = ?",
        )
        .bind(&id)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM actor_groups WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete an account, its memberships, and its direct policies.
    pub async fn delete_account(&self, account_id: Uuid) -> AccessResult<()> {
        let id = account_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM resource_policies WHERE account_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_member_accounts WHERE account_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
