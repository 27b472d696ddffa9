use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::policy_from_row;
use crate::errors::{AccessError, AccessResult};
use crate::models::{
    Action, ActionFilter, ObjectRef, PolicyType, Principal, ResourceKind, ResourcePolicy,
};

const DATE_FMT: &str = "%Y-%m-%d";

/// CRUD and filtered queries over `resource_policies`.
#[derive(Clone)]
pub struct PolicyStore {
    pool: SqlitePool,
}

impl PolicyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, policy: &ResourcePolicy) -> AccessResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, policy).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert a batch atomically; used by policy inheritance so a partial
    /// copy is never observable.
    pub async fn create_many(&self, policies: &[ResourcePolicy]) -> AccessResult<()> {
        let mut tx = self.pool.begin().await?;
        for policy in policies {
            Self::insert(&mut tx, policy).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        policy: &ResourcePolicy,
    ) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO resource_policies
             (id, object_id, object_kind, action, group_id, account_id, start_date, end_date,
              policy_type, name, description, reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(policy.id.to_string())
        .bind(policy.object.id.to_string())
        .bind(policy.object.kind.as_str())
        .bind(policy.action.as_str())
        .bind(policy.group_id.map(|g| g.to_string()))
        .bind(policy.account_id.map(|a| a.to_string()))
        .bind(policy.start_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(policy.end_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(policy.policy_type.map(|t| t.as_str()))
        .bind(policy.name.as_deref())
        .bind(policy.description.as_deref())
        .bind(policy.reason.as_deref())
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update(&self, policy: &ResourcePolicy) -> AccessResult<()> {
        let result = sqlx::query(
            "UPDATE resource_policies
             SET object_id = ?, object_kind = ?, action = ?, group_id = ?, account_id = ?,
                 start_date = ?, end_date = ?, policy_type = ?, name = ?, description = ?,
                 reason = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(policy.object.id.to_string())
        .bind(policy.object.kind.as_str())
        .bind(policy.action.as_str())
        .bind(policy.group_id.map(|g| g.to_string()))
        .bind(policy.account_id.map(|a| a.to_string()))
        .bind(policy.start_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(policy.end_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(policy.policy_type.map(|t| t.as_str()))
        .bind(policy.name.as_deref())
        .bind(policy.description.as_deref())
        .bind(policy.reason.as_deref())
        .bind(Utc::now())
        .bind(policy.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccessError::not_found(format!("policy {}", policy.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> AccessResult<()> {
        sqlx::query("DELETE FROM resource_policies WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> AccessResult<Option<ResourcePolicy>> {
        let row = sqlx::query("SELECT * FROM resource_policies WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(policy_from_row).transpose()
    }

    pub async fn for_object(&self, object: ObjectRef) -> AccessResult<Vec<ResourcePolicy>> {
        let rows = sqlx::query(
            "SELECT * FROM resource_policies WHERE object_id = ? ORDER BY created_at, id",
        )
        .bind(object.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(policy_from_row).collect()
    }

    pub async fn for_object_action(
        &self,
        object: ObjectRef,
        action: Action,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        let rows = sqlx::query(
            "SELECT * FROM resource_policies WHERE object_id = ? AND action = ? ORDER BY created_at, id",
        )
        .bind(object.id.to_string())
        .bind(action.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(policy_from_row).collect()
    }

    /// `ActionFilter::Any` matches every action; it is a query filter, never
    /// a grantable action.
    pub async fn for_object_action_filter(
        &self,
        object: ObjectRef,
        filter: ActionFilter,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        match filter {
            ActionFilter::Any => self.for_object(object).await,
            ActionFilter::Only(action) => self.for_object_action(object, action).await,
        }
    }

    pub async fn for_object_by_type(
        &self,
        object: ObjectRef,
        policy_type: PolicyType,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        let rows = sqlx::query(
            "SELECT * FROM resource_policies WHERE object_id = ? AND policy_type = ? ORDER BY created_at, id",
        )
        .bind(object.id.to_string())
        .bind(policy_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(policy_from_row).collect()
    }

    pub async fn for_group(&self, group_id: Uuid) -> AccessResult<Vec<ResourcePolicy>> {
        let rows = sqlx::query(
            "SELECT * FROM resource_policies WHERE group_id = ? ORDER BY created_at, id",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(policy_from_row).collect()
    }

    /// Admin policies on any object of the given kinds held by the account
    /// or any of the given groups. Backs the community/collection admin
    /// predicates; date filtering stays with the evaluator.
    pub async fn admin_policies_for_kinds(
        &self,
        kinds: &[ResourceKind],
        account_id: Option<Uuid>,
        group_ids: &[Uuid],
    ) -> AccessResult<Vec<ResourcePolicy>> {
        if kinds.is_empty() || (account_id.is_none() && group_ids.is_empty()) {
            return Ok(Vec::new());
        }

        let kind_marks = vec!["?"; kinds.len()].join(", ");
        let group_marks = vec!["?"; group_ids.len().max(1)].join(", ");
        let sql = format!(
            "SELECT * FROM resource_policies
             WHERE action = 'admin' AND object_kind IN ({kind_marks})
               AND (account_id = ? OR group_id IN ({group_marks}))",
        );

        let mut query = sqlx::query(&sql);
        for kind in kinds {
            query = query.bind(kind.as_str());
        }
        query = query.bind(account_id.map(|a| a.to_string()));
        if group_ids.is_empty() {
            // keep the placeholder count consistent; matches nothing
            query = query.bind(Option::<String>::None);
        } else {
            for group in group_ids {
                query = query.bind(group.to_string());
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(policy_from_row).collect()
    }

    pub async fn exists_identical(
        &self,
        object: ObjectRef,
        principal: Option<Principal>,
        action: Action,
    ) -> AccessResult<bool> {
        let (group_id, account_id) = match principal {
            Some(Principal::Group(g)) => (Some(g.to_string()), None),
            Some(Principal::Account(a)) => (None, Some(a.to_string())),
            None => (None, None),
        };

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM resource_policies
             WHERE object_id = ? AND action = ?
               AND group_id IS ? AND account_id IS ?",
        )
        .bind(object.id.to_string())
        .bind(action.as_str())
        .bind(group_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn delete_for_object(&self, object: ObjectRef) -> AccessResult<u64> {
        let result = sqlx::query("DELETE FROM resource_policies WHERE object_id = ?")
            .bind(object.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_object_by_type(
        &self,
        object: ObjectRef,
        policy_type: PolicyType,
    ) -> AccessResult<u64> {
        let result =
            sqlx::query("DELETE FROM resource_policies WHERE object_id = ? AND policy_type = ?")
                .bind(object.id.to_string())
                .bind(policy_type.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Deletes every policy on the object whose type differs from the given
    /// one. Rows with no type at all are kept: an untyped policy carries no
    /// provenance to match against.
    pub async fn delete_for_object_type_not(
        &self,
        object: ObjectRef,
        policy_type: PolicyType,
    ) -> AccessResult<u64> {
        let result = sqlx::query(
            "DELETE FROM resource_policies
             WHERE object_id = ? AND policy_type IS NOT NULL AND policy_type != ?",
        )
        .bind(object.id.to_string())
        .bind(policy_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_object_action(
        &self,
        object: ObjectRef,
        action: Action,
    ) -> AccessResult<u64> {
        let result = sqlx::query("DELETE FROM resource_policies WHERE object_id = ? AND action = ?")
            .bind(object.id.to_string())
            .bind(action.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_object_action_and_type(
        &self,
        object: ObjectRef,
        action: Action,
        policy_type: PolicyType,
    ) -> AccessResult<u64> {
        let result = sqlx::query(
            "DELETE FROM resource_policies WHERE object_id = ? AND action = ? AND policy_type = ?",
        )
        .bind(object.id.to_string())
        .bind(action.as_str())
        .bind(policy_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_group(&self, group_id: Uuid) -> AccessResult<u64> {
        let result = sqlx::query("DELETE FROM resource_policies WHERE group_id = ?")
            .bind(group_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_account_on_object(
        &self,
        object: ObjectRef,
        account_id: Uuid,
    ) -> AccessResult<u64> {
        let result =
            sqlx::query("DELETE FROM resource_policies WHERE object_id = ? AND account_id = ?")
                .bind(object.id.to_string())
                .bind(account_id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Rewrite the action of every matching policy in place, preserving
    /// principal and dates.
    pub async fn switch_action(
        &self,
        object: ObjectRef,
        from: Action,
        to: Action,
    ) -> AccessResult<u64> {
        let result = sqlx::query(
            "UPDATE resource_policies SET action = ?, updated_at = ? WHERE object_id = ? AND action = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(object.id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
