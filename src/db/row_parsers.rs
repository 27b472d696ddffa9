use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AccessError;
use crate::models::{
    Account, Action, DepositRecord, DepositState, Group, ObjectRef, PolicyType, ResourceKind,
    ResourcePolicy,
};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AccessError> {
    let s = s.trim();

    // Try RFC3339 first (e.g. 2026-07-10T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    // Try date-only format: "YYYY-MM-DD"
    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AccessError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AccessError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, AccessError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| AccessError::internal(format!("invalid date: {}", e)))
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, AccessError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_date(&s)?)),
        _ => Ok(None),
    }
}

fn get_uuid(row: &SqliteRow, col: &str) -> Result<Uuid, AccessError> {
    let s: String = row
        .try_get(col)
        .map_err(|e| AccessError::internal(format!("missing {}: {}", col, e)))?;
    Uuid::parse_str(&s).map_err(|e| AccessError::internal(format!("invalid uuid in {}: {}", col, e)))
}

fn get_opt_uuid(row: &SqliteRow, col: &str) -> Result<Option<Uuid>, AccessError> {
    let s: Option<String> = row
        .try_get(col)
        .map_err(|e| AccessError::internal(format!("missing {}: {}", col, e)))?;
    match s {
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|e| AccessError::internal(format!("invalid uuid in {}: {}", col, e))),
        None => Ok(None),
    }
}

fn get_datetime(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, AccessError> {
    let s: String = row
        .try_get(col)
        .map_err(|e| AccessError::internal(format!("missing {}: {}", col, e)))?;
    parse_datetime(&s)
}

pub fn policy_from_row(row: &SqliteRow) -> Result<ResourcePolicy, AccessError> {
    let kind_s: String = row
        .try_get("object_kind")
        .map_err(|e| AccessError::internal(format!("missing object_kind: {}", e)))?;
    let kind = ResourceKind::parse(&kind_s)
        .ok_or_else(|| AccessError::internal(format!("unknown object kind: {}", kind_s)))?;

    let action_s: String = row
        .try_get("action")
        .map_err(|e| AccessError::internal(format!("missing action: {}", e)))?;
    let action = Action::parse(&action_s)
        .ok_or_else(|| AccessError::internal(format!("unknown action: {}", action_s)))?;

    let policy_type_s: Option<String> = row
        .try_get("policy_type")
        .map_err(|e| AccessError::internal(format!("missing policy_type: {}", e)))?;
    let policy_type = match policy_type_s {
        Some(s) => Some(
            PolicyType::parse(&s)
                .ok_or_else(|| AccessError::internal(format!("unknown policy type: {}", s)))?,
        ),
        None => None,
    };

    let start_date_s: Option<String> = row
        .try_get("start_date")
        .map_err(|e| AccessError::internal(format!("missing start_date: {}", e)))?;
    let end_date_s: Option<String> = row
        .try_get("end_date")
        .map_err(|e| AccessError::internal(format!("missing end_date: {}", e)))?;

    Ok(ResourcePolicy {
        id: get_uuid(row, "id")?,
        object: ObjectRef::new(kind, get_uuid(row, "object_id")?),
        action,
        group_id: get_opt_uuid(row, "group_id")?,
        account_id: get_opt_uuid(row, "account_id")?,
        start_date: parse_opt_date(start_date_s)?,
        end_date: parse_opt_date(end_date_s)?,
        policy_type,
        name: row
            .try_get("name")
            .map_err(|e| AccessError::internal(format!("missing name: {}", e)))?,
        description: row
            .try_get("description")
            .map_err(|e| AccessError::internal(format!("missing description: {}", e)))?,
        reason: row
            .try_get("reason")
            .map_err(|e| AccessError::internal(format!("missing reason: {}", e)))?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn account_from_row(row: &SqliteRow) -> Result<Account, AccessError> {
    let is_admin: i64 = row
        .try_get("is_admin")
        .map_err(|e| AccessError::internal(format!("missing is_admin: {}", e)))?;

    Ok(Account {
        id: get_uuid(row, "id")?,
        email: row
            .try_get("email")
            .map_err(|e| AccessError::internal(format!("missing email: {}", e)))?,
        name: row
            .try_get("name")
            .map_err(|e| AccessError::internal(format!("missing name: {}", e)))?,
        is_admin: is_admin != 0,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn group_from_row(row: &SqliteRow) -> Result<Group, AccessError> {
    Ok(Group {
        id: get_uuid(row, "id")?,
        name: row
            .try_get("name")
            .map_err(|e| AccessError::internal(format!("missing name: {}", e)))?,
        description: row
            .try_get("description")
            .map_err(|e| AccessError::internal(format!("missing description: {}", e)))?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn object_from_row(row: &SqliteRow) -> Result<ObjectRef, AccessError> {
    let kind_s: String = row
        .try_get("kind")
        .map_err(|e| AccessError::internal(format!("missing kind: {}", e)))?;
    let kind = ResourceKind::parse(&kind_s)
        .ok_or_else(|| AccessError::internal(format!("unknown object kind: {}", kind_s)))?;

    Ok(ObjectRef::new(kind, get_uuid(row, "id")?))
}

pub fn deposit_from_row(row: &SqliteRow) -> Result<DepositRecord, AccessError> {
    let state_s: String = row
        .try_get("state")
        .map_err(|e| AccessError::internal(format!("missing state: {}", e)))?;
    let state = DepositState::parse(&state_s)
        .ok_or_else(|| AccessError::internal(format!("unknown deposit state: {}", state_s)))?;
    let in_progress: i64 = row
        .try_get("in_progress")
        .map_err(|e| AccessError::internal(format!("missing in_progress: {}", e)))?;

    Ok(DepositRecord {
        object_id: get_uuid(row, "object_id")?,
        state,
        in_progress: in_progress != 0,
        updated_at: get_datetime(row, "updated_at")?,
    })
}
