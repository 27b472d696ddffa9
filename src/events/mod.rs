use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(
        name: impl Into<String>,
        actor_id: Option<Uuid>,
        subject_id: Option<Uuid>,
        payload: T,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Structured activity payload: new state, optional previous state, severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// The current/new state of the entity
    #[serde(rename = "new")]
    pub current: Value,
    /// The previous state (for update/delete operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    /// Severity level for retention policy
    pub severity: Severity,
}

/// Record an action on a `Loggable` entity. Fire and forget: logging
/// failures must not break the mutation that triggered them.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
) {
    log_activity_with_old(event_bus, action, actor_id, entity, None);
}

pub fn log_activity_with_old<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    let severity = entity.severity_for_action(action);
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        severity,
    };

    let event = DomainEvent::new(
        event_name,
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

fn describe(event_name: &str) -> &'static str {
    match event_name {
        "policy.created" => "Policy created",
        "policy.updated" => "Policy updated",
        "policy.deleted" => "Policy deleted",
        "group.created" => "Group created",
        "group.deleted" => "Group deleted",
        "account.created" => "Account created",
        "account.deleted" => "Account deleted",
        "deposit.transitioned" => "Deposit changed state",
        _ => "System event",
    }
}

/// Drain the event bus into the `activity_log` projection and the
/// hash-chained `event_store`.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("Activity listener started");
    while let Ok(event) = rx.recv().await {
        let event_json = event.clone();

        let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
        let actor_id = event
            .get("actor_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let subject_id = event
            .get("subject_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let occurred_at = event
            .get("occurred_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let severity = event
            .get("payload")
            .and_then(|p| p.get("severity"))
            .and_then(|s| s.as_str())
            .unwrap_or("important")
            .to_string();

        let result = sqlx::query(
            "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(describe(name))
        .bind(actor_id.map(|u| u.to_string()))
        .bind(subject_id.map(|u| u.to_string()))
        .bind(occurred_at)
        .bind(event_json.to_string())
        .bind(&severity)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to save activity log: {}", e);
        }

        // Append to the tamper-evident event store: hash = SHA256(prev_hash || payload)
        let payload_str = event_json.to_string();
        let prev_hash: Option<String> = sqlx::query_scalar(
            "SELECT hash FROM event_store ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .fetch_optional(&pool)
        .await
        .ok()
        .flatten();

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        if let Some(ref ph) = prev_hash {
            hasher.update(ph.as_bytes());
        }
        hasher.update(payload_str.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let store_result = sqlx::query(
            "INSERT INTO event_store (id, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(occurred_at)
        .bind(actor_id.map(|u| u.to_string()))
        .bind(subject_id.map(|u| u.to_string()))
        .bind(&payload_str)
        .bind(&severity)
        .bind(&prev_hash)
        .bind(&hash)
        .execute(&pool)
        .await;

        if let Err(e) = store_result {
            tracing::error!("Failed to save to event store: {}", e);
        }
    }
}
