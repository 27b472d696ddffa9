pub type AccessResult<T> = Result<T, AccessError>;

#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("method not allowed: {0}")]
    Gate(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn gate(message: impl Into<String>) -> Self {
        Self::Gate(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for the denial variants a caller maps to a 401/403-style response.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::Gate(_))
    }
}

impl From<anyhow::Error> for AccessError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
