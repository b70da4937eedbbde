use thiserror::Error;
use uuid::Uuid;

/// Result type for domain and application operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Data integrity: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }

    /// Stable category name callers can match on without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Integrity(_) => "integrity",
            Self::Storage(_) => "storage",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this error came from the store rather than from a rule.
    /// Nothing retries automatically; callers decide.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Parse an identifier received from a caller.
pub fn parse_id(entity: &'static str, raw: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| DomainError::Validation(format!("Invalid {} ID format.", entity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            DomainError::not_found("Booking", Uuid::nil()),
            DomainError::Validation("x".into()),
            DomainError::Conflict("x".into()),
            DomainError::Forbidden("x".into()),
            DomainError::Integrity("x".into()),
            DomainError::Storage("x".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn only_storage_is_transient() {
        assert!(DomainError::Storage("db down".into()).is_transient());
        assert!(!DomainError::Conflict("slot taken".into()).is_transient());
    }

    #[test]
    fn parse_id_rejects_garbage() {
        let err = parse_id("Booking", "not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.to_string(), "Validation: Invalid Booking ID format.");

        let id = Uuid::new_v4();
        assert_eq!(parse_id("Booking", &id.to_string()).unwrap(), id);
    }
}
