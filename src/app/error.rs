use crate::domain::id::ObjectId;
use crate::infra::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("user is not authenticated")]
    Unauthenticated,
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("{0}")]
    Blocked(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl ServiceError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

/// Shape-checks a caller-supplied id before it reaches a store.
pub fn parse_id(field: &'static str, raw: &str) -> ServiceResult<ObjectId> {
    ObjectId::parse(raw).map_err(|err| ServiceError::invalid(field, err.to_string()))
}

/// Converts a store error, logging real failures with the operation name.
/// An unregistered user is a lookup miss, not a persistence failure.
pub(crate) fn store_failure(operation: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
    move |err| match err {
        StoreError::UnknownUser => {
            tracing::debug!(operation, "store rejected an unregistered user");
            ServiceError::NotFound("user")
        }
        err => {
            tracing::error!(error = ?err, operation, "store operation failed");
            ServiceError::StoreFailure(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_names_the_offending_value() {
        let err = parse_id("user id", "user_abc123").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid user id: invalid id \"user_abc123\": expected 24 hexadecimal characters"
        );
    }

    #[test]
    fn unknown_user_maps_to_not_found() {
        let err = store_failure("insert block")(StoreError::UnknownUser);
        assert!(matches!(err, ServiceError::NotFound("user")));
        assert_eq!(err.to_string(), "user not found");

        let err = store_failure("insert block")(StoreError::Poisoned);
        assert!(matches!(err, ServiceError::StoreFailure(StoreError::Poisoned)));
    }
}
