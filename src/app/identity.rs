use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::id::ObjectId;

/// Source of the authenticated caller for a single operation.
pub trait IdentityProvider: Send + Sync {
    fn current_caller_id(&self) -> Option<ObjectId>;
}

/// Identity resolved up front, e.g. from a verified bearer token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller(pub Option<ObjectId>);

impl Caller {
    pub fn authenticated(id: ObjectId) -> Self {
        Self(Some(id))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for Caller {
    fn current_caller_id(&self) -> Option<ObjectId> {
        self.0
    }
}

pub(crate) fn require_caller(identity: &dyn IdentityProvider) -> ServiceResult<ObjectId> {
    identity
        .current_caller_id()
        .ok_or(ServiceError::Unauthenticated)
}
