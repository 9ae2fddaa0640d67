// src/utils/ownership.rs

use crate::{error::AppError, models::id::ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Only the recorded owner may act on a resource.
pub fn authorize(owner: &ObjectId, principal: &ObjectId) -> Decision {
    if owner == principal {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Call after the existence check and before any write.
pub fn ensure_owner(owner: &ObjectId, principal: &ObjectId, action: &str) -> Result<(), AppError> {
    match authorize(owner, principal) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(%owner, %principal, action, "ownership check denied");
            Err(AppError::Forbidden(format!("You are not authorized to {}", action)))
        }
    }
}
