use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{Capability, Role};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("end_time ({end}) must be after start_time ({start})")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("slot conflicts with appointment {conflicting_id} [{start}, {end})")]
    SlotConflict {
        conflicting_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("appointment not found: {0}")]
    NotFound(Uuid),

    #[error("role {} may not {} appointments", role.as_str(), capability.as_str())]
    Forbidden { role: Role, capability: Capability },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchedulingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SchedulingError::Validation(msg.into())
    }
}
