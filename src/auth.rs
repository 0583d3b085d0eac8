use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::scheduling::SchedulingError;

/// Role mapping according to the dcms_user.roles smallint:
/// 0 Patient, 1 Admin, 3 Dentist, 4 Receptionist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dentist,
    Receptionist,
    Patient,
}

impl Role {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Role::Patient),
            1 => Some(Role::Admin),
            3 => Some(Role::Dentist),
            4 => Some(Role::Receptionist),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dentist => "dentist",
            Role::Receptionist => "receptionist",
            Role::Patient => "patient",
        }
    }

    /// The single capability table for appointment operations.
    pub fn allows(self, capability: Capability) -> bool {
        match self {
            Role::Admin | Role::Dentist | Role::Receptionist => true,
            Role::Patient => capability == Capability::Read,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Create,
    Update,
    Delete,
    Read,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::Update => "update",
            Capability::Delete => "delete",
            Capability::Read => "read",
        }
    }
}

/// Identity claim supplied per request by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

pub fn authorize(caller: &Caller, capability: Capability) -> Result<(), SchedulingError> {
    if caller.role.allows(capability) {
        Ok(())
    } else {
        Err(SchedulingError::Forbidden {
            role: caller.role,
            capability,
        })
    }
}

/// Hash token for DB lookup (SHA-256 hex). Only the hash is ever stored.
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
