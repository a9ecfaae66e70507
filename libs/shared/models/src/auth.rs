use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Clinic staff and patient roles, as resolved by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Practitioner,
    Client,
}

impl Role {
    /// Admins, managers and practitioners bypass self-ownership and
    /// rate-limit checks on scheduling operations.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Practitioner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::Practitioner => write!(f, "practitioner"),
            Role::Client => write!(f, "client"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "practitioner" => Ok(Role::Practitioner),
            "client" => Ok(Role::Client),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Pre-resolved caller identity threaded into every engine operation.
/// The engine never reads ambient security state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    pub identity: Uuid,
    pub privileged: bool,
}

impl CallerContext {
    pub fn new(identity: Uuid, role: Role) -> Self {
        Self {
            identity,
            privileged: role.is_privileged(),
        }
    }

    pub fn privileged(identity: Uuid) -> Self {
        Self {
            identity,
            privileged: true,
        }
    }

    pub fn client(identity: Uuid) -> Self {
        Self {
            identity,
            privileged: false,
        }
    }
}

/// Directory record for a clinic user. `priority_practitioner_id` is a
/// non-owning reference resolved lazily through the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub priority_practitioner_id: Option<Uuid>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
