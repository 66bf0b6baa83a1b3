//! Role and ownership authorization.
//!
//! Denials keep the structured detail (required vs. actual role, the
//! owner mismatch) for the audit trail, while the error handed to the
//! HTTP layer is a generic 403 that reveals neither.

use uuid::Uuid;

use errors::EntregaError;

use super::{Principal, Role};

/// A structured authorization denial, for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDenial {
    Role { required: Vec<Role>, actual: Role },
    Ownership { principal_id: Uuid, owner_id: Uuid },
}

impl PolicyDenial {
    /// Audit-facing description. Never sent to clients.
    pub fn detail(&self) -> String {
        match self {
            PolicyDenial::Role { required, actual } => {
                let required: Vec<&str> = required.iter().map(Role::as_str).collect();
                format!("role denial: required {:?}, actual {}", required, actual)
            },
            PolicyDenial::Ownership {
                principal_id,
                owner_id,
            } => format!(
                "ownership denial: principal {} is not owner {}",
                principal_id, owner_id
            ),
        }
    }

    /// The client-facing error: a generic 403 with no role/ownership
    /// detail, so callers cannot probe resource existence or role sets.
    pub fn into_error(self) -> EntregaError {
        EntregaError::Forbidden("access denied".to_string())
    }
}

/// Check that the principal's role appears in `required`.
///
/// `admin` satisfies any requirement; every other role must appear
/// literally in the required set.
pub fn authorize(principal: &Principal, required: &[Role]) -> Result<(), PolicyDenial> {
    if principal.role == Role::Admin || required.contains(&principal.role) {
        return Ok(());
    }
    Err(PolicyDenial::Role {
        required: required.to_vec(),
        actual: principal.role,
    })
}

/// Check that the principal owns the resource. Admin bypasses.
pub fn authorize_ownership(principal: &Principal, owner_id: Uuid) -> Result<(), PolicyDenial> {
    if principal.role == Role::Admin || principal.id == owner_id {
        return Ok(());
    }
    Err(PolicyDenial::Ownership {
        principal_id: principal.id,
        owner_id,
    })
}
