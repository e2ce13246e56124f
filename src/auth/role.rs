use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::session::SessionState;

/// Role hierarchy, totally ordered. Derived `Ord` follows declaration order,
/// so Employee < Manager < Owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Per-operation privilege gate, independent of tenant scoping.
///
/// Checks, in order: the caller is authenticated; the account is active;
/// owner-floor operations are refused outright while impersonation is active
/// (impersonation grants visibility into another tenant's data, never
/// administrative authority over it); and finally the caller's role clears
/// the floor.
pub fn require_role(
    auth: Option<&AuthUser>,
    session: &SessionState,
    floor: Role,
) -> Result<(), ApiError> {
    let user = auth.ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;

    if !user.is_active {
        return Err(ApiError::account_disabled("Account is disabled"));
    }

    if floor == Role::Owner && session.is_impersonating() {
        return Err(ApiError::impersonation_forbidden(
            "Owner-level actions are not permitted while impersonating",
        ));
    }

    if user.role < floor {
        return Err(ApiError::insufficient_permissions(format!(
            "This action requires the {} role",
            floor
        )));
    }

    Ok(())
}
