//! Fixed role set with a strict hierarchy.

use serde::{Deserialize, Serialize};

/// Role granted to a user within a tenant.
///
/// Ordered so that `SuperAdmin > Admin > User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular tenant member.
    User,
    /// Tenant administrator.
    Admin,
    /// Operator across all tenants.
    SuperAdmin,
}

impl Role {
    /// Returns true if this role grants at least the `required` role.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// Returns the highest role in the set.
    #[must_use]
    pub fn highest(roles: &[Self]) -> Option<Self> {
        roles.iter().copied().max()
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}
