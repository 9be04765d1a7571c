//! Caller identity.
//!
//! Authentication happens upstream; every mutating operation receives an
//! already-verified user id and campaign role and only checks the role and
//! ownership preconditions of the operation itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A caller's role within the campaign being addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignRole {
    /// Game master: may open, resolve and abort scenes and drive combat.
    Admin,
    /// Player: may act for the characters they own.
    Player,
}

impl std::str::FromStr for CampaignRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "gm" => Ok(Self::Admin),
            "player" => Ok(Self::Player),
            other => Err(DomainError::Validation(format!(
                "unknown campaign role: {other}"
            ))),
        }
    }
}

/// A pre-authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// The authenticated user.
    pub user_id: Uuid,
    /// The user's role in the addressed campaign.
    pub role: CampaignRole,
}

impl Caller {
    /// Creates an admin caller.
    #[must_use]
    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: CampaignRole::Admin,
        }
    }

    /// Creates a player caller.
    #[must_use]
    pub fn player(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: CampaignRole::Player,
        }
    }

    /// Returns `true` if the caller is the campaign's game master.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == CampaignRole::Admin
    }

    /// Fails unless the caller is an admin.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Permission` naming the attempted operation.
    pub fn require_admin(&self, operation: &str) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Permission(format!(
                "{operation} requires the admin role"
            )))
        }
    }

    /// Fails unless the caller owns the resource or is an admin.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Permission` if neither holds.
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<(), DomainError> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(DomainError::Permission(
                "caller does not own this character".to_owned(),
            ))
        }
    }
}
