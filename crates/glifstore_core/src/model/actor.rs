//! Calling actor identity.
//!
//! Identity and the administrator capability are decided by the caller
//! (authentication/permission layer); the core only carries them.

use serde::{Deserialize, Serialize};

/// Authenticated user on whose behalf a mutation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    /// Administrative override: may force-acquire locks held by others.
    pub is_admin: bool,
}

impl Actor {
    pub fn designer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    /// Blank ids never own locks or audit entries.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}
