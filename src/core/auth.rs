//! Role resolution and the admin gate in front of every mutation.

use crate::core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

/// Minimum privilege a handler demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// admin or super_admin
    Admin,
    /// super_admin only
    SuperAdmin,
}

impl AccessLevel {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            AccessLevel::Admin => role >= Role::Admin,
            AccessLevel::SuperAdmin => role == Role::SuperAdmin,
        }
    }
}

pub trait RoleResolver: Send + Sync {
    /// `None` for unknown actors.
    fn role_of(&self, actor: &str) -> Option<Role>;
}

/// Roles from the `roles` section of the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigRoles {
    roles: HashMap<String, Role>,
}

impl ConfigRoles {
    pub fn new(roles: HashMap<String, Role>) -> Self {
        Self { roles }
    }
}

impl RoleResolver for ConfigRoles {
    fn role_of(&self, actor: &str) -> Option<Role> {
        self.roles.get(actor).copied()
    }
}

#[derive(Clone)]
pub struct AdminGate {
    resolver: Arc<dyn RoleResolver>,
}

impl AdminGate {
    pub fn new(resolver: Arc<dyn RoleResolver>) -> Self {
        Self { resolver }
    }

    /// Fails with [`EngineError::Unauthorized`] for anonymous callers,
    /// unknown actors and insufficient roles alike.
    pub fn authorize(&self, actor: Option<&str>, level: AccessLevel) -> Result<()> {
        let Some(actor) = actor.filter(|a| !a.is_empty()) else {
            warn!(?level, "Rejected anonymous admin request");
            return Err(EngineError::Unauthorized);
        };
        match self.resolver.role_of(actor) {
            Some(role) if level.allows(role) => Ok(()),
            role => {
                warn!(actor, ?role, ?level, "Rejected admin request");
                Err(EngineError::Unauthorized)
            }
        }
    }
}
