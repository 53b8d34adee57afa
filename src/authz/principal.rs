use std::collections::HashSet;

use uuid::Uuid;

use super::catalog::{permissions_for_role, Permission, Role};

/// The authenticated actor. Built only by the resolver from a validated
/// identity-store row; the raw session payload never crosses this boundary.
///
/// `permissions` is a pure function of `role` — it is attached here once and
/// never read from a client-supplied token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    permissions: HashSet<Permission>,
}

impl Principal {
    pub fn new(id: Uuid, email: String, display_name: Option<String>, role: Role) -> Self {
        Self {
            id,
            email,
            display_name,
            role,
            permissions: permissions_for_role(role).iter().copied().collect(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Ownership primitive for the owner-exception composition. The gate
    /// carries no resource-specific rules; callers combine
    /// `owns(...) || can(...)` per operation.
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.id == owner_id
    }

    pub fn permission_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.permissions.iter().map(Permission::as_str).collect();
        names.sort_unstable();
        names
    }
}
