//! Single source of truth for roles, permission identifiers, and the
//! role -> permission mapping. The mapping is a pure lookup table over a
//! closed enumeration; nothing here touches the database.

use std::fmt;

/// Closed role enumeration stored in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::User => "USER",
        }
    }

    /// Lenient mapping used at resolution time: an unknown or missing role
    /// degrades to the least-privileged role instead of erroring, so every
    /// principal always has a defined permission set.
    pub fn resolve(value: Option<&str>) -> Role {
        match value {
            Some("ADMIN") => Role::Admin,
            Some("MANAGER") => Role::Manager,
            _ => Role::User,
        }
    }

    /// Strict mapping used to validate administrative input.
    pub fn parse(value: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of permission identifiers. Never extended at runtime; the
/// relational admin surface validates against this set before persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    TasksCreate,
    TasksRead,
    TasksUpdate,
    TasksDelete,
    TasksAssign,
    CommentsCreate,
    CommentsUpdate,
    CommentsDelete,
    UsersManage,
    RolesManage,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::TasksCreate,
        Permission::TasksRead,
        Permission::TasksUpdate,
        Permission::TasksDelete,
        Permission::TasksAssign,
        Permission::CommentsCreate,
        Permission::CommentsUpdate,
        Permission::CommentsDelete,
        Permission::UsersManage,
        Permission::RolesManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::TasksCreate => "tasks.create",
            Permission::TasksRead => "tasks.read",
            Permission::TasksUpdate => "tasks.update",
            Permission::TasksDelete => "tasks.delete",
            Permission::TasksAssign => "tasks.assign",
            Permission::CommentsCreate => "comments.create",
            Permission::CommentsUpdate => "comments.update",
            Permission::CommentsDelete => "comments.delete",
            Permission::UsersManage => "users.manage",
            Permission::RolesManage => "roles.manage",
        }
    }

    pub fn parse(name: &str) -> Option<Permission> {
        Permission::ALL.into_iter().find(|perm| perm.as_str() == name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_valid_permission(name: &str) -> bool {
    Permission::parse(name).is_some()
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::TasksCreate,
    Permission::TasksRead,
    Permission::TasksUpdate,
    Permission::CommentsCreate,
    Permission::CommentsUpdate,
];

const MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::TasksCreate,
    Permission::TasksRead,
    Permission::TasksUpdate,
    Permission::TasksAssign,
    Permission::CommentsCreate,
    Permission::CommentsUpdate,
    Permission::CommentsDelete,
];

/// Pure, total role -> permission lookup. Privilege is strictly monotonic:
/// USER's grants are a subset of MANAGER's, which are a subset of ADMIN's.
pub fn permissions_for_role(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => &Permission::ALL,
        Role::Manager => MANAGER_PERMISSIONS,
        Role::User => USER_PERMISSIONS,
    }
}
