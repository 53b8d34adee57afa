//! Authorization core: permission catalog, principal resolution, and the
//! gate every protected operation passes through.
//!
//! Resolution order per request: credentials -> resolver (one identity-store
//! read, bounded cache) -> gate decision. Permissions are always recomputed
//! from the authoritative role; a session token never carries a permission
//! list.

pub mod catalog;
pub mod gate;
pub mod guard;
pub mod principal;
pub mod resolver;

pub use catalog::{is_valid_permission, permissions_for_role, Permission, Role};
pub use gate::{AuthorizationDecision, AuthorizationGate};
pub use guard::{route_guard, RouteClass};
pub use principal::Principal;
pub use resolver::{IdentityStore, PrincipalRecord, PrincipalResolver};
