use std::sync::Arc;

use crate::errors::AppError;
use crate::session::SessionCredentials;

use super::catalog::Permission;
use super::principal::Principal;
use super::resolver::PrincipalResolver;

/// Request-scoped outcome of an authorization check. Never persisted and
/// never cached; the carried principal lets the caller stamp
/// `creator_id`/`author_id` fields without a second resolution.
#[derive(Debug)]
pub enum AuthorizationDecision {
    Authorized(Principal),
    Unauthenticated,
    Forbidden,
}

impl AuthorizationDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationDecision::Authorized(_))
    }

    /// Collapse a denial into the matching HTTP-mapped error. Denials carry
    /// no internal detail.
    pub fn require(self) -> Result<Principal, AppError> {
        match self {
            AuthorizationDecision::Authorized(principal) => Ok(principal),
            AuthorizationDecision::Unauthenticated => Err(AppError::unauthorized("authentication required")),
            AuthorizationDecision::Forbidden => Err(AppError::forbidden("insufficient permissions")),
        }
    }
}

/// The single choke point for protected operations. Stateless; denial is a
/// normal return value, and only identity-store failures surface as errors.
///
/// Checks run before any resource lookup, so a caller lacking the permission
/// receives Forbidden whether or not the resource exists. Ownership
/// exceptions are composed by the caller from `Principal::owns` and
/// `Principal::can`; the gate hardcodes no resource-specific rules.
#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: Arc<PrincipalResolver>,
}

impl AuthorizationGate {
    pub fn new(resolver: Arc<PrincipalResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PrincipalResolver {
        &self.resolver
    }

    pub async fn check_permission(
        &self,
        credentials: &SessionCredentials,
        permission: Permission,
    ) -> Result<AuthorizationDecision, AppError> {
        let Some(principal) = self.resolver.resolve(credentials).await? else {
            tracing::debug!(permission = %permission, "denied: no session");
            return Ok(AuthorizationDecision::Unauthenticated);
        };

        if !principal.can(permission) {
            tracing::debug!(
                user_id = %principal.id,
                role = %principal.role,
                permission = %permission,
                "denied: permission not granted"
            );
            return Ok(AuthorizationDecision::Forbidden);
        }

        tracing::debug!(user_id = %principal.id, permission = %permission, "authorized");
        Ok(AuthorizationDecision::Authorized(principal))
    }

    /// Check-and-unwrap for handlers that want 401/403 errors directly.
    pub async fn require(
        &self,
        credentials: &SessionCredentials,
        permission: Permission,
    ) -> Result<Principal, AppError> {
        self.check_permission(credentials, permission).await?.require()
    }

    /// Authentication without a permission requirement (e.g. `/auth/me`,
    /// owner-composed operations that decide after loading the resource).
    pub async fn authenticate(&self, credentials: &SessionCredentials) -> Result<Principal, AppError> {
        self.resolver
            .resolve(credentials)
            .await?
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }
}
