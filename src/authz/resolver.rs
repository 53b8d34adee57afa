use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::catalog::Role;
use super::principal::Principal;
use crate::errors::AppError;
use crate::session::{SessionConfig, SessionCredentials};

/// How long a resolved principal may be served without re-reading the
/// identity store. Within this window a role change made by another process
/// may not take effect; local role mutations call `invalidate` and bypass it.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Row shape the resolver needs from the identity store.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
}

/// Seam over the identity store so the resolver can be exercised without a
/// database. The production implementation is the pooled SQLite handle.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_principal(&self, user_id: Uuid) -> Result<Option<PrincipalRecord>, AppError>;
}

#[async_trait]
impl IdentityStore for SqlitePool {
    async fn find_principal(&self, user_id: Uuid) -> Result<Option<PrincipalRecord>, AppError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>)>(
            "SELECT id, email, name, role FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self)
        .await?;

        Ok(row.map(|(id, email, display_name, role)| PrincipalRecord {
            id,
            email,
            display_name,
            role,
        }))
    }
}

/// Converts raw request credentials into a `Principal`, or determines there
/// is none. At most one identity-store read per request; a missing or invalid
/// credential is `Ok(None)`, never an error. Only store failures propagate,
/// so an outage surfaces as 5xx instead of "please log in".
pub struct PrincipalResolver {
    sessions: Arc<SessionConfig>,
    store: Arc<dyn IdentityStore>,
    cache: Mutex<HashMap<Uuid, (Principal, Instant)>>,
    ttl: Duration,
}

impl PrincipalResolver {
    pub fn new(sessions: Arc<SessionConfig>, store: Arc<dyn IdentityStore>) -> Self {
        Self::with_ttl(sessions, store, CACHE_TTL)
    }

    pub fn with_ttl(sessions: Arc<SessionConfig>, store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        Self {
            sessions,
            store,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn resolve(&self, credentials: &SessionCredentials) -> Result<Option<Principal>, AppError> {
        let Some(token) = credentials.token.as_deref() else {
            return Ok(None);
        };

        let Some(claims) = self.sessions.verify(token) else {
            tracing::debug!("session token failed verification");
            return Ok(None);
        };

        if let Some(principal) = self.cached(claims.sub) {
            return Ok(Some(principal));
        }

        let Some(record) = self.store.find_principal(claims.sub).await? else {
            // Session outlived the account; drop any stale cache entry.
            self.invalidate(claims.sub);
            return Ok(None);
        };

        let role = Role::resolve(record.role.as_deref());
        let principal = Principal::new(record.id, record.email, record.display_name, role);

        tracing::debug!(user_id = %principal.id, role = %principal.role, "principal resolved");

        self.cache
            .lock()
            .expect("principal cache poisoned")
            .insert(principal.id, (principal.clone(), Instant::now()));

        Ok(Some(principal))
    }

    /// Drop the cached entry for a user so a local role change takes effect
    /// on their next request instead of after the TTL.
    pub fn invalidate(&self, user_id: Uuid) {
        self.cache
            .lock()
            .expect("principal cache poisoned")
            .remove(&user_id);
    }

    fn cached(&self, user_id: Uuid) -> Option<Principal> {
        let cache = self.cache.lock().expect("principal cache poisoned");
        cache
            .get(&user_id)
            .filter(|(_, inserted)| inserted.elapsed() < self.ttl)
            .map(|(principal, _)| principal.clone())
    }
}
