use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::AppState;
use crate::session::SessionCredentials;

use super::catalog::Permission;

/// Page-level access class. Classification is a pure function of the path;
/// the transition is one-shot per request and nothing is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    RequiresAuthentication,
    RequiresPermission(Permission),
}

impl RouteClass {
    pub fn classify(path: &str) -> RouteClass {
        if path == "/login"
            || path == "/register"
            || path == "/favicon.ico"
            || path.starts_with("/assets/")
            || path.starts_with("/docs")
            || path.starts_with("/api-docs")
        {
            return RouteClass::Public;
        }

        if path == "/admin" || path.starts_with("/admin/") {
            return RouteClass::RequiresPermission(Permission::UsersManage);
        }

        RouteClass::RequiresAuthentication
    }
}

/// Navigation guard applied to the page router only; API routes answer with
/// JSON statuses through the gate instead.
///
/// Policy (uniform): unauthenticated visitors are redirected to the login
/// page; authenticated but under-privileged visitors are redirected to the
/// board rather than shown a 403, so restricted areas are not revealed.
pub async fn route_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let class = RouteClass::classify(req.uri().path());
    if class == RouteClass::Public {
        return next.run(req).await;
    }

    let credentials = SessionCredentials::from_headers(req.headers());
    let principal = match state.gate.resolver().resolve(&credentials).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let Some(principal) = principal else {
        return Redirect::to("/login").into_response();
    };

    if let RouteClass::RequiresPermission(permission) = class {
        if !principal.can(permission) {
            tracing::debug!(
                user_id = %principal.id,
                path = req.uri().path(),
                permission = %permission,
                "navigation denied, redirecting home"
            );
            return Redirect::to("/").into_response();
        }
    }

    next.run(req).await
}
