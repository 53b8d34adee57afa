use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{route_guard, AuthorizationGate, PrincipalResolver};
use crate::errors::AppError;
use crate::routes::{auth, comments, health, pages, roles, tasks, users};
use crate::session::SessionConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionConfig>,
    pub gate: AuthorizationGate,
}

impl AppState {
    pub fn new(pool: SqlitePool, sessions: SessionConfig) -> Self {
        let sessions = Arc::new(sessions);
        let resolver = PrincipalResolver::new(sessions.clone(), Arc::new(pool.clone()));
        let gate = AuthorizationGate::new(Arc::new(resolver));
        Self { pool, sessions, gate }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let sessions = SessionConfig::from_env()?;
    let state = AppState::new(pool, sessions);
    create_app_with_state(state)
}

pub fn create_app_with_state(state: AppState) -> Result<Router, AppError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/", post(tasks::create_task))
        .route("/:id", get(tasks::get_task))
        .route("/:id", put(tasks::update_task))
        .route("/:id", delete(tasks::delete_task))
        .route("/:id/comments", post(comments::create_comment));

    let comment_routes = Router::new()
        .route("/:id", put(comments::update_comment))
        .route("/:id", delete(comments::delete_comment));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id/role", put(users::update_user_role))
        .route("/:id", delete(users::delete_user));

    let role_routes = Router::new()
        .route("/", get(roles::list_roles))
        .route("/", post(roles::create_role))
        .route("/:id/permissions", get(roles::list_role_permissions))
        .route("/:id/permissions", post(roles::assign_permission))
        .route("/:id/permissions/:permission", delete(roles::revoke_permission));

    // Browser pages sit behind the route guard; API routes authorize inside
    // each handler so they can answer with JSON status codes instead of
    // redirects.
    let page_routes = Router::new()
        .route("/", get(pages::board_page))
        .route("/board", get(pages::board_page))
        .route("/admin", get(pages::admin_page))
        .route("/login", get(pages::login_page))
        .route("/register", get(pages::register_page))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/api/tasks", task_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/users", user_routes)
        .nest("/api/roles", role_routes)
        .route("/api/health", get(health::health))
        .merge(page_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
