use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use taskdeck::{app, db, models, routes};

#[derive(OpenApi)]
#[openapi(
    // Paths are registered through the per-handler `#[utoipa::path]`
    // annotations; listing them here again would duplicate registrations.
    components(
        schemas(
            models::user::User,
            models::user::UserSummary,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::UserRoleUpdateRequest,
            models::task::Task,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            models::comment::Comment,
            models::comment::CommentCreateRequest,
            models::comment::CommentUpdateRequest,
            models::rbac::RoleEntity,
            models::rbac::PermissionEntity,
            models::rbac::RoleCreateRequest,
            models::rbac::AssignPermissionRequest,
            routes::auth::MeResponse,
            routes::auth::MessageResponse,
            routes::health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Authentication and session endpoints"),
        (name = "Tasks", description = "Task board management"),
        (name = "Comments", description = "Task comments"),
        (name = "Users", description = "User administration"),
        (name = "Roles", description = "Role and permission administration"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    let app = app::create_app(pool).await?;

    let app = app.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // When running in Docker the binary CWD may differ, fall back to the
    // crate-local `.env`.
    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
