//! Minimal HTML shells for the browser-facing pages. Access control lives in
//! the route guard middleware, not here: by the time a handler runs the
//! request has already been classified and admitted.

use axum::response::Html;

pub async fn board_page() -> Html<&'static str> {
    Html(include_str!("../../static/board.html"))
}

pub async fn admin_page() -> Html<&'static str> {
    Html(include_str!("../../static/admin.html"))
}

pub async fn login_page() -> Html<&'static str> {
    Html(include_str!("../../static/login.html"))
}

pub async fn register_page() -> Html<&'static str> {
    Html(include_str!("../../static/register.html"))
}
