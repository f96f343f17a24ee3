use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        admin::admin_handler, auth::auth_handler, category::category_handler,
        media::media_handler, post::index, post::post_handler, users::users_handler,
    },
    middleware::auth,
};

pub const LOGIN_PATH: &str = "/auth/login/";

pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// Login page remembering where to come back to
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, next)
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .nest("/posts", post_handler())
        .nest("/category", category_handler())
        .nest("/profile", users_handler())
        .nest("/auth", auth_handler())
        .nest("/admin", admin_handler())
        .nest("/media", media_handler(&app_state.env.media_root))
        // identity is resolved once for every route, anonymous requests pass through
        .layer(middleware::from_fn_with_state(app_state.clone(), auth))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
