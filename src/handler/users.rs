use crate::{
    AppState,
    access::ensure_author,
    db::{PostFilter, UserExt},
    dtos::{DataResponse, FilterUserDto, PageQuery, ProfileEditDto, ProfileResponseDto},
    error::{ErrorMessage, HttpError, db_error},
    handler::{form_body, paginate_posts},
    middleware::{CurrentUser, Viewer, login_required},
    models::User,
    routes::profile_url,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    middleware,
    response::{IntoResponse, Redirect},
    routing::get,
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

/// Router for `/profile`
pub fn users_handler() -> Router<AppState> {
    Router::new()
        .route("/{username}/", get(get_profile))
        .route(
            "/{username}/edit/",
            get(edit_profile_form)
                .post(edit_profile)
                .route_layer(middleware::from_fn(login_required)),
        )
}

/// Public profile and the user's posts
///
/// The owner also sees their own drafts, scheduled posts and posts in hidden
/// categories; everyone else gets the usual visibility filter.
#[instrument(skip(app_state, viewer))]
pub async fn get_profile(
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    viewer: Viewer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = find_user(&app_state, &username).await?;

    let filter = PostFilter::visible(viewer.id(), Utc::now()).by_author(profile.id);
    let (posts, pagination) = paginate_posts(&app_state, &filter, query.requested()).await?;

    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        profile: FilterUserDto::filter_user(&profile),
        data: posts,
        pagination,
    }))
}

#[instrument(skip(app_state, current), fields(current = %current.user.username))]
pub async fn edit_profile_form(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = find_user(&app_state, &username).await?;
    ensure_author(&current.user, profile.id, profile_url(&profile.username))?;

    Ok(Json(DataResponse::success(ProfileEditDto::from_user(
        &profile,
    ))))
}

/// Update username, names and email of the current user's own profile
#[instrument(skip(app_state, current, body), fields(current = %current.user.username))]
pub async fn edit_profile(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<ProfileEditDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = find_user(&app_state, &username).await?;
    ensure_author(&current.user, profile.id, profile_url(&profile.username))?;

    let body = form_body(body)?;
    body.validate().map_err(|e| {
        tracing::error!("Invalid profile form: {}", e);
        HttpError::form_invalid(e)
    })?;

    let result = app_state
        .db_client
        .update_user_profile(profile.id, &body)
        .await;

    match result {
        Ok(user) => {
            tracing::info!(username = %user.username, "Profile updated");
            Ok(Redirect::to(&profile_url(&user.username)))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, updating profile, unique_violation: {}", db_err);
            Err(HttpError::field_invalid(
                "username",
                ErrorMessage::UsernameExists.to_string(),
            ))
        }
        Err(e) => Err(db_error("updating profile", e)),
    }
}

async fn find_user(app_state: &AppState, username: &str) -> Result<User, HttpError> {
    app_state
        .db_client
        .get_user(None, Some(username), None)
        .await
        .map_err(|e| db_error("getting user", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::db::{PostExt, UserExt};
    use crate::test_utils::{TestApp, body_json, post_form};
    use axum::http::{StatusCode, header};
    use serde_json::json;

    #[tokio::test]
    async fn profile_shows_user_and_paginated_posts() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        app.state
            .db_client
            .create_post(author.id, &post_form("mine"))
            .await
            .unwrap();

        let response = app.get("/profile/author/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["profile"]["username"], "author");
        assert!(body["profile"].get("password").is_none());
        assert_eq!(body["pagination"]["total"], 1);

        let response = app.get("/profile/nobody/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_owner_edits_profile() {
        let app = TestApp::new().await;
        let owner = app.user("owner").await;
        let other = app.user("other").await;
        let edit = json!({
            "username": "renamed",
            "first_name": "New",
            "last_name": "Name",
            "email": "renamed@example.com",
        });

        let response = app
            .send("POST", "/profile/owner/edit/", Some(&other), Some(edit.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile/owner/");
        let unchanged = app
            .state
            .db_client
            .get_user(Some(owner.id), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.username, "owner");

        let response = app
            .send("POST", "/profile/owner/edit/", Some(&other), Some(json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile/owner/");

        let response = app
            .send("POST", "/profile/owner/edit/", Some(&owner), Some(edit))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile/renamed/");

        let body = body_json(app.get("/profile/renamed/", None).await).await;
        assert_eq!(body["profile"]["fullName"], "New Name");
    }

    #[tokio::test]
    async fn taken_username_is_a_form_error() {
        let app = TestApp::new().await;
        let owner = app.user("owner").await;
        app.user("taken").await;

        let response = app
            .send(
                "POST",
                "/profile/owner/edit/",
                Some(&owner),
                Some(json!({ "username": "taken", "email": "owner@example.com" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["errors"]["username"].is_array());
    }
}
