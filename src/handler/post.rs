use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Redirect};
use axum::routing::get;
use axum::{Extension, Router, middleware};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::access::{ensure_author, is_visible};
use crate::db::{CategoryExt, CommentExt, LocationExt, PostExt, PostFilter};
use crate::dtos::{
    DataResponse, InputPostDto, PageQuery, PostDetailDto, PostFormDto, PostsPaginationResponseDto,
};
use crate::error::{ErrorMessage, HttpError, db_error};
use crate::handler::{check_post_references, comment, form_body, paginate_posts};
use crate::middleware::{CurrentUser, Viewer, login_required};
use crate::models::Post;
use crate::routes::{post_detail_url, profile_url};

/// Router for `/posts`
///
/// Everything except the detail page needs a logged-in user; edit and delete
/// additionally pass the ownership gate inside the handler.
pub fn post_handler() -> Router<AppState> {
    Router::new()
        .route(
            "/create/",
            get(create_form)
                .post(create_post)
                .route_layer(middleware::from_fn(login_required)),
        )
        .route("/{post_id}/", get(get_post))
        .route(
            "/{post_id}/edit/",
            get(edit_form)
                .post(edit_post)
                .route_layer(middleware::from_fn(login_required)),
        )
        .route(
            "/{post_id}/delete/",
            get(delete_confirm)
                .post(delete_post)
                .route_layer(middleware::from_fn(login_required)),
        )
        .merge(comment::comment_handler())
}

/// Index: every post the viewer may see, newest first
#[instrument(skip(app_state, viewer))]
pub async fn index(
    Query(query): Query<PageQuery>,
    viewer: Viewer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let filter = PostFilter::visible(viewer.id(), Utc::now());
    let (posts, pagination) = paginate_posts(&app_state, &filter, query.requested()).await?;

    Ok(Json(PostsPaginationResponseDto {
        status: "success".to_string(),
        data: posts,
        pagination,
    }))
}

/// Post detail with its comments, oldest first
///
/// A post the viewer may not see is answered exactly like a missing one.
#[instrument(skip(app_state, viewer))]
pub async fn get_post(
    Path(post_id): Path<i64>,
    viewer: Viewer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let post = app_state
        .db_client
        .get_post_dto(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .filter(|post| is_visible(post, viewer.id(), Utc::now()))
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let comments = app_state
        .db_client
        .get_comments(post_id)
        .await
        .map_err(|e| db_error("getting comments", e))?;

    Ok(Json(DataResponse::success(PostDetailDto { post, comments })))
}

#[instrument(skip(app_state))]
pub async fn create_form(State(app_state): State<AppState>) -> Result<impl IntoResponse, HttpError> {
    let form = form_choices(&app_state, None).await?;
    Ok(Json(DataResponse::success(form)))
}

/// Create a post authored by the current user, then go to their profile
#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn create_post(
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<InputPostDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let body = form_body(body)?;
    body.validate().map_err(|e| {
        tracing::error!("Invalid post form: {}", e);
        HttpError::form_invalid(e)
    })?;
    check_post_references(&app_state, body.category_id, body.location_id).await?;

    let post = app_state
        .db_client
        .create_post(current.user.id, &body)
        .await
        .map_err(|e| db_error("creating post", e))?;

    tracing::info!(post_id = post.id, "Post created");
    Ok(Redirect::to(&profile_url(&current.user.username)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn edit_form(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let post = owned_post(&app_state, &current, post_id).await?;
    let form = form_choices(&app_state, Some(InputPostDto::from_post(&post))).await?;

    Ok(Json(DataResponse::success(form)))
}

#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn edit_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<InputPostDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    owned_post(&app_state, &current, post_id).await?;

    let body = form_body(body)?;
    body.validate().map_err(|e| {
        tracing::error!("Invalid post form: {}", e);
        HttpError::form_invalid(e)
    })?;
    check_post_references(&app_state, body.category_id, body.location_id).await?;

    app_state
        .db_client
        .edit_post(post_id, &body)
        .await
        .map_err(|e| db_error("editing post", e))?;

    tracing::info!(post_id, "Post edited");
    Ok(Redirect::to(&post_detail_url(post_id)))
}

/// Confirmation page data: the post about to be deleted
#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_confirm(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    owned_post(&app_state, &current, post_id).await?;

    let post = app_state
        .db_client
        .get_post_dto(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    Ok(Json(DataResponse::success(post)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    owned_post(&app_state, &current, post_id).await?;

    app_state
        .db_client
        .delete_post(post_id)
        .await
        .map_err(|e| db_error("deleting post", e))?;

    tracing::info!(post_id, "Post deleted");
    Ok(Redirect::to("/"))
}

/// 404 for a missing post, redirect to its page for anyone but the author
async fn owned_post(
    app_state: &AppState,
    current: &CurrentUser,
    post_id: i64,
) -> Result<Post, HttpError> {
    let post = app_state
        .db_client
        .get_post(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    ensure_author(&current.user, post.author_id, post_detail_url(post_id))?;
    Ok(post)
}

async fn form_choices(
    app_state: &AppState,
    initial: Option<InputPostDto>,
) -> Result<PostFormDto, HttpError> {
    let categories = app_state
        .db_client
        .get_categories()
        .await
        .map_err(|e| db_error("getting categories", e))?;
    let locations = app_state
        .db_client
        .get_locations()
        .await
        .map_err(|e| db_error("getting locations", e))?;

    Ok(PostFormDto {
        initial,
        categories,
        locations,
    })
}

#[cfg(test)]
mod tests {
    use crate::db::PostExt;
    use crate::test_utils::{TestApp, body_json, post_form};
    use axum::http::{StatusCode, header};
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn future_post_is_hidden_from_anonymous_but_not_from_author() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let mut form = post_form("Tomorrow");
        form.pub_date = Utc::now() + Duration::days(1);
        let post = app
            .state
            .db_client
            .create_post(author.id, &form)
            .await
            .unwrap();
        let uri = format!("/posts/{}/", post.id);

        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let index = body_json(app.get("/", None).await).await;
        assert_eq!(index["pagination"]["total"], 0);

        let response = app.get(&uri, Some(&author)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["post"]["title"], "Tomorrow");

        let index = body_json(app.get("/", Some(&author)).await).await;
        assert_eq!(index["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn unpublished_category_hides_post_except_on_authors_profile() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let hidden = app.category("hidden", false).await;
        let mut form = post_form("Inside");
        form.category_id = Some(hidden.id);
        app.state
            .db_client
            .create_post(author.id, &form)
            .await
            .unwrap();

        let index = body_json(app.get("/", None).await).await;
        assert_eq!(index["data"].as_array().unwrap().len(), 0);

        let profile = body_json(app.get("/profile/author/", None).await).await;
        assert_eq!(profile["data"].as_array().unwrap().len(), 0);

        let own = body_json(app.get("/profile/author/", Some(&author)).await).await;
        assert_eq!(own["data"][0]["title"], "Inside");
    }

    #[tokio::test]
    async fn non_author_edit_redirects_and_changes_nothing() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let intruder = app.user("intruder").await;
        let post = app
            .state
            .db_client
            .create_post(author.id, &post_form("Original"))
            .await
            .unwrap();
        let uri = format!("/posts/{}/edit/", post.id);

        let response = app
            .send(
                "POST",
                &uri,
                Some(&intruder),
                Some(json!({ "title": "Hijacked", "text": "x" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/posts/{}/", post.id)
        );

        let stored = app.state.db_client.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Original");

        let response = app.get(&uri, Some(&intruder)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn author_edits_and_deletes_own_post() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let post = app
            .state
            .db_client
            .create_post(author.id, &post_form("Draft"))
            .await
            .unwrap();

        let response = app
            .send(
                "POST",
                &format!("/posts/{}/edit/", post.id),
                Some(&author),
                Some(json!({ "title": "Final", "text": "done" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let stored = app.state.db_client.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Final");

        let response = app
            .send(
                "POST",
                &format!("/posts/{}/delete/", post.id),
                Some(&author),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert!(app.state.db_client.get_post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_requires_login_and_valid_form() {
        let app = TestApp::new().await;
        let author = app.user("author").await;

        let response = app.get("/posts/create/", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=/posts/create/"
        );

        let response = app
            .send(
                "POST",
                "/posts/create/",
                Some(&author),
                Some(json!({ "title": "", "text": "body" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["errors"]["title"].is_array());

        let response = app
            .send(
                "POST",
                "/posts/create/",
                Some(&author),
                Some(json!({ "title": "Hello", "text": "body", "category_id": 999 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(
                "POST",
                "/posts/create/",
                Some(&author),
                Some(json!({ "title": "Hello", "text": "body" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile/author/");

        let index = body_json(app.get("/", None).await).await;
        assert_eq!(index["data"][0]["title"], "Hello");
        assert_eq!(index["data"][0]["authorUsername"], "author");
    }

    #[tokio::test]
    async fn login_redirect_keeps_the_full_path() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let post = app
            .state
            .db_client
            .create_post(author.id, &post_form("p"))
            .await
            .unwrap();

        for uri in [
            format!("/posts/{}/edit/", post.id),
            format!("/posts/{}/delete/", post.id),
        ] {
            let response = app.get(&uri, None).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                response.headers()[header::LOCATION],
                format!("/auth/login/?next={uri}").as_str()
            );
        }
    }

    #[tokio::test]
    async fn gate_runs_before_the_body_is_read() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let intruder = app.user("intruder").await;
        let post = app
            .state
            .db_client
            .create_post(author.id, &post_form("Original"))
            .await
            .unwrap();
        let uri = format!("/posts/{}/edit/", post.id);

        let response = app
            .send("POST", &uri, Some(&intruder), Some(json!({ "title": "Hijacked" })))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/posts/{}/", post.id).as_str()
        );

        let response = app
            .send("POST", &uri, Some(&author), Some(json!({ "title": "Half" })))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert!(body["errors"]["__all__"].is_array());

        let stored = app.state.db_client.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Original");
    }

    #[tokio::test]
    async fn index_pages_clamp_to_range() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        for i in 0..12 {
            app.state
                .db_client
                .create_post(author.id, &post_form(&format!("post {i}")))
                .await
                .unwrap();
        }

        for (query, expected_page, expected_len) in [
            ("?page=0", 1, 10),
            ("?page=-3", 1, 10),
            ("?page=abc", 1, 10),
            ("?page=2", 2, 2),
            ("?page=99", 2, 2),
            ("?page=99999999999999999999", 2, 2),
            ("?page=-99999999999999999999", 1, 10),
        ] {
            let body = body_json(app.get(&format!("/{query}"), None).await).await;
            assert_eq!(body["pagination"]["page"], expected_page, "{query}");
            assert_eq!(body["pagination"]["totalPages"], 2);
            assert_eq!(body["data"].as_array().unwrap().len(), expected_len);
        }
    }

    #[tokio::test]
    async fn form_page_lists_choices() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        app.category("travel", true).await;

        let body = body_json(app.get("/posts/create/", Some(&author)).await).await;
        assert_eq!(body["data"]["categories"][0]["slug"], "travel");
        assert!(body["data"]["initial"].is_null());
    }
}
