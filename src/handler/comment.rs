use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    middleware,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    access::{ensure_author, is_visible},
    db::{CommentExt, PostExt},
    dtos::{DataResponse, InputCommentDto},
    error::{ErrorMessage, HttpError, db_error},
    handler::form_body,
    middleware::{CurrentUser, login_required},
    models::Comment,
    routes::post_detail_url,
};

/// Comment routes, merged under `/posts`
pub fn comment_handler() -> Router<AppState> {
    Router::new()
        .route(
            "/{post_id}/comment/",
            post(add_comment).route_layer(middleware::from_fn(login_required)),
        )
        .route(
            "/{post_id}/edit_comment/{comment_id}/",
            get(edit_comment_form)
                .post(edit_comment)
                .route_layer(middleware::from_fn(login_required)),
        )
        .route(
            "/{post_id}/delete_comment/{comment_id}/",
            get(delete_comment_confirm)
                .post(delete_comment)
                .route_layer(middleware::from_fn(login_required)),
        )
}

/// Comment on a post the current user can see
#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn add_comment(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<InputCommentDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .get_post_dto(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .filter(|post| is_visible(post, Some(current.user.id), Utc::now()))
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let body = form_body(body)?;
    body.validate().map_err(|e| {
        tracing::error!("Invalid comment form: {}", e);
        HttpError::form_invalid(e)
    })?;

    let comment = app_state
        .db_client
        .create_comment(current.user.id, post_id, &body.text)
        .await
        .map_err(|e| db_error("creating comment", e))?;

    tracing::info!(comment_id = comment.id, post_id, "Comment added");
    Ok(Redirect::to(&post_detail_url(post_id)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn edit_comment_form(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = owned_comment(&app_state, &current, post_id, comment_id).await?;
    Ok(Json(DataResponse::success(comment)))
}

#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn edit_comment(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<InputCommentDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    owned_comment(&app_state, &current, post_id, comment_id).await?;

    let body = form_body(body)?;
    body.validate().map_err(|e| {
        tracing::error!("Invalid comment form: {}", e);
        HttpError::form_invalid(e)
    })?;

    app_state
        .db_client
        .edit_comment(comment_id, &body.text)
        .await
        .map_err(|e| db_error("editing comment", e))?;

    tracing::info!(comment_id, "Comment edited");
    Ok(Redirect::to(&post_detail_url(post_id)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_comment_confirm(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = owned_comment(&app_state, &current, post_id, comment_id).await?;
    Ok(Json(DataResponse::success(comment)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_comment(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    owned_comment(&app_state, &current, post_id, comment_id).await?;

    app_state
        .db_client
        .delete_comment(comment_id)
        .await
        .map_err(|e| db_error("deleting comment", e))?;

    tracing::info!(comment_id, "Comment deleted");
    Ok(Redirect::to(&post_detail_url(post_id)))
}

async fn owned_comment(
    app_state: &AppState,
    current: &CurrentUser,
    post_id: i64,
    comment_id: i64,
) -> Result<Comment, HttpError> {
    let comment = app_state
        .db_client
        .get_comment(post_id, comment_id)
        .await
        .map_err(|e| db_error("getting comment", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    ensure_author(&current.user, comment.author_id, post_detail_url(post_id))?;
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use crate::db::{CommentExt, PostExt};
    use crate::test_utils::{TestApp, body_json, post_form};
    use axum::http::{StatusCode, header};
    use serde_json::json;

    #[tokio::test]
    async fn non_author_cannot_delete_comment() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let intruder = app.user("intruder").await;
        let db = &app.state.db_client;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();
        let comment = db.create_comment(author.id, post.id, "mine").await.unwrap();
        let uri = format!("/posts/{}/delete_comment/{}/", post.id, comment.id);

        let response = app.send("POST", &uri, Some(&intruder), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/posts/{}/", post.id)
        );
        assert!(db.get_comment(post.id, comment.id).await.unwrap().is_some());

        let response = app.send("POST", &uri, Some(&author), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(db.get_comment(post.id, comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn comments_show_up_on_detail_with_count() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let reader = app.user("reader").await;
        let post = app
            .state
            .db_client
            .create_post(author.id, &post_form("p"))
            .await
            .unwrap();
        let uri = format!("/posts/{}/comment/", post.id);

        for text in ["first", "second"] {
            let response = app
                .send("POST", &uri, Some(&reader), Some(json!({ "text": text })))
                .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
        }

        let response = app
            .send("POST", &uri, Some(&reader), Some(json!({ "text": "" })))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(app.get(&format!("/posts/{}/", post.id), None).await).await;
        assert_eq!(body["data"]["post"]["commentCount"], 2);
        assert_eq!(body["data"]["comments"][0]["text"], "first");
        assert_eq!(body["data"]["comments"][1]["authorUsername"], "reader");
    }

    #[tokio::test]
    async fn cannot_comment_on_hidden_post() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let reader = app.user("reader").await;
        let db = &app.state.db_client;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();
        db.set_post_published(post.id, false).await.unwrap();
        let uri = format!("/posts/{}/comment/", post.id);

        let response = app
            .send("POST", &uri, Some(&reader), Some(json!({ "text": "hi" })))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.send("POST", &uri, None, Some(json!({ "text": "hi" }))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(db.get_comments(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_author_with_empty_body_is_redirected() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let intruder = app.user("intruder").await;
        let db = &app.state.db_client;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();
        let comment = db.create_comment(author.id, post.id, "mine").await.unwrap();
        let uri = format!("/posts/{}/edit_comment/{}/", post.id, comment.id);

        let response = app.send("POST", &uri, Some(&intruder), Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/posts/{}/", post.id).as_str()
        );

        let response = app.send("POST", &uri, Some(&author), Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["errors"]["__all__"].is_array());

        let stored = db.get_comment(post.id, comment.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "mine");
    }

    #[tokio::test]
    async fn author_edits_comment() {
        let app = TestApp::new().await;
        let author = app.user("author").await;
        let db = &app.state.db_client;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();
        let comment = db.create_comment(author.id, post.id, "typo").await.unwrap();
        let uri = format!("/posts/{}/edit_comment/{}/", post.id, comment.id);

        let form = body_json(app.get(&uri, Some(&author)).await).await;
        assert_eq!(form["data"]["text"], "typo");

        let response = app
            .send("POST", &uri, Some(&author), Some(json!({ "text": "fixed" })))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let stored = db.get_comment(post.id, comment.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "fixed");

        let wrong_post = format!("/posts/{}/edit_comment/{}/", post.id + 1, comment.id);
        let response = app.get(&wrong_post, Some(&author)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
