pub mod admin;
pub mod auth;
pub mod category;
pub mod comment;
pub mod media;
pub mod post;
pub mod users;

use axum::{Json, extract::rejection::JsonRejection};

use crate::{
    AppState,
    db::{CategoryExt, LocationExt, PostExt, PostFilter},
    dtos::{PaginationDto, PostDto},
    error::{HttpError, db_error},
    utils::pagination::Page,
};

/// Count, clamp the requested page, then fetch it
pub(crate) async fn paginate_posts(
    app_state: &AppState,
    filter: &PostFilter,
    requested: i64,
) -> Result<(Vec<PostDto>, PaginationDto), HttpError> {
    let total = app_state
        .db_client
        .count_posts(filter)
        .await
        .map_err(|e| db_error("counting posts", e))?;

    let page = Page::new(requested, app_state.env.posts_per_page, total);

    let posts = app_state
        .db_client
        .get_posts(filter, page.limit, page.offset())
        .await
        .map_err(|e| db_error("getting posts", e))?;

    Ok((posts, page.into()))
}

/// Unwrap a JSON form body taken as `Result`
///
/// Handlers behind the ownership gate read the body only after the gate, so a
/// refused request is redirected whatever it carries. An unreadable body is a
/// form error like any other.
pub(crate) fn form_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, HttpError> {
    body.map(|Json(form)| form).map_err(|rejection| {
        tracing::error!("Unreadable form body: {}", rejection.body_text());
        HttpError::field_invalid("__all__", rejection.body_text())
    })
}

/// Unknown category or location ids are rejected like any other bad field
pub(crate) async fn check_post_references(
    app_state: &AppState,
    category_id: Option<i64>,
    location_id: Option<i64>,
) -> Result<(), HttpError> {
    if let Some(category_id) = category_id {
        let category = app_state
            .db_client
            .get_category(category_id)
            .await
            .map_err(|e| db_error("getting category", e))?;
        if category.is_none() {
            return Err(HttpError::field_invalid(
                "category_id",
                "Select a valid choice. That choice is not one of the available choices.",
            ));
        }
    }

    if let Some(location_id) = location_id {
        let location = app_state
            .db_client
            .get_location(location_id)
            .await
            .map_err(|e| db_error("getting location", e))?;
        if location.is_none() {
            return Err(HttpError::field_invalid(
                "location_id",
                "Select a valid choice. That choice is not one of the available choices.",
            ));
        }
    }

    Ok(())
}
