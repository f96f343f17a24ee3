use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState,
    db::{CategoryExt, PostFilter},
    dtos::{CategoryPostsResponseDto, PageQuery},
    error::{ErrorMessage, HttpError, db_error},
    handler::paginate_posts,
    middleware::Viewer,
};

pub fn category_handler() -> Router<AppState> {
    Router::new().route("/{category_slug}/", get(category_posts))
}

/// Visible posts of a published category
///
/// Missing and unpublished categories both answer 404, whoever asks.
#[instrument(skip(app_state, viewer))]
pub async fn category_posts(
    Path(category_slug): Path<String>,
    Query(query): Query<PageQuery>,
    viewer: Viewer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let category = app_state
        .db_client
        .get_category_by_slug(&category_slug)
        .await
        .map_err(|e| db_error("getting category", e))?
        .filter(|category| category.is_published)
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CategoryNotFound.to_string()))?;

    let filter = PostFilter::visible(viewer.id(), Utc::now()).in_category(category.id);
    let (posts, pagination) = paginate_posts(&app_state, &filter, query.requested()).await?;

    Ok(Json(CategoryPostsResponseDto {
        status: "success".to_string(),
        category,
        data: posts,
        pagination,
    }))
}
