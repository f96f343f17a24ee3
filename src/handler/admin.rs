use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, put},
};
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{CategoryExt, CommentExt, LocationExt, PostExt, PostFilter},
    dtos::{
        AdminPostsQuery, CategoryInputDto, DataResponse, LocationInputDto,
        PostsPaginationResponseDto, PublishUpdateDto,
    },
    error::{ErrorMessage, HttpError, db_error},
    handler::paginate_posts,
    middleware::role_check,
    models::UserRole,
    utils::pagination::parse_page,
};

/// Router for `/admin`, admins only
pub fn admin_handler() -> Router<AppState> {
    Router::new()
        .route("/categories/", get(get_categories).post(create_category))
        .route(
            "/categories/{category_id}/",
            put(edit_category).delete(delete_category),
        )
        .route("/locations/", get(get_locations).post(create_location))
        .route(
            "/locations/{location_id}/",
            put(edit_location).delete(delete_location),
        )
        .route("/posts/", get(get_posts))
        .route("/posts/{post_id}/", patch(set_post_published))
        .route("/comments/{comment_id}/", delete(delete_comment))
        .route_layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![UserRole::Admin])
        }))
}

/// Maps a failed update/delete of a single row, where `RowNotFound` means a bad id
fn row_error(context: &str, not_found: ErrorMessage, e: sqlx::Error) -> HttpError {
    match e {
        sqlx::Error::RowNotFound => HttpError::not_found(not_found.to_string()),
        e => db_error(context, e),
    }
}

#[instrument(skip(app_state))]
pub async fn get_categories(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = app_state
        .db_client
        .get_categories()
        .await
        .map_err(|e| db_error("getting categories", e))?;

    Ok(Json(DataResponse::success(categories)))
}

#[instrument(skip(app_state))]
pub async fn create_category(
    State(app_state): State<AppState>,
    Json(body): Json<CategoryInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid category form: {}", e);
        HttpError::form_invalid(e)
    })?;

    match app_state.db_client.create_category(&body).await {
        Ok(category) => {
            tracing::info!(slug = %category.slug, "Category created");
            Ok((StatusCode::CREATED, Json(DataResponse::success(category))))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving category, unique_violation: {}", db_err);
            Err(HttpError::field_invalid(
                "slug",
                ErrorMessage::SlugExists.to_string(),
            ))
        }
        Err(e) => Err(db_error("creating category", e)),
    }
}

#[instrument(skip(app_state))]
pub async fn edit_category(
    Path(category_id): Path<i64>,
    State(app_state): State<AppState>,
    Json(body): Json<CategoryInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid category form: {}", e);
        HttpError::form_invalid(e)
    })?;

    match app_state.db_client.edit_category(category_id, &body).await {
        Ok(category) => Ok(Json(DataResponse::success(category))),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, editing category, unique_violation: {}", db_err);
            Err(HttpError::field_invalid(
                "slug",
                ErrorMessage::SlugExists.to_string(),
            ))
        }
        Err(e) => Err(row_error("editing category", ErrorMessage::CategoryNotFound, e)),
    }
}

/// Posts of a deleted category stay, with no category
#[instrument(skip(app_state))]
pub async fn delete_category(
    Path(category_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_category(category_id)
        .await
        .map_err(|e| row_error("deleting category", ErrorMessage::CategoryNotFound, e))?;

    tracing::info!(category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(app_state))]
pub async fn get_locations(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let locations = app_state
        .db_client
        .get_locations()
        .await
        .map_err(|e| db_error("getting locations", e))?;

    Ok(Json(DataResponse::success(locations)))
}

#[instrument(skip(app_state))]
pub async fn create_location(
    State(app_state): State<AppState>,
    Json(body): Json<LocationInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid location form: {}", e);
        HttpError::form_invalid(e)
    })?;

    let location = app_state
        .db_client
        .create_location(&body)
        .await
        .map_err(|e| db_error("creating location", e))?;

    Ok((StatusCode::CREATED, Json(DataResponse::success(location))))
}

#[instrument(skip(app_state))]
pub async fn edit_location(
    Path(location_id): Path<i64>,
    State(app_state): State<AppState>,
    Json(body): Json<LocationInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid location form: {}", e);
        HttpError::form_invalid(e)
    })?;

    let location = app_state
        .db_client
        .edit_location(location_id, &body)
        .await
        .map_err(|e| row_error("editing location", ErrorMessage::LocationNotFound, e))?;

    Ok(Json(DataResponse::success(location)))
}

#[instrument(skip(app_state))]
pub async fn delete_location(
    Path(location_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_location(location_id)
        .await
        .map_err(|e| row_error("deleting location", ErrorMessage::LocationNotFound, e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Every post regardless of visibility, filterable and searchable
///
/// Query params: ?page=2&category=3&is_published=false&q=word
#[instrument(skip(app_state))]
pub async fn get_posts(
    Query(query): Query<AdminPostsQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid admin posts query: {}", e);
        HttpError::form_invalid(e)
    })?;

    let filter = PostFilter {
        visible_to: None,
        category_id: query.category,
        author_id: None,
        is_published: query.is_published,
        search: query.q.clone(),
    };
    let (posts, pagination) =
        paginate_posts(&app_state, &filter, parse_page(query.page.as_deref())).await?;

    Ok(Json(PostsPaginationResponseDto {
        status: "success".to_string(),
        data: posts,
        pagination,
    }))
}

#[instrument(skip(app_state))]
pub async fn set_post_published(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Json(body): Json<PublishUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let post = app_state
        .db_client
        .set_post_published(post_id, body.is_published)
        .await
        .map_err(|e| row_error("publishing post", ErrorMessage::PostNotFound, e))?;

    tracing::info!(post_id, is_published = post.is_published, "Post publication changed");
    Ok(Json(DataResponse::success(post)))
}

#[instrument(skip(app_state))]
pub async fn delete_comment(
    Path(comment_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_comment(comment_id)
        .await
        .map_err(|e| row_error("deleting comment", ErrorMessage::CommentNotFound, e))?;

    Ok(StatusCode::NO_CONTENT)
}
