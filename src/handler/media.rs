use std::path::Path;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use tower_http::services::ServeDir;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    dtos::UploadResponse,
    error::{ErrorMessage, HttpError},
    middleware::login_required,
};

/// Sub-directory of `MEDIA_ROOT` holding post images
pub const POST_IMAGES_DIR: &str = "posts_images";

/// Router for `/media`: the upload endpoint plus the stored files themselves
pub fn media_handler(media_root: &str) -> Router<AppState> {
    Router::new()
        .route(
            "/upload/",
            post(upload_image).route_layer(middleware::from_fn(login_required)),
        )
        .fallback_service(ServeDir::new(media_root))
}

/// Store one image from the multipart field `image`
///
/// Returns the public path to put into a post's `image` field.
#[instrument(skip(app_state, multipart))]
pub async fn upload_image(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Multipart error: {}", e);
        HttpError::bad_request(e.to_string())
    })? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let extension = match image_extension(&content_type) {
            Some(extension) => extension,
            None => {
                tracing::error!(content_type = %content_type, "Rejected upload");
                return Err(HttpError::field_invalid(
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                ));
            }
        };

        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Multipart read error: {}", e);
            HttpError::bad_request(e.to_string())
        })?;
        if data.is_empty() {
            return Err(HttpError::field_invalid("image", "The submitted file is empty."));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let dir = Path::new(&app_state.env.media_root).join(POST_IMAGES_DIR);

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!("Media dir error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
        tokio::fs::write(dir.join(&file_name), &data)
            .await
            .map_err(|e| {
                tracing::error!("Media write error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?;

        let location = format!("/media/{}/{}", POST_IMAGES_DIR, file_name);
        tracing::info!(location = %location, size = data.len(), "Image stored");
        return Ok((StatusCode::CREATED, Json(UploadResponse { location })));
    }

    Err(HttpError::field_invalid("image", "No file was submitted."))
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}
