use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError, db_error},
    models::{User, UserRole},
    routes::login_url,
    utils::token::{self, ACCESS_TOKEN_COOKIE},
};

/// The logged-in user, inserted into the request extensions by [`auth`]
///
/// Routes behind [`login_required`] can rely on it:
/// ```ignore
/// async fn my_handler(Extension(current): Extension<CurrentUser>) {
///     // current.user
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Resolve the requester's identity, if any
///
/// The token is read from the `access_token` cookie first, then from an
/// `Authorization: Bearer <token>` header. A missing, invalid or expired
/// token, or one whose user is gone, leaves the request anonymous; public
/// pages stay reachable either way.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.to_owned())
        })
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        return Ok(next.run(req).await);
    };

    let user_id = match token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .ok()
        .and_then(|sub| Uuid::parse_str(&sub).ok())
    {
        Some(user_id) => user_id,
        None => {
            tracing::debug!("Ignoring invalid access token");
            return Ok(next.run(req).await);
        }
    };

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| db_error("getting token user", e))?;

    match user {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser { user });
        }
        None => tracing::debug!(%user_id, "{}", ErrorMessage::UserNoLongerExist),
    }

    Ok(next.run(req).await)
}

/// Send anonymous requests to the login page
///
/// The full request path travels along as `?next=` so the client can come
/// back after logging in. Inside nested routers `req.uri()` has lost its mount
/// prefix, so the path is taken from [`OriginalUri`].
pub async fn login_required(req: Request, next: Next) -> Result<impl IntoResponse, HttpError> {
    if req.extensions().get::<CurrentUser>().is_none() {
        let path = req
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.path().to_owned())
            .unwrap_or_else(|| req.uri().path().to_owned());
        tracing::debug!(path = %path, "Anonymous request to a login-only page");
        return Err(HttpError::redirect(login_url(&path)));
    }

    Ok(next.run(req).await)
}

/// Role-based access control for the JSON admin surface
///
/// Unlike [`login_required`] this answers 401 when nobody is logged in and 403
/// when the role does not match.
pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&current.user.role) {
        tracing::warn!(username = %current.user.username, "Admin page refused");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Optional identity for pages that anyone may open
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts
                .extensions
                .get::<CurrentUser>()
                .map(|current| current.user.clone()),
        ))
    }
}
