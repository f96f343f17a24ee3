use crate::{
    AppState,
    db::UserExt,
    dtos::{
        FilterUserDto, LoginUserDto, PasswordChangeDto, RegisterUserDto, Response,
        UserLoginResponseDto, UserResponseDto,
    },
    error::{ErrorMessage, HttpError, db_error},
    middleware::{CurrentUser, login_required},
    utils::{
        password,
        token::{self, ACCESS_TOKEN_COOKIE},
    },
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::Cookie;
use tracing::instrument;
use validator::Validate;

/// Router for `/auth`
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/registration/", post(register))
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route(
            "/password_change/",
            post(change_password).route_layer(middleware::from_fn(login_required)),
        )
}

/// Register new user account
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::form_invalid(e)
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::field_invalid("password", e.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(
            &body.username,
            &body.first_name,
            &body.last_name,
            &body.email,
            &hash_password,
        )
        .await;

    match result {
        Ok(user) => {
            tracing::info!(username = %body.username, "Register Successful");
            Ok((
                StatusCode::CREATED,
                Json(UserResponseDto {
                    status: "success".to_string(),
                    data: FilterUserDto::filter_user(&user),
                }),
            ))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique_violation: {}", db_err);
            Err(HttpError::field_invalid(
                "username",
                ErrorMessage::UsernameExists.to_string(),
            ))
        }
        Err(e) => Err(db_error("saving user", e)),
    }
}

/// Log in with username or email
///
/// The token is returned in the body and set as an http-only cookie.
#[instrument(skip(app_state, body), fields(identifier = %body.identifier))]
pub async fn login(
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::form_invalid(e)
    })?;

    // usernames may contain '@' too, so they are tried before emails
    let mut user = app_state
        .db_client
        .get_user(None, Some(&body.identifier), None)
        .await
        .map_err(|e| db_error("getting user", e))?;

    if user.is_none() && body.identifier.contains('@') {
        user = app_state
            .db_client
            .get_user(None, None, Some(&body.identifier))
            .await
            .map_err(|e| db_error("getting user by email", e))?;
    }

    let user = user.ok_or_else(|| {
        tracing::error!("User not found");
        HttpError::bad_request(ErrorMessage::WrongCredentials.to_string())
    })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::error!("Password error: {}", e);
        HttpError::bad_request(ErrorMessage::WrongCredentials.to_string())
    })?;

    if !password_matched {
        tracing::error!("password mismatch");
        return Err(HttpError::bad_request(
            ErrorMessage::WrongCredentials.to_string(),
        ));
    }

    let access_token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let access_cookie = Cookie::build((ACCESS_TOKEN_COOKIE, access_token.clone()))
        .path("/")
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .http_only(true)
        .secure(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        access_cookie.to_string().parse::<HeaderValue>().map_err(|e| {
            tracing::error!("Cookie header error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?,
    );

    tracing::info!(username = %user.username, "Login Successful");
    Ok((
        headers,
        Json(UserLoginResponseDto {
            status: "success".to_string(),
            access_token,
            username: user.username,
        }),
    ))
}

/// Clear the access cookie
///
/// Tokens are stateless, so this only tells the browser to forget it.
#[instrument]
pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let access_cookie = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        access_cookie.to_string().parse::<HeaderValue>().map_err(|e| {
            tracing::error!("Cookie header error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?,
    );

    Ok((
        headers,
        Json(Response {
            status: "success",
            message: "Logged out".to_string(),
        }),
    ))
}

/// Change password after checking the old one
#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn change_password(
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<PasswordChangeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid password change input: {}", e);
        HttpError::form_invalid(e)
    })?;

    let password_matched =
        password::compare(&body.old_password, &current.user.password).map_err(|e| {
            tracing::error!("Password error: {}", e);
            HttpError::field_invalid("old_password", e.to_string())
        })?;

    if !password_matched {
        return Err(HttpError::field_invalid(
            "old_password",
            "Your old password was entered incorrectly.",
        ));
    }

    let hash_password = password::hash(&body.new_password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::field_invalid("new_password", e.to_string())
    })?;

    app_state
        .db_client
        .update_user_password(current.user.id, &hash_password)
        .await
        .map_err(|e| db_error("updating password", e))?;

    tracing::info!("Password changed");
    Ok(Json(Response {
        status: "success",
        message: "Password changed".to_string(),
    }))
}
