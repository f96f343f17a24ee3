use crate::models::{Category, Location, Post, User};
use crate::utils::pagination::{Page, parse_page};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients.
// Input DTOs double as the forms of the blog: `validate()` is the form check,
// and a failed check is answered with the field errors and nothing saved.

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Registration form
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1-150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(length(min = 1, max = 30, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 30, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "passwords do not match"))]
    #[serde(rename = "confirmPassword")]
    pub password_confirm: String,
}

/// Login request - accepts email or username
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Password change request (requires old password verification)
#[derive(Debug, Validate, Default, Clone, Serialize, Deserialize)]
pub struct PasswordChangeDto {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(min = 8, message = "new password must be at least 8 characters"))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "new passwords do not match"))]
    pub new_password_confirm: String,
}

/// Profile edit form (username, names, email)
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileEditDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1-150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(length(max = 30))]
    #[serde(default)]
    pub first_name: String,

    #[validate(length(max = 30))]
    #[serde(default)]
    pub last_name: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,
}

impl ProfileEditDto {
    pub fn from_user(user: &User) -> Self {
        ProfileEditDto {
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            email: user.email.to_owned(),
        }
    }
}

/// Letters, digits and `@ . + - _`
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username")
            .with_message("Username may contain only letters, digits and @/./+/-/_".into()))
    }
}

// ============================================================================
// User Response DTOs (filtered data for client)
// ============================================================================

/// Public user data (no password hash, no email)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: String,
    pub date_joined: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            full_name: user.full_name(),
            role: user.role.to_str().to_string(),
            date_joined: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: FilterUserDto,
}

/// Login success response with JWT token
#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub access_token: String,
    pub username: String,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

/// Generic `{status, data}` envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        DataResponse {
            status: "success".to_string(),
            data,
        }
    }
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

/// `?page=` as typed by the user; see [`parse_page`]
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn requested(&self) -> i64 {
        parse_page(self.page.as_deref())
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl From<Page> for PaginationDto {
    fn from(page: Page) -> Self {
        PaginationDto {
            page: page.number,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages,
            has_next: page.has_next(),
            has_previous: page.has_previous(),
        }
    }
}

// ============================================================================
// Post DTOs
// ============================================================================

/// Post form, used for both create and edit
///
/// Author and publication flag are not part of the form: the author is the
/// logged-in user and only admins toggle `is_published`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InputPostDto {
    #[validate(length(min = 1, max = 256, message = "Title is required."))]
    pub title: String,

    #[validate(length(min = 1, message = "Text is required."))]
    pub text: String,

    #[serde(default = "Utc::now")]
    pub pub_date: DateTime<Utc>,

    pub category_id: Option<i64>,

    pub location_id: Option<i64>,

    #[validate(length(max = 255))]
    pub image: Option<String>,
}

impl InputPostDto {
    pub fn from_post(post: &Post) -> Self {
        InputPostDto {
            title: post.title.to_owned(),
            text: post.text.to_owned(),
            pub_date: post.pub_date,
            category_id: post.category_id,
            location_id: post.location_id,
            image: post.image.to_owned(),
        }
    }
}

/// Post as shown on the pages, with author, category, location and the
/// number of comments
///
/// `location_name` is only filled for published locations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    pub author_id: Uuid,
    pub author_username: String,
    pub category_id: Option<i64>,
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Paginated posts response
#[derive(Debug, Serialize, Deserialize)]
pub struct PostsPaginationResponseDto {
    pub status: String,
    pub data: Vec<PostDto>,
    pub pagination: PaginationDto,
}

/// Post detail page: the post and its comments, oldest first
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailDto {
    pub post: PostDto,
    pub comments: Vec<CommentDto>,
}

/// What the create/edit page needs to draw the form
#[derive(Debug, Serialize, Deserialize)]
pub struct PostFormDto {
    pub initial: Option<InputPostDto>,
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPostsResponseDto {
    pub status: String,
    pub category: Category,
    pub data: Vec<PostDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponseDto {
    pub status: String,
    pub profile: FilterUserDto,
    pub data: Vec<PostDto>,
    pub pagination: PaginationDto,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InputCommentDto {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Text must be between 1 and 1000 characters"
    ))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Admin DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryInputDto {
    #[validate(length(min = 1, max = 256, message = "Title is required."))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(
        length(min = 1, max = 64, message = "Slug is required."),
        custom(function = "validate_slug")
    )]
    pub slug: String,

    #[serde(default = "published_by_default")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationInputDto {
    #[validate(length(min = 1, max = 256, message = "Name is required."))]
    pub name: String,

    #[serde(default = "published_by_default")]
    pub is_published: bool,
}

fn published_by_default() -> bool {
    true
}

/// Latin letters, digits, hyphen and underscore
fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug")
            .with_message("Slug may contain only latin letters, digits, '-' and '_'".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishUpdateDto {
    pub is_published: bool,
}

/// Admin post list filters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminPostsQuery {
    pub page: Option<String>,
    pub category: Option<i64>,
    pub is_published: Option<bool>,
    #[validate(length(min = 1, max = 100))]
    pub q: Option<String>,
}

// ============================================================================
// Media DTOs
// ============================================================================

/// Image upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterUserDto {
        RegisterUserDto {
            username: "leo.tolstoy".to_string(),
            first_name: "Leo".to_string(),
            last_name: "Tolstoy".to_string(),
            email: "leo@example.com".to_string(),
            password: "war-and-peace".to_string(),
            password_confirm: "war-and-peace".to_string(),
        }
    }

    #[test]
    fn registration_form_checks_fields() {
        assert!(registration().validate().is_ok());

        let mismatch = RegisterUserDto {
            password_confirm: "anna-karenina".to_string(),
            ..registration()
        };
        assert!(
            mismatch
                .validate()
                .unwrap_err()
                .field_errors()
                .contains_key("password_confirm")
        );

        let bad_username = RegisterUserDto {
            username: "leo tolstoy!".to_string(),
            ..registration()
        };
        assert!(
            bad_username
                .validate()
                .unwrap_err()
                .field_errors()
                .contains_key("username")
        );
    }

    #[test]
    fn post_form_requires_title_and_text() {
        let form: InputPostDto =
            serde_json::from_value(serde_json::json!({ "title": "", "text": "" })).unwrap();
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("text"));
    }

    #[test]
    fn post_form_defaults_pub_date_to_now() {
        let before = Utc::now();
        let form: InputPostDto =
            serde_json::from_value(serde_json::json!({ "title": "t", "text": "x" })).unwrap();
        assert!(form.pub_date >= before);
        assert!(form.category_id.is_none());
    }

    #[test]
    fn slug_rejects_spaces() {
        let form = CategoryInputDto {
            title: "Travel".to_string(),
            description: String::new(),
            slug: "far away".to_string(),
            is_published: true,
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn page_query_falls_back_to_first_page() {
        assert_eq!(PageQuery { page: None }.requested(), 1);
        assert_eq!(
            PageQuery {
                page: Some("two".to_string())
            }
            .requested(),
            1
        );
        assert_eq!(
            PaginationDto::from(Page::new(2, 10, 15)),
            PaginationDto {
                page: 2,
                limit: 10,
                total: 15,
                total_pages: 2,
                has_next: false,
                has_previous: true,
            }
        );
    }
}
