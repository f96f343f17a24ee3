use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role enumeration for role-based access control (RBAC)
///
/// Stored as lowercase TEXT in the `users.role` column (`admin` / `user`).
/// Only admins reach the `/admin` surface; on the public blog pages an
/// admin is treated like any other viewer.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin, // Manages categories, locations and publication flags
    User,  // Writes posts and comments
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

/// User model representing the users table
///
/// `password` holds the argon2 PHC string, never the plain text.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Thematic grouping of posts
///
/// A category carries its own publication flag: unpublishing it hides every
/// post inside it from the public pages, and its page answers 404.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Post model representing the posts table
///
/// Publication is controlled by three fields together:
/// - `is_published`: author/admin switch
/// - `pub_date`: posts dated in the future stay hidden until that moment
/// - the category's own `is_published` flag (when a category is set)
///
/// `category_id` and `location_id` become NULL when the referenced row is
/// deleted; the post itself survives.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    pub author_id: Uuid,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Comment model representing user comments on blog posts
///
/// - `author_id`: References users.id
/// - `post_id`: References posts.id (comments go away with their post)
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}
