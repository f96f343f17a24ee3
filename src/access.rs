//! Who may see a post, and who may change it.
//!
//! The same visibility rule also exists as a SQL predicate
//! (`db::post::push_visibility`) for list queries; both must stay in step.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{dtos::PostDto, error::HttpError, models::User};

/// Publication fields of a post together with its category's flag
pub trait Publication {
    fn is_published(&self) -> bool;
    fn pub_date(&self) -> DateTime<Utc>;
    /// `None` when the post has no category (never set, or category deleted)
    fn category_published(&self) -> Option<bool>;
    fn author_id(&self) -> Uuid;
}

impl Publication for PostDto {
    fn is_published(&self) -> bool {
        self.is_published
    }

    fn pub_date(&self) -> DateTime<Utc> {
        self.pub_date
    }

    fn category_published(&self) -> Option<bool> {
        self.category_id.map(|_| self.category_is_published.unwrap_or(false))
    }

    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// A post is public when it is published, its date has come and its category
/// (if any) is published. Its author always sees it.
pub fn is_public(post: &impl Publication, now: DateTime<Utc>) -> bool {
    post.is_published() && post.pub_date() <= now && post.category_published().unwrap_or(true)
}

pub fn is_visible(post: &impl Publication, viewer: Option<Uuid>, now: DateTime<Utc>) -> bool {
    is_public(post, now) || viewer == Some(post.author_id())
}

/// Ownership gate for mutation routes
///
/// A non-owner is sent back to `fallback` (the entity's detail page) with a
/// 303; nothing else happens.
pub fn ensure_author(
    viewer: &User,
    author_id: Uuid,
    fallback: impl Into<String>,
) -> Result<(), HttpError> {
    if viewer.id == author_id {
        return Ok(());
    }

    let fallback = fallback.into();
    tracing::warn!(
        username = %viewer.username,
        redirect = %fallback,
        "Mutation attempted by non-owner"
    );
    Err(HttpError::redirect(fallback))
}
