use super::DBClient;
use crate::dtos::{InputPostDto, PostDto};
use crate::models::Post;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

const POST_COLUMNS: &str = "id, title, text, pub_date, is_published, image, author_id, category_id, location_id, created_at";

/// Post rows joined with author, category and (published) location, plus the
/// comment count aggregated in the same statement.
const ANNOTATED_POSTS: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.is_published, p.image, p.created_at,
           p.author_id, u.username AS author_username,
           p.category_id, c.title AS category_title, c.slug AS category_slug,
           c.is_published AS category_is_published,
           p.location_id, l.name AS location_name,
           COUNT(cm.id) AS comment_count
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id AND l.is_published = 1
    LEFT JOIN comments cm ON cm.post_id = p.id
    WHERE 1 = 1"#;

const COUNT_POSTS: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE 1 = 1"#;

/// Who is looking, and when
#[derive(Debug, Clone, Copy)]
pub struct Audience {
    pub viewer: Option<Uuid>,
    pub now: DateTime<Utc>,
}

/// Restrictions for post listings
///
/// Public pages always set `visible_to`; the admin list leaves it empty and
/// filters on the raw fields instead.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub visible_to: Option<Audience>,
    pub category_id: Option<i64>,
    pub author_id: Option<Uuid>,
    pub is_published: Option<bool>,
    pub search: Option<String>,
}

impl PostFilter {
    pub fn visible(viewer: Option<Uuid>, now: DateTime<Utc>) -> Self {
        PostFilter {
            visible_to: Some(Audience { viewer, now }),
            ..Default::default()
        }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn by_author(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

/// SQL twin of [`crate::access::is_visible`]
pub fn push_visibility(builder: &mut QueryBuilder<'_, Sqlite>, audience: &Audience) {
    builder
        .push(" AND ((p.is_published = 1 AND p.pub_date <= ")
        .push_bind(audience.now)
        .push(" AND (p.category_id IS NULL OR c.is_published = 1))");
    if let Some(viewer) = audience.viewer {
        builder.push(" OR p.author_id = ").push_bind(viewer);
    }
    builder.push(")");
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    if let Some(audience) = &filter.visible_to {
        push_visibility(builder, audience);
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND p.category_id = ").push_bind(category_id);
    }
    if let Some(author_id) = filter.author_id {
        builder.push(" AND p.author_id = ").push_bind(author_id);
    }
    if let Some(is_published) = filter.is_published {
        builder.push(" AND p.is_published = ").push_bind(is_published);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (p.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.text LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub trait PostExt {
    /// Raw post row, no visibility rules applied
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error>;

    /// Annotated post, no visibility rules applied
    async fn get_post_dto(&self, post_id: i64) -> Result<Option<PostDto>, sqlx::Error>;

    /// Newest first by `pub_date`, with comment counts
    async fn get_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostDto>, sqlx::Error>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64, sqlx::Error>;

    async fn create_post(&self, author_id: Uuid, form: &InputPostDto)
    -> Result<Post, sqlx::Error>;

    async fn edit_post(&self, post_id: i64, form: &InputPostDto) -> Result<Post, sqlx::Error>;

    async fn delete_post(&self, post_id: i64) -> Result<(), sqlx::Error>;

    async fn set_post_published(
        &self,
        post_id: i64,
        is_published: bool,
    ) -> Result<Post, sqlx::Error>;
}

impl PostExt for DBClient {
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_post_dto(&self, post_id: i64) -> Result<Option<PostDto>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(ANNOTATED_POSTS);
        builder
            .push(" AND p.id = ")
            .push_bind(post_id)
            .push(" GROUP BY p.id");

        builder
            .build_query_as::<PostDto>()
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostDto>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(ANNOTATED_POSTS);
        push_filters(&mut builder, filter);
        builder
            .push(" GROUP BY p.id ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        builder
            .build_query_as::<PostDto>()
            .fetch_all(&self.pool)
            .await
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(COUNT_POSTS);
        push_filters(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
    }

    async fn create_post(
        &self,
        author_id: Uuid,
        form: &InputPostDto,
    ) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (title, text, pub_date, is_published, image, author_id, category_id, location_id, created_at)
            VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&form.title)
        .bind(&form.text)
        .bind(form.pub_date)
        .bind(&form.image)
        .bind(author_id)
        .bind(form.category_id)
        .bind(form.location_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_post(&self, post_id: i64, form: &InputPostDto) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = ?, text = ?, pub_date = ?, image = ?, category_id = ?, location_id = ?
            WHERE id = ?
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&form.title)
        .bind(&form.text)
        .bind(form.pub_date)
        .bind(&form.image)
        .bind(form.category_id)
        .bind(form.location_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn set_post_published(
        &self,
        post_id: i64,
        is_published: bool,
    ) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET is_published = ? WHERE id = ? RETURNING {POST_COLUMNS}"
        ))
        .bind(is_published)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
    }
}
