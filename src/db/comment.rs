use super::DBClient;
use crate::dtos::CommentDto;
use crate::models::Comment;
use chrono::Utc;
use uuid::Uuid;

const COMMENT_COLUMNS: &str = "id, text, post_id, author_id, created_at";

pub trait CommentExt {
    /// Comments of a post, oldest first
    async fn get_comments(&self, post_id: i64) -> Result<Vec<CommentDto>, sqlx::Error>;

    /// A comment, but only when it belongs to `post_id`
    async fn get_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error>;

    async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error>;

    async fn edit_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comments(&self, post_id: i64) -> Result<Vec<CommentDto>, sqlx::Error> {
        sqlx::query_as::<_, CommentDto>(
            r#"
            SELECT cm.id, cm.text, cm.post_id, cm.author_id, u.username AS author_username, cm.created_at
            FROM comments cm
            INNER JOIN users u ON u.id = cm.author_id
            WHERE cm.post_id = ?
            ORDER BY cm.created_at ASC, cm.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ? AND post_id = ?"
        ))
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (text, post_id, author_id, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET text = ? WHERE id = ? RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(text)
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PostExt;
    use crate::test_utils::{TestApp, post_form};

    #[tokio::test]
    async fn comments_come_back_oldest_first() {
        let app = TestApp::new().await;
        let db = &app.state.db_client;
        let author = app.user("author").await;
        let reader = app.user("reader").await;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();

        db.create_comment(reader.id, post.id, "one").await.unwrap();
        db.create_comment(author.id, post.id, "two").await.unwrap();
        db.create_comment(reader.id, post.id, "three").await.unwrap();

        let texts: Vec<String> = db
            .get_comments(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn comment_lookup_is_scoped_to_its_post() {
        let app = TestApp::new().await;
        let db = &app.state.db_client;
        let author = app.user("author").await;
        let first = db.create_post(author.id, &post_form("a")).await.unwrap();
        let second = db.create_post(author.id, &post_form("b")).await.unwrap();
        let comment = db.create_comment(author.id, first.id, "hi").await.unwrap();

        assert!(db.get_comment(first.id, comment.id).await.unwrap().is_some());
        assert!(db.get_comment(second.id, comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_post_removes_its_comments() {
        let app = TestApp::new().await;
        let db = &app.state.db_client;
        let author = app.user("author").await;
        let post = db.create_post(author.id, &post_form("p")).await.unwrap();
        let comment = db.create_comment(author.id, post.id, "hi").await.unwrap();

        db.delete_post(post.id).await.unwrap();

        assert!(db.get_comment(post.id, comment.id).await.unwrap().is_none());
        assert!(matches!(
            db.delete_comment(comment.id).await,
            Err(sqlx::Error::RowNotFound)
        ));
    }
}
