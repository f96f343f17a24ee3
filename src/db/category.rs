use super::DBClient;
use crate::dtos::CategoryInputDto;
use crate::models::Category;
use chrono::Utc;

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

pub trait CategoryExt {
    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, sqlx::Error>;

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, sqlx::Error>;

    /// All categories by title, hidden ones included
    async fn get_categories(&self) -> Result<Vec<Category>, sqlx::Error>;

    async fn create_category(&self, form: &CategoryInputDto) -> Result<Category, sqlx::Error>;

    async fn edit_category(
        &self,
        category_id: i64,
        form: &CategoryInputDto,
    ) -> Result<Category, sqlx::Error>;

    async fn delete_category(&self, category_id: i64) -> Result<(), sqlx::Error>;
}

impl CategoryExt for DBClient {
    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?"
        ))
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY title, id"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_category(&self, form: &CategoryInputDto) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (title, description, slug, is_published, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&form.title)
        .bind(&form.description)
        .bind(&form.slug)
        .bind(form.is_published)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_category(
        &self,
        category_id: i64,
        form: &CategoryInputDto,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET title = ?, description = ?, slug = ?, is_published = ?
            WHERE id = ?
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&form.title)
        .bind(&form.description)
        .bind(&form.slug)
        .bind(form.is_published)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_category(&self, category_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
