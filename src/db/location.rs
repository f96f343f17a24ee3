use super::DBClient;
use crate::dtos::LocationInputDto;
use crate::models::Location;
use chrono::Utc;

const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

pub trait LocationExt {
    async fn get_location(&self, location_id: i64) -> Result<Option<Location>, sqlx::Error>;

    async fn get_locations(&self) -> Result<Vec<Location>, sqlx::Error>;

    async fn create_location(&self, form: &LocationInputDto) -> Result<Location, sqlx::Error>;

    async fn edit_location(
        &self,
        location_id: i64,
        form: &LocationInputDto,
    ) -> Result<Location, sqlx::Error>;

    async fn delete_location(&self, location_id: i64) -> Result<(), sqlx::Error>;
}

impl LocationExt for DBClient {
    async fn get_location(&self, location_id: i64) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?"
        ))
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_location(&self, form: &LocationInputDto) -> Result<Location, sqlx::Error> {
        sqlx::query_as::<_, Location>(&format!(
            r#"
            INSERT INTO locations (name, is_published, created_at)
            VALUES (?, ?, ?)
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(&form.name)
        .bind(form.is_published)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_location(
        &self,
        location_id: i64,
        form: &LocationInputDto,
    ) -> Result<Location, sqlx::Error> {
        sqlx::query_as::<_, Location>(&format!(
            "UPDATE locations SET name = ?, is_published = ? WHERE id = ? RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(&form.name)
        .bind(form.is_published)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_location(&self, location_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(location_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
