//! Shared fixtures for the router and database tests.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, header},
    response::Response,
};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    AppState,
    config::Config,
    db::{CategoryExt, DBClient, UserExt},
    dtos::{CategoryInputDto, InputPostDto},
    models::{Category, User, UserRole},
    routes::create_router,
    utils::{password, token},
};

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    /// Fresh in-memory database with the schema applied
    pub async fn new() -> Self {
        // one connection that never recycles, or the in-memory database is lost
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db_client = DBClient::new(pool);
        db_client.migrate().await.unwrap();

        let media_root = std::env::temp_dir().join(format!("blogicum-media-{}", Uuid::new_v4()));
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 3600,
            port: 0,
            frontend_url: "http://localhost:3000".to_string(),
            media_root: media_root.to_string_lossy().into_owned(),
            posts_per_page: 10,
            admin_username: None,
        };

        TestApp {
            state: AppState {
                env: Arc::new(config),
                db_client,
            },
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn user(&self, username: &str) -> User {
        let hash = password::hash(TEST_PASSWORD).unwrap();
        self.state
            .db_client
            .save_user(
                username,
                "",
                "",
                &format!("{username}@example.com"),
                &hash,
            )
            .await
            .unwrap()
    }

    pub async fn admin(&self, username: &str) -> User {
        let user = self.user(username).await;
        self.state
            .db_client
            .update_user_role(user.id, UserRole::Admin)
            .await
            .unwrap()
    }

    pub async fn category(&self, slug: &str, is_published: bool) -> Category {
        self.state
            .db_client
            .create_category(&CategoryInputDto {
                title: slug.to_string(),
                description: String::new(),
                slug: slug.to_string(),
                is_published,
            })
            .await
            .unwrap()
    }

    pub fn token(&self, user: &User) -> String {
        token::create_token(
            &user.id.to_string(),
            self.state.env.jwt_secret.as_bytes(),
            self.state.env.jwt_maxage,
        )
        .unwrap()
    }

    pub async fn get(&self, uri: &str, as_user: Option<&User>) -> Response {
        self.send("GET", uri, as_user, None).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    /// One request through the full router; JSON body when given
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        as_user: Option<&User>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = as_user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router().oneshot(request).await.unwrap()
    }
}

/// A valid post form dated an hour ago
pub fn post_form(title: &str) -> InputPostDto {
    InputPostDto {
        title: title.to_string(),
        text: format!("{title} text"),
        pub_date: Utc::now() - Duration::hours(1),
        category_id: None,
        location_id: None,
        image: None,
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
