mod access;
mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod tracing_config;
mod utils;

#[cfg(test)]
mod test_utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use config::Config;
use db::{DBClient, UserExt};
use dotenv::dotenv;
use models::UserRole;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: db::DBClient,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let _guard = tracing_config::init_tracing();

    let config = Config::init();

    let connect_options = match SqliteConnectOptions::from_str(&config.database_url) {
        Ok(options) => options.create_if_missing(true).foreign_keys(true),
        Err(err) => {
            tracing::error!("Invalid DATABASE_URL: {:?}", err);
            std::process::exit(1);
        }
    };

    let pool = match SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    if let Err(err) = db_client.migrate().await {
        tracing::error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    if let Some(username) = &config.admin_username {
        promote_admin(&db_client, username).await;
    }

    let frontend_origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!("Invalid FRONTEND_URL: {:?}", err);
            std::process::exit(1);
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await
    {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {:?}", err);
    }
}

/// Give the configured user the admin role, if they have registered
async fn promote_admin(db_client: &DBClient, username: &str) {
    match db_client.get_user(None, Some(username), None).await {
        Ok(Some(user)) if user.role == UserRole::Admin => {}
        Ok(Some(user)) => match db_client.update_user_role(user.id, UserRole::Admin).await {
            Ok(_) => tracing::info!(username = %username, "Promoted to admin"),
            Err(err) => tracing::error!("DB error, promoting admin: {}", err),
        },
        Ok(None) => tracing::warn!(username = %username, "ADMIN_USERNAME is not registered yet"),
        Err(err) => tracing::error!("DB error, getting admin user: {}", err),
    }
}
