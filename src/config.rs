#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub frontend_url: String,
    pub media_root: String,
    pub posts_per_page: i64,
    pub admin_username: Option<String>,
}

impl Config {
    /// Read configuration from the environment (after `dotenv()`)
    ///
    /// Missing required variables abort startup.
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage
                .parse::<i64>()
                .expect("JWT_MAXAGE must be a number of seconds"),
            port: env_or("PORT", 8000),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            media_root: std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
            posts_per_page: env_or("POSTS_PER_PAGE", 10),
            admin_username: std::env::var("ADMIN_USERNAME")
                .ok()
                .filter(|name| !name.is_empty()),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
