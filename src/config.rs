use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Lifetime of access tokens, in minutes.
    pub access_token_expire_minutes: i64,
    /// Lifetime of refresh tokens, in minutes.
    pub refresh_token_expire_minutes: i64,
    pub token_header: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 38321,
            sqlite_path: "./data/quill.sqlite".to_string(),
            database_url: None,
            jwt_secret: "change-me-in-production".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_minutes: 10080,
            token_header: "Authorization".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.server_port);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or(defaults.sqlite_path);
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET_KEY")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or(defaults.jwt_secret);

        let access_token_expire_minutes = env::var("JWT_ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults.access_token_expire_minutes);

        let refresh_token_expire_minutes = env::var("JWT_REFRESH_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults.refresh_token_expire_minutes);

        let token_header = env::var("TOKEN_HEADER").unwrap_or(defaults.token_header);

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            access_token_expire_minutes,
            refresh_token_expire_minutes,
            token_header,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}?mode=rwc", path)
    }
}
