#![allow(dead_code, unused_macros)]

use actix_web::web;
use quill_backend::config::AppConfig;
use quill_backend::db::connect_in_memory;
use quill_backend::token::TokenService;
use sea_orm::DatabaseConnection;

pub const PASSWORD: &str = "Str0ngP@ssw0rd";

pub struct TestState {
    pub config: web::Data<AppConfig>,
    pub db: web::Data<DatabaseConnection>,
    pub tokens: web::Data<TokenService>,
}

pub async fn state() -> TestState {
    let config = AppConfig {
        jwt_secret: "test-secret".to_string(),
        ..Default::default()
    };
    let db = connect_in_memory().await.expect("in-memory database");
    TestState {
        tokens: web::Data::new(TokenService::new(&config)),
        config: web::Data::new(config),
        db: web::Data::new(db),
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Builds the full application over a fresh in-memory database.
macro_rules! test_app {
    () => {{
        let state = common::state().await;
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(state.config.clone())
                .app_data(state.db.clone())
                .app_data(state.tokens.clone())
                .configure(quill_backend::routes::config),
        )
        .await
    }};
}

/// Sends a `TestRequest` and returns `(status, json body)`.
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let res = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = res.status();
        let body: serde_json::Value = actix_web::test::read_body_json(res).await;
        (status, body)
    }};
}

/// Registers `$name` with `common::PASSWORD` and returns the new user id.
macro_rules! register {
    ($app:expr, $name:expr) => {{
        let (status, body) = send!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/api/users")
                .set_json(serde_json::json!({
                    "username": $name,
                    "email": format!("{}@example.com", $name),
                    "password": common::PASSWORD,
                }))
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }};
}

/// Logs in through the form endpoint and returns `(access, refresh)`.
macro_rules! login {
    ($app:expr, $name:expr) => {{
        let (status, body) = send!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/api/auth/token")
                .set_form(vec![("username", $name), ("password", common::PASSWORD)])
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED, "{}", body);
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }};
}
