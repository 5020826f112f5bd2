use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::error::AppError;
use crate::response::ResponseDto;
use crate::service::session;
use crate::token::TokenService;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/token").route(web::post().to(login)))
        .service(web::resource("/refresh").route(web::post().to(refresh)));
}

/// OAuth2 password-grant style form; `username` may also be an email.
#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

async fn login(
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::param_error("username and password are required"));
    }
    let pair = session::login(db.get_ref(), tokens.get_ref(), &form.username, &form.password).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(pair))))
}

async fn refresh(
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let pair = session::refresh(db.get_ref(), tokens.get_ref(), &payload.refresh_token).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(pair))))
}
