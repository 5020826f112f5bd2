use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::pagination::Page;
use crate::response::ResponseDto;
use crate::service::user::{self as users, RegisterUser, UserChanges};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(register))
            .route(web::get().to(search)),
    )
    .service(web::resource("/me").route(web::get().to(current)))
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(get_user))
            .route(web::put().to(update_user))
            .route(web::delete().to(delete_user)),
    )
    .service(web::resource("/{id:\\d+}/activate").route(web::post().to(activate)))
    .service(web::resource("/{id:\\d+}/deactivate").route(web::post().to(deactivate)));
}

#[derive(Deserialize)]
struct SearchQuery {
    username: Option<String>,
    email: Option<String>,
    offset: Option<i64>,
    limit: Option<i64>,
}

async fn register(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<RegisterUser>,
) -> Result<HttpResponse, AppError> {
    let created = users::register(db.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(created))))
}

async fn search(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.offset, query.limit);
    let found = users::search(db.get_ref(), query.username.as_deref(), query.email.as_deref(), page).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn current(db: web::Data<DatabaseConnection>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let me = users::current(db.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(me))))
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let found = users::get(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn update_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UserChanges>,
) -> Result<HttpResponse, AppError> {
    let updated = users::update(db.get_ref(), &auth, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}

async fn delete_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    users::delete(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::message("user deleted")))
}

async fn activate(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let updated = users::set_active(db.get_ref(), &auth, path.into_inner(), true).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}

async fn deactivate(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let updated = users::set_active(db.get_ref(), &auth, path.into_inner(), false).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}
