use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::pagination::Page;
use crate::response::ResponseDto;
use crate::service::profile::{self as profiles, NewProfile, ProfileChanges};

/// `GET/POST/PUT /{id}` address a profile by its user id, `DELETE /{id}` by
/// the profile's own id.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(search)))
        .service(
            web::resource("/{id:\\d+}")
                .route(web::get().to(get_profile))
                .route(web::post().to(create))
                .route(web::put().to(update))
                .route(web::delete().to(remove)),
        );
}

#[derive(Deserialize)]
struct SearchQuery {
    username: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    offset: Option<i64>,
    limit: Option<i64>,
}

async fn search(
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.offset, query.limit);
    let found = profiles::search(
        db.get_ref(),
        query.username.as_deref(),
        query.firstname.as_deref(),
        query.lastname.as_deref(),
        page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn get_profile(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let found = profiles::get_by_user(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<NewProfile>,
) -> Result<HttpResponse, AppError> {
    let created = profiles::create(db.get_ref(), &auth, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(created))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<ProfileChanges>,
) -> Result<HttpResponse, AppError> {
    let updated = profiles::update(db.get_ref(), &auth, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    profiles::delete(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::message("profile deleted")))
}
