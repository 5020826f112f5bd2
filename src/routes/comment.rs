use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::AppError;
use crate::pagination::Page;
use crate::response::ResponseDto;
use crate::service::comment::{self as comments, NewComment};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(add)))
        .service(web::resource("/post/{post_id:\\d+}").route(web::get().to(list_for_post)))
        .service(
            web::resource("/{id:\\d+}")
                .route(web::get().to(get_comment))
                .route(web::put().to(update))
                .route(web::delete().to(remove)),
        );
}

#[derive(Deserialize)]
struct PageQuery {
    offset: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct UpdateCommentRequest {
    content: Option<String>,
}

async fn add(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, AppError> {
    let created = comments::create(db.get_ref(), &auth, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(created))))
}

async fn list_for_post(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.offset, query.limit);
    let listed = comments::list_for_post(db.get_ref(), auth.0.as_ref(), path.into_inner(), page).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(listed))))
}

async fn get_comment(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let found = comments::get(db.get_ref(), auth.0.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let updated = comments::update(db.get_ref(), &auth, path.into_inner(), payload.into_inner().content).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    comments::delete(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::message("comment deleted")))
}
