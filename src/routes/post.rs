use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::AppError;
use crate::pagination::Page;
use crate::response::ResponseDto;
use crate::service::post::{self as posts, parse_published_after, NewPost, PostChanges, PostFilter};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create))
            .route(web::get().to(list)),
    )
    .service(web::resource("/slug/{slug}").route(web::get().to(get_by_slug)))
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(get_post))
            .route(web::put().to(update))
            .route(web::delete().to(remove)),
    )
    .service(web::resource("/{id:\\d+}/publish").route(web::post().to(publish)))
    .service(web::resource("/{id:\\d+}/unpublish").route(web::post().to(unpublish)))
    .service(web::resource("/{id:\\d+}/tags").route(web::post().to(add_tags)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    title: Option<String>,
    /// Comma separated tag names.
    tags: Option<String>,
    author: Option<String>,
    published_only: Option<bool>,
    published_after: Option<String>,
    offset: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct TagsRequest {
    tags: Vec<String>,
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::param_error(format!("{} cannot be empty", field)));
    }
    Ok(())
}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<NewPost>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    require_text(&payload.title, "title")?;
    require_text(&payload.content, "content")?;
    let created = posts::create(db.get_ref(), &auth, payload).await?;
    Ok(HttpResponse::Created().json(ResponseDto::success(Some(created))))
}

async fn list(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let published_after = query
        .published_after
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(parse_published_after)
        .transpose()?;
    let tags: Vec<String> = query
        .tags
        .as_deref()
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let filter = PostFilter {
        title: query.title,
        tags,
        author: query.author,
        published_only: query.published_only.unwrap_or(true),
        published_after,
    };
    let page = Page::new(query.offset, query.limit);
    let listed = posts::list(db.get_ref(), auth.0.as_ref(), filter, page).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(listed))))
}

async fn get_post(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let found = posts::get(db.get_ref(), auth.0.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn get_by_slug(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let found = posts::get_by_slug(db.get_ref(), auth.0.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<PostChanges>,
) -> Result<HttpResponse, AppError> {
    let changes = payload.into_inner();
    if let Some(title) = &changes.title {
        require_text(title, "title")?;
    }
    let updated = posts::update(db.get_ref(), &auth, path.into_inner(), changes).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(updated))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    posts::delete(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::message("post deleted")))
}

async fn publish(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let published = posts::publish(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(published))))
}

async fn unpublish(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let hidden = posts::unpublish(db.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(hidden))))
}

async fn add_tags(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<TagsRequest>,
) -> Result<HttpResponse, AppError> {
    let tagged = posts::add_tags(db.get_ref(), &auth, path.into_inner(), payload.into_inner().tags).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(tagged))))
}
