use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::error::AppError;
use crate::pagination::Page;
use crate::response::ResponseDto;
use crate::service::tag as tags;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(search)));
}

#[derive(Deserialize)]
struct SearchQuery {
    name: Option<String>,
    offset: Option<i64>,
    limit: Option<i64>,
}

async fn search(
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.offset, query.limit);
    let found = tags::search(db.get_ref(), query.name.as_deref(), page).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(found))))
}
