pub mod author;
pub mod comment;
pub mod cors;
pub mod post;
pub mod tag;
pub mod token;
pub mod user;

use actix_web::web;

use crate::response::{form_error_handler, json_error_handler, query_error_handler};

/// Mounts every endpoint under `/api` together with the extractor error
/// handlers that turn malformed input into `BadRequest`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::FormConfig::default().error_handler(form_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(
            web::scope("/api")
                .service(web::scope("/auth").configure(token::config))
                .service(web::scope("/users").configure(user::config))
                .service(web::scope("/authors").configure(author::config))
                .service(web::scope("/posts").configure(post::config))
                .service(web::scope("/tags").configure(tag::config))
                .service(web::scope("/comments").configure(comment::config)),
        );
}
