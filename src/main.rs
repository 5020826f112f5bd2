use std::io;

use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use quill_backend::config::AppConfig;
use quill_backend::db::connect_db;
use quill_backend::routes;
use quill_backend::token::TokenService;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    let db = connect_db(&config).await.map_err(|e| {
        error!("failed to open database: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    let tokens = web::Data::new(TokenService::new(&config));
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(tokens.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::from_fn(routes::cors::cors_handler))
            .configure(routes::config)
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
