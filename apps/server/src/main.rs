#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use certwatch_service::{Config, MonitorStore, MonitoringScheduler, database};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod cors;
mod error;
mod routes;

use error::AppError;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = Config::from_config(env::var_os("CERTWATCH_CONFIG"))?;
    logger::init_with_directive(&config.logging.level);

    let store: Arc<dyn MonitorStore> = Arc::new(database::connect(&config.database).await?);

    let shutdown = CancellationToken::new();
    let scheduler = MonitoringScheduler::from_config(&config.monitoring, store.clone())?
        .spawn(shutdown.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let served = run_server(addr, store, config.server.allowed_origins.clone()).await;

    info!("Server stopped, waiting for the sweep loop to finish");
    shutdown.cancel();
    if let Err(e) = scheduler.await {
        tracing::error!("Sweep loop ended abnormally: {e}");
    }

    served
}

async fn run_server(
    addr: SocketAddr,
    store: Arc<dyn MonitorStore>,
    allowed_origins: Vec<String>,
) -> Result<(), AppError> {
    let store = web::Data::from(store);

    info!(%addr, ?allowed_origins, "Starting HTTP server");
    HttpServer::new(move || {
        App::new()
            .wrap(cors::cors(&allowed_origins))
            .app_data(store.clone())
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
