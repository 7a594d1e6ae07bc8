use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use crate::app_container::Application;
use crate::settings::Settings;

mod app_container;
mod errors;
mod routes;
mod settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared_kernel::tracing::config_telemetry("citizenship_orders")?;
    let result = start().await;
    shared_kernel::tracing::shutdown_global_tracer_provider();
    result
}

async fn start() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let application = web::Data::new(Application::new(settings.scraper)?);

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "starting server"
    );
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(routes::config)
            .app_data(application.clone())
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await
    .context("Server failed to run")
}
