use actix_web::web;
use citizenship_orders::envelope::Envelope;
use citizenship_orders::known_records::KnownRecords;
use citizenship_orders::records::ArticleKey;
use serde::Deserialize;

use crate::app_container::Application;

#[derive(Deserialize, Debug)]
struct GetUpdatesRequest {
    #[serde(default)]
    known_records: KnownRecords,
    #[serde(default)]
    articles: Option<Vec<ArticleKey>>,
}

/// Runs a scrape while the caller waits and answers with its envelope.
#[tracing::instrument(skip(app, data), level = "info")]
async fn get_updates(
    data: web::Json<GetUpdatesRequest>,
    app: web::Data<Application>,
) -> web::Json<Envelope> {
    let data = data.into_inner();
    let envelope = app
        .scraper
        .run(&data.known_records, data.articles.as_deref())
        .await;
    web::Json(envelope)
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/get_updates").route(web::post().to(get_updates)));
}
