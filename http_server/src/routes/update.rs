use std::sync::Arc;

use actix_web::web;
use citizenship_orders::known_records::KnownRecords;
use citizenship_orders::records::ArticleKey;
use citizenship_orders::run::{spawn_run, SubscriptionRequest};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::app_container::Application;
use crate::errors::ApiError;

#[derive(Deserialize, Debug)]
struct UpdateRequest {
    callback_url: String,
    #[serde(default)]
    known_records: KnownRecords,
    #[serde(default)]
    articles: Option<Vec<ArticleKey>>,
}

#[derive(Serialize)]
struct UpdateResponse {
    ok: bool,
    message: String,
    run_id: Uuid,
}

fn callback_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ApiError::BadRequest(format!("Invalid callback_url {raw:?}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ApiError::BadRequest(format!(
            "callback_url must be an http or https URL, now - {scheme}"
        ))),
    }
}

#[tracing::instrument(err, skip(app, data), level = "info")]
async fn update(
    data: web::Json<UpdateRequest>,
    app: web::Data<Application>,
) -> Result<web::Json<UpdateResponse>, ApiError> {
    let data = data.into_inner();
    let callback_url = callback_url(&data.callback_url)?;

    let handle = spawn_run(
        Arc::clone(&app.scraper),
        Arc::clone(&app.notifier),
        SubscriptionRequest {
            callback_url: callback_url.clone(),
            known_records: data.known_records,
            articles: data.articles,
        },
    );
    tracing::info!(run_id = %handle.run_id, "run scheduled");

    Ok(web::Json(UpdateResponse {
        ok: true,
        message: format!(
            "Successful request! When scraping is finished, we will send new data to the URL: {callback_url}."
        ),
        run_id: handle.run_id,
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/update").route(web::post().to(update)));
}

#[cfg(test)]
mod tests {
    use crate::app_container::test_support::{application, EMPTY_LISTING};
    use crate::routes;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[actix_web::test]
    async fn test_invalid_callback_url_is_rejected() {
        let app = test::init_service(
            App::new()
                .configure(routes::config)
                .app_data(web::Data::new(application("http://127.0.0.1:9/ordine-articolul-10/"))),
        )
        .await;

        for callback_url in ["not a url", "ftp://caller.test/results"] {
            let request = test::TestRequest::post()
                .uri("/update")
                .set_json(json!({ "callback_url": callback_url, "known_records": [] }))
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(response).await;
            assert_eq!(body["ok"], json!(false));
        }
    }

    #[actix_web::test]
    async fn test_malformed_body_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .configure(routes::config)
                .app_data(web::Data::new(application("http://127.0.0.1:9/ordine-articolul-10/"))),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/update")
            .set_json(json!({ "known_records": [] }))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["ok"], json!(false));
    }

    #[actix_web::test]
    async fn test_accepted_request_posts_the_result_to_the_callback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ordine-articolul-10/");
                then.status(200).header("content-type", "text/html").body(EMPTY_LISTING);
            })
            .await;
        let callback = server
            .mock_async(|when, then| {
                when.method(POST).path("/callback").json_body(json!({
                    "ok": true,
                    "message": "the process finished successfully",
                    "data": { "articolul_10": [] }
                }));
                then.status(200);
            })
            .await;

        let app = test::init_service(
            App::new()
                .configure(routes::config)
                .app_data(web::Data::new(application(&server.url("/ordine-articolul-10/")))),
        )
        .await;

        let callback_url = server.url("/callback");
        let request = test::TestRequest::post()
            .uri("/update")
            .set_json(json!({ "callback_url": callback_url, "known_records": [] }))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["ok"], json!(true));
        assert_eq!(
            body["message"],
            json!(format!(
                "Successful request! When scraping is finished, we will send new data to the URL: {callback_url}."
            ))
        );
        assert!(body["run_id"].is_string());

        for _ in 0..50 {
            if callback.hits_async().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        callback.assert_hits_async(1).await;
    }
}
