use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use reqwest_tracing::TracingMiddleware;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error as ThisError;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(ThisError, Debug)]
pub enum HttpClientError {
    #[error("Failed to fetch request from {url}")]
    Request {
        url: Url,
        #[source]
        source: reqwest_middleware::Error,
    },
    #[error("{url} responded with {status}")]
    Status { url: Url, status: StatusCode },
    #[error("Failed to read the response body from {url}")]
    Body {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to serialize the request body")]
    Serialize(#[from] serde_json::Error),
    #[error("httpBuilderError {0}")]
    HTTPBuilderError(String),
}

#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    /// Transient failures of GET requests are retried this many times.
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub headers: HashMap<&'static str, String>,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            headers: HashMap::from_iter([
                ("user-agent", USER_AGENT.to_string()),
                ("accept", "*/*".to_string()),
            ]),
        }
    }
}

/// A fetched response body together with what the server said it was.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub url: Url,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FetchedBody {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

struct HeadersMapGenerator(HeaderMap);

impl HeadersMapGenerator {
    fn into_inner(self) -> HeaderMap {
        self.0
    }
}

impl TryFrom<&HashMap<&'static str, String>> for HeadersMapGenerator {
    type Error = HttpClientError;

    fn try_from(value: &HashMap<&'static str, String>) -> Result<Self, Self::Error> {
        let mut header_map = HeaderMap::new();

        for (key, value) in value.iter() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| HttpClientError::HTTPBuilderError(format!("{err} {key}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| HttpClientError::HTTPBuilderError(format!("{err} {value}")))?;
            header_map.insert(name, value);
        }
        Ok(Self(header_map))
    }
}

/// Two clients share one connection pool: `fetcher` retries transient
/// failures, `delivery` sends every request exactly once.
#[derive(Clone)]
pub struct HttpClient {
    fetcher: ClientWithMiddleware,
    delivery: ClientWithMiddleware,
}

impl HttpClient {
    pub fn new(settings: &HttpClientSettings) -> Result<Self, HttpClientError> {
        let headers = HeadersMapGenerator::try_from(&settings.headers)?.into_inner();
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| HttpClientError::HTTPBuilderError(err.to_string()))?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let fetcher = ClientBuilder::new(client.clone())
            // Retry failed requests.
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(TracingMiddleware::default())
            .build();
        let delivery = ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self { fetcher, delivery })
    }

    pub async fn get(&self, url: Url) -> Result<FetchedBody, HttpClientError> {
        let response = self
            .fetcher
            .get(url.clone())
            .send()
            .await
            .map_err(|source| HttpClientError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpClientError::Status { url, status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        let bytes = response
            .bytes()
            .await
            .map_err(|source| HttpClientError::Body {
                url: url.clone(),
                source,
            })?;

        Ok(FetchedBody {
            url,
            content_type,
            bytes,
        })
    }

    pub async fn get_text(&self, url: Url) -> Result<String, HttpClientError> {
        self.get(url).await.map(|body| body.text())
    }

    /// Sends `body` as JSON without retrying and returns the status the
    /// receiver answered with.
    pub async fn post_json<Body: Serialize>(
        &self,
        url: Url,
        body: &Body,
    ) -> Result<StatusCode, HttpClientError> {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .delivery
            .post(url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await
            .map_err(|source| HttpClientError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpClientError::Status { url, status });
        }
        Ok(status)
    }
}
