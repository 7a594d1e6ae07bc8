use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use shared_kernel::http_client::HttpClientSettings;
use url::Url;

use crate::records::ArticleKey;

#[derive(Debug, Deserialize, Clone)]
pub struct ArticleSource {
    pub article: u32,
    pub url: Url,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperSettings {
    /// One listing page per article.
    pub sources: Vec<ArticleSource>,
    /// Maximum number of documents downloaded and extracted at the same time.
    pub concurrency_limit: usize,
    /// Wall-clock budget of a whole run.
    pub run_timeout_secs: u64,
    /// Listings older than this are not downloaded.
    pub max_age_years: u32,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl ScraperSettings {
    pub fn source_urls(&self) -> HashMap<ArticleKey, Url> {
        self.sources
            .iter()
            .map(|source| (ArticleKey::new(source.article), source.url.clone()))
            .collect()
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn http_client_settings(&self) -> HttpClientSettings {
        HttpClientSettings {
            max_retries: self.max_retries,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..Default::default()
        }
    }
}
