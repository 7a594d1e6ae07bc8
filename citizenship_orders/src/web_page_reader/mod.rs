mod listing;

use bytes::Bytes;
use chrono::NaiveDate;
use shared_kernel::http_client::{HttpClient, HttpClientError};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::pdf_reader::DocumentKind;
use crate::records::ArticleKey;

pub use listing::parse_listing;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpClientError),
    #[error("Failed to read the listing page {url}: {reason}")]
    Listing { url: Url, reason: String },
}

/// One order as announced on an article's listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub article: ArticleKey,
    pub list_name: String,
    /// As printed on the page, eg: `16.05.2024`.
    pub date: String,
    pub published: Option<NaiveDate>,
    pub link: Url,
    /// Index of the entry on its listing page.
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub entry: ListingEntry,
    pub kind: DocumentKind,
    pub bytes: Bytes,
}

pub struct WebPageReader {
    client: HttpClient,
}

impl WebPageReader {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    #[tracing::instrument(err, skip(self), level = "info")]
    pub async fn fetch_listing(
        &self,
        article: ArticleKey,
        url: Url,
    ) -> Result<Vec<ListingEntry>, FetchError> {
        let page_content = self.client.get_text(url.clone()).await?;

        let page_url = url.clone();
        let entries = tokio::task::spawn_blocking(move || {
            parse_listing(&page_content, article, &page_url)
        })
        .await
        .map_err(|err| FetchError::Listing {
            url,
            reason: err.to_string(),
        })?;

        info!(%article, entries = entries.len(), "read listing page");
        Ok(entries)
    }

    pub async fn fetch_document(&self, entry: ListingEntry) -> Result<FetchedDocument, FetchError> {
        let body = self.client.get(entry.link.clone()).await?;
        let kind = DocumentKind::detect(body.content_type.as_deref(), &body.bytes);
        Ok(FetchedDocument {
            entry,
            kind,
            bytes: body.bytes,
        })
    }
}
