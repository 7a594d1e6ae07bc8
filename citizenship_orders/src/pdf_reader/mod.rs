pub mod content_extractor;

use std::sync::Arc;

use scraper::Html;
use thiserror::Error;
use tracing::debug;

use crate::pdf_reader::content_extractor::{DocumentContext, ParsedDocument};
use crate::records::ArticleKey;
use crate::web_page_reader::FetchedDocument;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to extract pdf to text: {0}")]
    Pdf(String),
    #[error("Text extraction was aborted: {0}")]
    Aborted(String),
}

/// Converts the bytes of a downloaded document into text, one table row per line.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, file_bytes: &[u8]) -> Result<String, ExtractionError>;
}

pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, file_bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed font and xref tables
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(file_bytes))
            .map_err(|_| ExtractionError::Aborted("pdf-extract panicked".to_string()))?
            .map_err(|err| ExtractionError::Pdf(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Html,
}

impl DocumentKind {
    /// Trusts the PDF signature over the content type, some servers label
    /// every download as `text/html`.
    pub fn detect(content_type: Option<&str>, file_bytes: &[u8]) -> Self {
        if file_bytes.starts_with(PDF_MAGIC) {
            return DocumentKind::Pdf;
        }
        match content_type {
            Some(content_type) if content_type.to_ascii_lowercase().contains("html") => {
                DocumentKind::Html
            }
            _ => DocumentKind::Pdf,
        }
    }
}

/// One line per text node, so table cells of an HTML order stay apart.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct PdfReader {
    text_extractor: Arc<dyn TextExtractor>,
    articles: Arc<[ArticleKey]>,
}

impl PdfReader {
    /// `articles` are the ones whose headers may scope records inside a document.
    pub fn new(
        text_extractor: Arc<dyn TextExtractor>,
        articles: impl IntoIterator<Item = ArticleKey>,
    ) -> Self {
        Self {
            text_extractor,
            articles: articles.into_iter().collect(),
        }
    }

    /// Extraction and parsing run on the blocking pool; a panic inside the
    /// pdf library only loses this document.
    pub async fn read(&self, document: &FetchedDocument) -> Result<ParsedDocument, ExtractionError> {
        let text_extractor = Arc::clone(&self.text_extractor);
        let bytes = document.bytes.clone();
        let kind = document.kind;
        let entry = document.entry.clone();
        let articles = Arc::clone(&self.articles);

        let parsed = tokio::task::spawn_blocking(move || -> Result<ParsedDocument, ExtractionError> {
            let text = match kind {
                DocumentKind::Pdf => text_extractor.extract_text(&bytes)?,
                DocumentKind::Html => html_to_text(&String::from_utf8_lossy(&bytes)),
            };
            let context = DocumentContext {
                article: entry.article,
                articles: &articles,
                list_name: &entry.list_name,
                date: &entry.date,
            };
            Ok(content_extractor::extract(&text, context))
        })
        .await
        .map_err(|err| ExtractionError::Aborted(err.to_string()))??;

        debug!(
            link = %document.entry.link,
            records = parsed.records.len(),
            errors = parsed.errors.len(),
            "parsed document"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::{html_to_text, DocumentKind, ExtractionError, PdfReader, PdfTextExtractor, TextExtractor};
    use crate::records::ArticleKey;
    use crate::web_page_reader::{FetchedDocument, ListingEntry};
    use bytes::Bytes;
    use std::sync::Arc;
    use url::Url;

    struct PanickingExtractor;

    impl TextExtractor for PanickingExtractor {
        fn extract_text(&self, _file_bytes: &[u8]) -> Result<String, ExtractionError> {
            panic!("broken font table")
        }
    }

    fn document(kind: DocumentKind, body: &'static str) -> FetchedDocument {
        FetchedDocument {
            entry: ListingEntry {
                article: ArticleKey::new(10),
                list_name: "932P".to_string(),
                date: "16.05.2024".to_string(),
                published: None,
                link: Url::parse("https://cetatenie.just.ro/wp-content/uploads/932P.pdf").unwrap(),
                position: 0,
            },
            kind,
            bytes: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_document_kind_detection() {
        assert_eq!(DocumentKind::detect(Some("text/html"), b"%PDF-1.7"), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::detect(Some("text/html; charset=UTF-8"), b"<html>"),
            DocumentKind::Html
        );
        assert_eq!(
            DocumentKind::detect(Some("application/octet-stream"), b"garbage"),
            DocumentKind::Pdf
        );
        assert_eq!(DocumentKind::detect(None, b"garbage"), DocumentKind::Pdf);
    }

    #[test]
    fn test_html_to_text_keeps_cells_on_separate_lines() {
        let text = html_to_text(
            "<table><tr><td>1.</td><td>POPESCU ION</td><td>(16309/2020)</td></tr></table>",
        );
        assert_eq!(text, "1.\nPOPESCU ION\n(16309/2020)");
    }

    #[test]
    fn test_corrupt_pdf_is_an_extraction_error() {
        let result = PdfTextExtractor.extract_text(b"%PDF-1.4 this is not really a pdf");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_html_documents_are_parsed() {
        let reader = PdfReader::new(Arc::new(PdfTextExtractor), [ArticleKey::new(10)]);
        let parsed = reader
            .read(&document(
                DocumentKind::Html,
                "<ul><li>POPESCU ION (16309/2020)</li><li>IONESCU MARIA (16310/2020)</li></ul>",
            ))
            .await
            .unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].1.number_order, "(16310/2020)");
    }

    #[tokio::test]
    async fn test_a_panicking_extractor_only_fails_the_document() {
        let reader = PdfReader::new(Arc::new(PanickingExtractor), [ArticleKey::new(10)]);
        let result = reader.read(&document(DocumentKind::Pdf, "%PDF-1.4")).await;
        assert!(matches!(result, Err(ExtractionError::Aborted(_))));
    }
}
