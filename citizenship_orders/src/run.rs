use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use futures::future::try_join_all;
use futures::{stream, StreamExt};
use itertools::Itertools;
use serde::Deserialize;
use shared_kernel::http_client::HttpClient;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::config::ScraperSettings;
use crate::envelope::Envelope;
use crate::known_records::{KnownRecords, KnownRecordsError, KnownSet};
use crate::notifier::Notifier;
use crate::pdf_reader::content_extractor::ParsedDocument;
use crate::pdf_reader::{ExtractionError, PdfReader, PdfTextExtractor, TextExtractor};
use crate::records::{ArticleKey, ResultSet};
use crate::web_page_reader::{FetchError, ListingEntry, WebPageReader};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid known records")]
    InvalidKnownRecords(#[from] KnownRecordsError),
    #[error("{0} has no configured listing page")]
    UnknownArticle(ArticleKey),
    #[error("Failed to fetch the {article} listing")]
    ListingUnavailable {
        article: ArticleKey,
        #[source]
        source: FetchError,
    },
    #[error("The run did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("The run was aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
enum DocumentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// What a caller asks for: where to send the result and what it already has.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    pub callback_url: Url,
    #[serde(default)]
    pub known_records: KnownRecords,
    #[serde(default)]
    pub articles: Option<Vec<ArticleKey>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub listing_entries: usize,
    pub skipped_old_listings: usize,
    pub skipped_known_listings: usize,
    pub documents_parsed: usize,
    pub documents_failed: usize,
    pub parse_errors: usize,
    /// Records scoped to a configured article that this run did not ask for.
    pub records_out_of_scope: usize,
    pub records_parsed: usize,
    /// Records dropped because the caller knows them or they repeat within the run.
    pub records_deduplicated: usize,
}

#[derive(Debug)]
pub struct ScrapeOutput {
    pub articles: Vec<ArticleKey>,
    pub result: ResultSet,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub ok: bool,
    pub delivered: bool,
}

pub struct RunHandle {
    pub run_id: Uuid,
    pub completion: oneshot::Receiver<RunOutcome>,
}

struct DocumentOutcome {
    article: ArticleKey,
    position: usize,
    link: Url,
    parsed: Result<ParsedDocument, DocumentError>,
}

pub struct OrdersScraper {
    settings: ScraperSettings,
    sources: HashMap<ArticleKey, Url>,
    web_page_reader: WebPageReader,
    pdf_reader: PdfReader,
}

impl OrdersScraper {
    pub fn new(
        settings: ScraperSettings,
        text_extractor: Arc<dyn TextExtractor>,
    ) -> anyhow::Result<Self> {
        let client = HttpClient::new(&settings.http_client_settings())?;
        let sources = settings.source_urls();
        Ok(Self {
            pdf_reader: PdfReader::new(text_extractor, sources.keys().copied().sorted()),
            sources,
            settings,
            web_page_reader: WebPageReader::new(client),
        })
    }

    pub fn with_pdf_extraction(settings: ScraperSettings) -> anyhow::Result<Self> {
        Self::new(settings, Arc::new(PdfTextExtractor))
    }

    /// Explicit articles win, then the articles named in the known records,
    /// then every configured listing.
    fn requested_articles(
        &self,
        known: &KnownSet,
        articles: Option<&[ArticleKey]>,
    ) -> Result<Vec<ArticleKey>, RunError> {
        let requested = match articles
            .filter(|articles| !articles.is_empty())
            .or_else(|| known.articles())
        {
            Some(articles) => articles.iter().copied().sorted().dedup().collect_vec(),
            None => self.sources.keys().copied().sorted().collect_vec(),
        };

        if let Some(article) = requested
            .iter()
            .find(|article| !self.sources.contains_key(article))
        {
            return Err(RunError::UnknownArticle(*article));
        }
        Ok(requested)
    }

    pub async fn scrape(
        &self,
        known_records: &KnownRecords,
        articles: Option<&[ArticleKey]>,
    ) -> Result<ScrapeOutput, RunError> {
        let known = KnownSet::try_from(known_records)?;
        let articles = self.requested_articles(&known, articles)?;

        let timeout = self.settings.run_timeout();
        let (result, stats) = tokio::time::timeout(timeout, self.collect(&known, &articles))
            .await
            .map_err(|_| RunError::TimedOut(timeout))??;

        info!(
            articles = articles.len(),
            listing_entries = stats.listing_entries,
            skipped_old_listings = stats.skipped_old_listings,
            skipped_known_listings = stats.skipped_known_listings,
            documents_parsed = stats.documents_parsed,
            documents_failed = stats.documents_failed,
            parse_errors = stats.parse_errors,
            records_out_of_scope = stats.records_out_of_scope,
            records_parsed = stats.records_parsed,
            records_deduplicated = stats.records_deduplicated,
            "scrape finished"
        );

        Ok(ScrapeOutput {
            articles,
            result,
            stats,
        })
    }

    #[tracing::instrument(skip_all, level = "info")]
    pub async fn run(
        &self,
        known_records: &KnownRecords,
        articles: Option<&[ArticleKey]>,
    ) -> Envelope {
        match self.scrape(known_records, articles).await {
            Ok(output) => Envelope::assemble(&output.articles, output.result),
            Err(error) => {
                let error = anyhow::Error::from(error);
                error!(error = ?error, "run failed");
                Envelope::from_error(&error)
            }
        }
    }

    async fn collect(
        &self,
        known: &KnownSet,
        articles: &[ArticleKey],
    ) -> Result<(ResultSet, RunStats), RunError> {
        let mut stats = RunStats::default();

        let listings = try_join_all(articles.iter().map(|article| self.fetch_listing(*article))).await?;

        let today = Utc::now().date_naive();
        let mut entries = Vec::new();
        for entry in listings.into_iter().flatten() {
            stats.listing_entries += 1;
            if self.is_too_old(&entry, today) {
                stats.skipped_old_listings += 1;
                continue;
            }
            let year = entry.published.map(|published| published.year());
            if known.is_known_listing(entry.article, &entry.list_name, year) {
                stats.skipped_known_listings += 1;
                continue;
            }
            entries.push(entry);
        }

        let mut outcomes: Vec<DocumentOutcome> = stream::iter(entries)
            .map(|entry| self.read_document(entry))
            .buffer_unordered(self.settings.concurrency_limit.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| (outcome.article, outcome.position));

        let requested: HashSet<_> = articles.iter().copied().collect();
        let mut records = Vec::new();
        for outcome in outcomes {
            match outcome.parsed {
                Ok(document) => {
                    stats.documents_parsed += 1;
                    stats.parse_errors += document.errors.len();
                    for parse_error in &document.errors {
                        debug!(link = %outcome.link, %parse_error, "dropped a line");
                    }
                    for (article, record) in document.records {
                        if requested.contains(&article) {
                            records.push((article, record));
                        } else {
                            stats.records_out_of_scope += 1;
                            warn!(
                                link = %outcome.link,
                                %article,
                                number_order = %record.number_order,
                                "dropping a record of an article that was not requested"
                            );
                        }
                    }
                }
                Err(error) => {
                    stats.documents_failed += 1;
                    warn!(link = %outcome.link, error = ?error, "skipping document");
                }
            }
        }
        stats.records_parsed = records.len();

        let (unknown, known_dropped) = known.retain_unknown(records);
        let mut seen = HashSet::new();
        let mut result = ResultSet::with_articles(articles.iter().copied());
        for (article, record) in unknown {
            if seen.insert(record.key()) {
                result.push(article, record);
            }
        }
        stats.records_deduplicated = stats.records_parsed - result.number_of_records();
        debug!(known_dropped, "removed known records");

        Ok((result, stats))
    }

    async fn fetch_listing(&self, article: ArticleKey) -> Result<Vec<ListingEntry>, RunError> {
        let url = self
            .sources
            .get(&article)
            .cloned()
            .ok_or(RunError::UnknownArticle(article))?;
        self.web_page_reader
            .fetch_listing(article, url)
            .await
            .map_err(|source| RunError::ListingUnavailable { article, source })
    }

    async fn read_document(&self, entry: ListingEntry) -> DocumentOutcome {
        let article = entry.article;
        let position = entry.position;
        let link = entry.link.clone();

        let parsed = match self.web_page_reader.fetch_document(entry).await {
            Ok(document) => self
                .pdf_reader
                .read(&document)
                .await
                .map_err(DocumentError::from),
            Err(error) => Err(DocumentError::from(error)),
        };

        DocumentOutcome {
            article,
            position,
            link,
            parsed,
        }
    }

    /// Whole years since publication; undated entries are kept.
    fn is_too_old(&self, entry: &ListingEntry, today: NaiveDate) -> bool {
        entry.published.map_or(false, |published| {
            (today - published).num_days() / 365 > i64::from(self.settings.max_age_years)
        })
    }
}

/// Runs the scrape and delivers its envelope. Exactly one envelope is sent,
/// whether the scrape succeeds, fails or panics.
pub async fn run_and_notify(
    scraper: Arc<OrdersScraper>,
    notifier: Arc<dyn Notifier>,
    run_id: Uuid,
    request: SubscriptionRequest,
) -> RunOutcome {
    let SubscriptionRequest {
        callback_url,
        known_records,
        articles,
    } = request;

    let scrape = async move { scraper.run(&known_records, articles.as_deref()).await };
    notify_once(notifier.as_ref(), &callback_url, run_id, scrape).await
}

async fn notify_once<Scrape>(
    notifier: &dyn Notifier,
    callback_url: &Url,
    run_id: Uuid,
    scrape: Scrape,
) -> RunOutcome
where
    Scrape: Future<Output = Envelope> + Send + 'static,
{
    let envelope = match tokio::spawn(scrape.in_current_span()).await {
        Ok(envelope) => envelope,
        Err(join_error) => {
            error!(%join_error, "scrape task did not complete");
            Envelope::from_error(&RunError::Aborted(join_error.to_string()).into())
        }
    };

    let delivered = match notifier.notify(callback_url, &envelope).await {
        Ok(()) => true,
        Err(error) => {
            error!(error = ?error, "failed to deliver the result");
            false
        }
    };

    info!(ok = envelope.is_ok(), delivered, "run finished");
    RunOutcome {
        run_id,
        ok: envelope.is_ok(),
        delivered,
    }
}

/// Starts a run in the background. The handle's `completion` resolves once
/// the envelope has been delivered, or failed to be.
pub fn spawn_run(
    scraper: Arc<OrdersScraper>,
    notifier: Arc<dyn Notifier>,
    request: SubscriptionRequest,
) -> RunHandle {
    let run_id = Uuid::new_v4();
    let (sender, completion) = oneshot::channel();
    let span = info_span!("run", %run_id, callback_url = %request.callback_url);

    tokio::spawn(
        async move {
            let outcome = run_and_notify(scraper, notifier, run_id, request).await;
            // the caller may have stopped waiting
            let _ = sender.send(outcome);
        }
        .instrument(span),
    );

    RunHandle { run_id, completion }
}
