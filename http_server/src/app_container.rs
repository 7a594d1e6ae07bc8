use std::sync::Arc;

use citizenship_orders::config::ScraperSettings;
use citizenship_orders::notifier::{Notifier, WebhookNotifier};
use citizenship_orders::run::OrdersScraper;
use shared_kernel::http_client::HttpClient;

pub struct Application {
    pub scraper: Arc<OrdersScraper>,
    pub notifier: Arc<dyn Notifier>,
}

impl Application {
    pub fn new(settings: ScraperSettings) -> anyhow::Result<Self> {
        let client = HttpClient::new(&settings.http_client_settings())?;
        Ok(Application {
            scraper: Arc::new(OrdersScraper::with_pdf_extraction(settings)?),
            notifier: Arc::new(WebhookNotifier::new(client)),
        })
    }
}
