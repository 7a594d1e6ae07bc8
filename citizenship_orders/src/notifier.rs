use anyhow::Context;
use async_trait::async_trait;
use shared_kernel::http_client::HttpClient;
use url::Url;

use crate::envelope::Envelope;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, callback_url: &Url, envelope: &Envelope) -> anyhow::Result<()>;
}

/// POSTs the envelope as JSON to the caller's callback URL, once.
pub struct WebhookNotifier {
    client: HttpClient,
}

impl WebhookNotifier {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(err, skip(self, envelope), fields(ok = envelope.is_ok()), level = "info")]
    async fn notify(&self, callback_url: &Url, envelope: &Envelope) -> anyhow::Result<()> {
        self.client
            .post_json(callback_url.clone(), envelope)
            .await
            .with_context(|| format!("Failed to deliver the result to {callback_url}"))?;
        Ok(())
    }
}
