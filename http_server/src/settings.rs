use citizenship_orders::config::ScraperSettings;
use serde::Deserialize;
use shared_kernel::configuration::config;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub scraper: ScraperSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        config::<Settings>()
    }
}
