// Player-count feed over HTTP

mod parse;

pub use parse::ExpositionParser;

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use crate::config::MetricsConfig;
use crate::models::PlayerReading;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// One reading per tracked title.
    async fn fetch(&self) -> anyhow::Result<Vec<PlayerReading>>;
}

pub struct HttpMetricsRepo {
    client: Client,
    url: String,
    parser: ExpositionParser,
}

impl HttpMetricsRepo {
    pub fn new(config: &MetricsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(crate::version::user_agent())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            parser: ExpositionParser::new(&config.filter_field, &config.filter_value)
                .context("Failed to compile metrics line filter")?,
        })
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsRepo {
    #[instrument(skip(self), fields(repo = "metrics", operation = "fetch", url = %self.url))]
    async fn fetch(&self) -> anyhow::Result<Vec<PlayerReading>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to send request")?;
        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("metrics feed returned {}", status);
        }
        let text = response.text().await.context("Failed to read body")?;
        let readings = self.parser.parse(&text);
        tracing::debug!(titles = readings.len(), "metrics parsed");
        Ok(readings)
    }
}
