//! Scheduled Jobs
//!
//! Background refresh of the exchange-rate cache. Runs on its own schedule,
//! shares no locks with balance operations and treats every failure as
//! non-fatal: the error is logged and the cache is left stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::interval;

use crate::rates::RateCache;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the rate refresh job
#[derive(Debug, Clone)]
pub struct RateRefreshConfig {
    /// Endpoint returning a `conversion_rates` table relative to the native
    /// currency (exchangerate-api format)
    pub url: String,
    /// How often to refresh
    pub refresh_interval: Duration,
}

/// Response shape of the rates endpoint
#[derive(Debug, Deserialize)]
struct RatesPayload {
    conversion_rates: HashMap<String, f64>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Rate fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rates endpoint returned no usable rates")]
    EmptyTable,
}

/// Periodic exchange-rate refresher feeding the [`RateCache`]
pub struct RateRefreshJob {
    cache: Arc<RateCache>,
    client: reqwest::Client,
    config: RateRefreshConfig,
}

impl RateRefreshJob {
    pub fn new(cache: Arc<RateCache>, config: RateRefreshConfig) -> Self {
        Self {
            cache,
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Start the refresh loop in the background.
    /// Returns a handle that can be used to abort the job.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            url = %self.config.url,
            interval_secs = self.config.refresh_interval.as_secs(),
            "Rate refresh job started"
        );

        let mut tick = interval(self.config.refresh_interval);
        loop {
            tick.tick().await;
            match self.refresh_once().await {
                Ok(count) => {
                    tracing::debug!(rates = count, "Exchange rates refreshed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Exchange rate refresh failed, cache left stale");
                }
            }
        }
    }

    /// Fetch the rates table once and store it in the cache
    pub async fn refresh_once(&self) -> Result<usize, JobError> {
        let payload: RatesPayload = self
            .client
            .get(&self.config.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rates = parse_rates(payload.conversion_rates);
        if rates.is_empty() {
            return Err(JobError::EmptyTable);
        }

        let count = rates.len();
        self.cache.store(rates);
        Ok(count)
    }
}

/// Convert the endpoint's float rates to decimals, dropping any value that
/// does not survive the conversion
fn parse_rates(raw: HashMap<String, f64>) -> HashMap<String, Decimal> {
    raw.into_iter()
        .filter_map(|(code, rate)| match Decimal::from_f64_retain(rate) {
            Some(rate) if rate > Decimal::ZERO => Some((code, rate)),
            _ => {
                tracing::warn!(code = %code, rate, "Dropping unusable exchange rate");
                None
            }
        })
        .collect()
}
