pub mod cache;
pub mod csv_source;
pub mod resolve;
pub mod types;
pub mod yahoo;

pub use cache::{create_cache, PriceCache};
pub use csv_source::CsvSource;
pub use resolve::normalize;
pub use types::*;
pub use yahoo::YahooSource;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("data source returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("data source error: {0}")]
    Api(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Inclusive start, exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Anything that can deliver a raw daily price table for a ticker.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, ticker: &Ticker, range: DateRange) -> Result<RawTable, MarketDataError>;
}

/// Data source adapter: fetch, normalize, memoize.
///
/// Loading never fails. A source error is logged and turned into an empty
/// table that carries the error text so the page can say what went wrong.
pub struct MarketData {
    source: Arc<dyn PriceSource>,
    cache: PriceCache,
    start: NaiveDate,
    cache_ttl: Option<Duration>,
}

impl MarketData {
    pub fn new(source: Arc<dyn PriceSource>, start: NaiveDate, cache_ttl: Option<Duration>) -> Self {
        Self {
            source,
            cache: create_cache(),
            start,
            cache_ttl,
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub async fn load(&self, ticker: &Ticker) -> Arc<PriceTable> {
        if let Some(hit) = cache::lookup(&self.cache, ticker, self.cache_ttl).await {
            tracing::debug!("Price cache hit for {}", ticker);
            return hit;
        }

        let range = DateRange {
            start: self.start,
            end: Utc::now().date_naive(),
        };

        tracing::info!(
            "Fetching {} from {} ({} to {})",
            ticker,
            self.source.name(),
            range.start,
            range.end
        );

        let table = match self.source.fetch(ticker, range).await {
            Ok(raw) => {
                if raw.is_empty() {
                    tracing::warn!("{} returned no rows for {}", self.source.name(), ticker);
                }
                normalize(ticker.clone(), raw)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", ticker, e);
                PriceTable::failed(ticker.clone(), e.to_string())
            }
        };

        let table = Arc::new(table);
        if table.is_empty() {
            tracing::warn!("No price data for {}; not caching", ticker);
        } else {
            tracing::info!("Loaded {} bars for {}", table.len(), ticker);
            cache::store(&self.cache, ticker, table.clone(), self.cache_ttl).await;
        }
        table
    }
}
