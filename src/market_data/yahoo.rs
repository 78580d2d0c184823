use super::types::{Cell, RawTable, Ticker};
use super::{DateRange, MarketDataError, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Option<Chart>,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Option<Vec<Quote>>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

fn value_at(series: &Option<Vec<Option<f64>>>, idx: usize) -> Cell {
    Cell::from_option(series.as_ref().and_then(|v| v.get(idx)).and_then(|v| *v))
}

/// Daily history from the Yahoo Finance chart endpoint.
pub struct YahooSource {
    base_url: String,
    client: reqwest::Client,
}

impl YahooSource {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn chart_url(&self, ticker: &Ticker, range: DateRange) -> String {
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            ticker,
            midnight_utc(range.start),
            midnight_utc(range.end)
        )
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[async_trait]
impl PriceSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, ticker: &Ticker, range: DateRange) -> Result<RawTable, MarketDataError> {
        let url = self.chart_url(ticker, range);
        tracing::debug!("Requesting {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Unknown symbols come back as 404 with a chart.error payload.
        let parsed: Option<ChartResponse> = serde_json::from_str(&body).ok();
        if let Some(message) = parsed.as_ref().and_then(chart_error) {
            return Err(MarketDataError::Api(message));
        }
        if !status.is_success() {
            return Err(MarketDataError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed = parsed.ok_or_else(|| {
            MarketDataError::Parse("chart response is not valid JSON".to_string())
        })?;
        Ok(chart_to_table(parsed))
    }
}

fn chart_error(response: &ChartResponse) -> Option<String> {
    let error = response.chart.as_ref()?.error.as_ref()?;
    Some(match (&error.code, &error.description) {
        (Some(code), Some(description)) => format!("{code}: {description}"),
        (None, Some(description)) => description.clone(),
        (Some(code), None) => code.clone(),
        (None, None) => "unknown error".to_string(),
    })
}

fn chart_to_table(response: ChartResponse) -> RawTable {
    let mut table = RawTable::new(COLUMNS.iter().map(|c| c.to_string()).collect());

    let Some(result) = response
        .chart
        .and_then(|c| c.result)
        .and_then(|mut r| r.pop())
    else {
        return table;
    };

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let (quote, adjclose) = match result.indicators {
        Some(indicators) => (
            indicators.quote.and_then(|mut q| q.pop()).unwrap_or_default(),
            indicators
                .adjclose
                .and_then(|mut a| a.pop())
                .unwrap_or_default(),
        ),
        None => (Quote::default(), AdjClose::default()),
    };

    for (idx, ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| Cell::Text(dt.date_naive().format("%Y-%m-%d").to_string()))
            .unwrap_or(Cell::Missing);

        table.push_row(vec![
            date,
            value_at(&quote.open, idx),
            value_at(&quote.high, idx),
            value_at(&quote.low, idx),
            value_at(&quote.close, idx),
            value_at(&adjclose.adjclose, idx),
            value_at(&quote.volume, idx),
        ]);
    }

    table
}
