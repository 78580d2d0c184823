use crate::charts::{ChartError, Figure};
use crate::config::{ShareLink, TickerInput};
use crate::forecast::{ForecastError, ForecastRow, Horizon};
use crate::market_data::{PriceBar, Ticker};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one independently rendered part of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Warning(String),
    Error(String),
}

impl<T> Section<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }

    /// Severity and message when the section did not render.
    pub fn problem(&self) -> Option<(Severity, &str)> {
        match self {
            Section::Ready(_) => None,
            Section::Warning(msg) => Some((Severity::Warning, msg.as_str())),
            Section::Error(msg) => Some((Severity::Error, msg.as_str())),
        }
    }
}

impl<T> From<Result<T, ChartError>> for Section<T> {
    fn from(result: Result<T, ChartError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e @ ChartError::MissingColumn(_)) => Section::Error(e.to_string()),
            Err(e @ ChartError::NoData(_)) => Section::Warning(e.to_string()),
        }
    }
}

impl<T> From<Result<T, ForecastError>> for Section<T> {
    fn from(result: Result<T, ForecastError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e @ ForecastError::EmptyInput(_)) => Section::Warning(e.to_string()),
            Err(e) => Section::Error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub section: &'static str,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub provider: &'static str,
    pub rows: usize,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub ticker: Ticker,
    pub horizon: Horizon,
    pub generated_at: DateTime<Utc>,
    pub source: SourceSummary,
    pub raw_preview: Section<Vec<PriceBar>>,
    pub time_series: Section<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candlestick: Option<Section<Figure>>,
    pub forecast_table: Section<Vec<ForecastRow>>,
    pub forecast_chart: Section<Figure>,
    pub components: Section<Figure>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionsResponse {
    pub title: String,
    pub provider: &'static str,
    pub ticker_input: TickerInput,
    pub tickers: Vec<String>,
    pub default_ticker: String,
    pub min_years: u32,
    pub max_years: u32,
    pub default_years: u32,
    pub show_candlestick: bool,
    pub share_links: Vec<ShareLink>,
}
