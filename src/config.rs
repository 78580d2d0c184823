use chrono::NaiveDate;
use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub market_data: MarketDataConfig,
    pub dashboard: DashboardConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    /// Extra origins allowed to call the API. Empty means same-origin only.
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "stock-forecast".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3001,
            static_dir: "static".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Yahoo,
    Csv,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketDataConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub csv_dir: String,
    /// First day of history requested for every ticker.
    pub start_date: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// 0 keeps fetched tables for the lifetime of the process.
    pub cache_ttl_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Yahoo,
            base_url: crate::market_data::yahoo::DEFAULT_BASE_URL.to_string(),
            csv_dir: "data".to_string(),
            start_date: "2015-01-01".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_secs: 30,
            cache_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl MarketDataConfig {
    pub fn start(&self) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|e| {
            ConfigError::Message(format!(
                "market_data.start_date '{}' is not YYYY-MM-DD: {}",
                self.start_date, e
            ))
        })
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TickerInput {
    /// Only the preset tickers may be requested.
    Preset,
    /// Any syntactically valid ticker may be requested.
    FreeText,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShareLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DashboardConfig {
    pub title: String,
    pub ticker_input: TickerInput,
    pub tickers: Vec<String>,
    pub default_ticker: String,
    pub min_years: u32,
    pub max_years: u32,
    pub default_years: u32,
    pub show_candlestick: bool,
    pub preview_rows: usize,
    pub share_links: Vec<ShareLink>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Stock Forecast App".to_string(),
            ticker_input: TickerInput::Preset,
            tickers: ["GOOG", "AAPL", "MSFT", "GME"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            default_ticker: "GOOG".to_string(),
            min_years: 1,
            max_years: 4,
            default_years: 1,
            show_candlestick: true,
            preview_rows: 5,
            share_links: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Width of the uncertainty interval, e.g. 0.8 for an 80% band.
    pub interval_width: f64,
    pub n_changepoints: usize,
    /// Share of the history in which trend changepoints may be placed.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub yearly_order: usize,
    pub weekly_order: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            interval_width: 0.8,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_order: 10,
            weekly_order: 3,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&Config::default())?)
            .add_source(File::with_name("config/default").required(false));

        // Add environment-specific config if specified
        if let Ok(env) = env::var("RUN_ENV") {
            builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
        }

        // Override with environment variables
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("service.port", port)?;
        }
        if let Ok(provider) = env::var("MARKET_DATA_PROVIDER") {
            builder = builder.set_override("market_data.provider", provider.to_lowercase())?;
        }
        if let Ok(url) = env::var("MARKET_DATA_URL") {
            builder = builder.set_override("market_data.base_url", url)?;
        }
        if let Ok(dir) = env::var("PRICE_CSV_DIR") {
            builder = builder.set_override("market_data.csv_dir", dir)?;
        }
        if let Ok(mode) = env::var("TICKER_INPUT") {
            builder = builder.set_override("dashboard.ticker_input", mode.to_lowercase())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.market_data.start()?;

        let dashboard = &self.dashboard;
        if dashboard.min_years == 0 || dashboard.min_years > dashboard.max_years {
            return Err(ConfigError::Message(format!(
                "dashboard year bounds [{}, {}] are invalid",
                dashboard.min_years, dashboard.max_years
            )));
        }
        if !(dashboard.min_years..=dashboard.max_years).contains(&dashboard.default_years) {
            return Err(ConfigError::Message(format!(
                "dashboard.default_years {} is outside [{}, {}]",
                dashboard.default_years, dashboard.min_years, dashboard.max_years
            )));
        }
        if dashboard.ticker_input == TickerInput::Preset && dashboard.tickers.is_empty() {
            return Err(ConfigError::Message(
                "dashboard.tickers must not be empty in preset mode".to_string(),
            ));
        }

        let forecast = &self.forecast;
        if !(forecast.interval_width > 0.0 && forecast.interval_width < 1.0) {
            return Err(ConfigError::Message(format!(
                "forecast.interval_width {} must be in (0, 1)",
                forecast.interval_width
            )));
        }
        if !(forecast.changepoint_range > 0.0 && forecast.changepoint_range <= 1.0) {
            return Err(ConfigError::Message(format!(
                "forecast.changepoint_range {} must be in (0, 1]",
                forecast.changepoint_range
            )));
        }
        if forecast.changepoint_prior_scale <= 0.0 || forecast.seasonality_prior_scale <= 0.0 {
            return Err(ConfigError::Message(
                "forecast prior scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.dashboard.tickers, vec!["GOOG", "AAPL", "MSFT", "GME"]);
        assert_eq!(
            config.market_data.start().unwrap(),
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.market_data.start_date = "01/01/2015".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.min_years = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.forecast.interval_width = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.tickers.clear();
        assert!(config.validate().is_err());
        config.dashboard.ticker_input = TickerInput::FreeText;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layered_sources() {
        let yaml = r#"
dashboard:
  ticker_input: free_text
  max_years: 3
market_data:
  cache_ttl_secs: 0
"#;
        let config: Config = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&Config::default()).unwrap())
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.dashboard.ticker_input, TickerInput::FreeText);
        assert_eq!(config.dashboard.max_years, 3);
        assert_eq!(config.dashboard.min_years, 1);
        assert_eq!(config.market_data.cache_ttl(), None);
        assert_eq!(config.service.port, 3001);
    }
}
