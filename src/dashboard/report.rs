use super::types::{DashboardReport, Issue, Section, SourceSummary};
use crate::charts;
use crate::config::{Config, ForecastConfig};
use crate::forecast::{self, ForecastError, ForecastModel, Horizon};
use crate::market_data::PriceTable;
use chrono::Utc;

/// Settings a render pass needs, detached from the shared config.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub provider: &'static str,
    pub preview_rows: usize,
    pub show_candlestick: bool,
    pub forecast: ForecastConfig,
}

impl RenderOptions {
    pub fn from_config(config: &Config, provider: &'static str) -> Self {
        Self {
            provider,
            preview_rows: config.dashboard.preview_rows,
            show_candlestick: config.dashboard.show_candlestick,
            forecast: config.forecast.clone(),
        }
    }
}

/// One full render pass over a loaded price table.
///
/// Every section is evaluated on its own; a failure in one is recorded in
/// that section and in `issues`, and never stops the others.
pub fn render_dashboard(
    table: &PriceTable,
    horizon: Horizon,
    options: &RenderOptions,
    model: &mut dyn ForecastModel,
) -> DashboardReport {
    let raw_preview = if table.is_empty() {
        Section::Warning(no_data_message(table))
    } else {
        Section::Ready(table.tail(options.preview_rows).to_vec())
    };

    let time_series = Section::from(charts::time_series_chart(table));
    let candlestick = options
        .show_candlestick
        .then(|| Section::from(charts::candlestick_chart(table)));

    let outcome = forecast::training_series(table)
        .and_then(|training| forecast::run_forecast(training, horizon, model));

    let (forecast_table, forecast_chart, components) = match &outcome {
        Ok(f) => (
            Section::Ready(f.table.rows.clone()),
            Section::Ready(charts::forecast_chart(f)),
            Section::Ready(charts::components_chart(f)),
        ),
        Err(e) => (failed(e), failed(e), failed(e)),
    };

    let mut issues = Vec::new();
    collect(&mut issues, "raw_preview", &raw_preview);
    collect(&mut issues, "time_series", &time_series);
    if let Some(section) = &candlestick {
        collect(&mut issues, "candlestick", section);
    }
    collect(&mut issues, "forecast_chart", &forecast_chart);

    tracing::debug!(
        "{}: {} of 5 sections ready",
        table.ticker,
        [
            raw_preview.is_ready(),
            time_series.is_ready(),
            forecast_table.is_ready(),
            forecast_chart.is_ready(),
            components.is_ready(),
        ]
        .iter()
        .filter(|ready| **ready)
        .count()
    );
    for issue in &issues {
        tracing::warn!(
            "{} {}: {:?} {}",
            table.ticker,
            issue.section,
            issue.severity,
            issue.message
        );
    }

    DashboardReport {
        ticker: table.ticker.clone(),
        horizon,
        generated_at: Utc::now(),
        source: SourceSummary {
            provider: options.provider,
            rows: table.len(),
            columns: table.columns.clone(),
            error: table.fetch_error.clone(),
        },
        raw_preview,
        time_series,
        candlestick,
        forecast_table,
        forecast_chart,
        components,
        issues,
    }
}

fn no_data_message(table: &PriceTable) -> String {
    match &table.fetch_error {
        Some(e) => format!("No data found for {}: {}", table.ticker, e),
        None => format!("No data found for {}", table.ticker),
    }
}

fn failed<T>(e: &ForecastError) -> Section<T> {
    Section::from(Err::<T, _>(e.clone()))
}

fn collect<T>(issues: &mut Vec<Issue>, section: &'static str, value: &Section<T>) {
    if let Some((severity, message)) = value.problem() {
        issues.push(Issue {
            section,
            severity,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::types::Severity;
    use crate::forecast::AdditiveModel;
    use crate::market_data::testing::daily_table;
    use crate::market_data::{normalize, Cell, RawTable, Ticker};
    use chrono::{Duration, NaiveDate};

    fn options() -> RenderOptions {
        RenderOptions::from_config(&Config::default(), "static")
    }

    fn render(table: &PriceTable, years: u32, options: &RenderOptions) -> DashboardReport {
        let mut model = AdditiveModel::new(options.forecast.clone());
        render_dashboard(table, Horizon::from_years(years), options, &mut model)
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
    }

    #[test]
    fn test_full_render() {
        let table = normalize(Ticker::parse("GOOG").unwrap(), daily_table(start(), 90));
        let report = render(&table, 1, &options());

        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!(matches!(&report.raw_preview, Section::Ready(rows) if rows.len() == 5));
        assert!(report.time_series.is_ready());
        assert!(report.candlestick.as_ref().is_some_and(Section::is_ready));

        let last = start() + Duration::days(89);
        let Section::Ready(rows) = &report.forecast_table else {
            panic!("forecast table not ready: {:?}", report.forecast_table);
        };
        assert_eq!(rows.len(), 90 + 365);
        assert_eq!(rows.last().map(|r| r.ds), Some(last + Duration::days(365)));
        assert!(report.components.is_ready());
    }

    #[test]
    fn test_missing_open_column_only_skips_price_charts() {
        let mut raw = RawTable::new(vec!["Date".into(), "Close".into(), "Volume".into()]);
        for i in 0..40 {
            let date = start() + Duration::days(i);
            raw.push_row(vec![
                Cell::Text(date.format("%Y-%m-%d").to_string()),
                Cell::Number(50.0 + i as f64),
                Cell::Number(10.0),
            ]);
        }
        let table = normalize(Ticker::parse("AAPL").unwrap(), raw);
        let report = render(&table, 2, &options());

        match &report.time_series {
            Section::Error(msg) => assert!(msg.contains("'Open'"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(report.candlestick, Some(Section::Error(_))));
        assert!(report.forecast_chart.is_ready());
        assert!(report.raw_preview.is_ready());

        let sections: Vec<&str> = report.issues.iter().map(|i| i.section).collect();
        assert_eq!(sections, vec!["time_series", "candlestick"]);
        assert!(report.issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_empty_table_warns_everywhere() {
        let table = PriceTable::failed(Ticker::parse("NOPE").unwrap(), "No data found");
        let report = render(&table, 1, &options());

        assert!(matches!(report.raw_preview, Section::Warning(_)));
        assert!(matches!(report.time_series, Section::Warning(_)));
        assert!(matches!(report.candlestick, Some(Section::Warning(_))));
        assert!(matches!(report.forecast_table, Section::Warning(_)));
        assert!(matches!(report.forecast_chart, Section::Warning(_)));
        assert!(matches!(report.components, Section::Warning(_)));
        let sections: Vec<&str> = report.issues.iter().map(|i| i.section).collect();
        assert_eq!(sections, vec!["raw_preview", "time_series", "candlestick", "forecast_chart"]);
        assert!(report.issues.iter().all(|i| i.severity == Severity::Warning));

        // Every issue names a field of the serialized report.
        let value = serde_json::to_value(&report).unwrap();
        for section in sections {
            assert_eq!(value[section]["status"], "warning", "{}", section);
        }
        assert_eq!(report.source.error.as_deref(), Some("No data found"));
    }

    #[test]
    fn test_candlestick_can_be_disabled() {
        let table = normalize(Ticker::parse("GME").unwrap(), daily_table(start(), 30));
        let mut options = options();
        options.show_candlestick = false;

        let report = render(&table, 1, &options);
        assert!(report.candlestick.is_none());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("candlestick").is_none());
        assert_eq!(value["time_series"]["status"], "ready");
    }
}
