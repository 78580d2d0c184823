use super::report::{render_dashboard, RenderOptions};
use super::types::{DashboardReport, OptionsResponse};
use crate::config::{DashboardConfig, TickerInput};
use crate::error::AppError;
use crate::forecast::{AdditiveModel, Horizon};
use crate::market_data::Ticker;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub ticker: Option<String>,
    pub years: Option<u32>,
}

pub async fn get_options(State(state): State<AppState>) -> Json<OptionsResponse> {
    let dashboard = &state.config.dashboard;
    Json(OptionsResponse {
        title: dashboard.title.clone(),
        provider: state.market.source_name(),
        ticker_input: dashboard.ticker_input,
        tickers: dashboard.tickers.clone(),
        default_ticker: dashboard.default_ticker.clone(),
        min_years: dashboard.min_years,
        max_years: dashboard.max_years,
        default_years: dashboard.default_years,
        show_candlestick: dashboard.show_candlestick,
        share_links: dashboard.share_links.clone(),
    })
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardReport>, AppError> {
    let dashboard = &state.config.dashboard;
    let ticker = select_ticker(dashboard, query.ticker.as_deref())?;
    let horizon = select_horizon(dashboard, query.years)?;

    info!(
        "Rendering dashboard for {} ({} years, {} days)",
        ticker, horizon.years, horizon.days
    );

    let table = state.market.load(&ticker).await;
    let options = RenderOptions::from_config(&state.config, state.market.source_name());

    // The model fit runs on the blocking pool.
    let report = tokio::task::spawn_blocking(move || {
        let mut model = AdditiveModel::new(options.forecast.clone());
        render_dashboard(&table, horizon, &options, &mut model)
    })
    .await?;

    Ok(Json(report))
}

fn select_ticker(dashboard: &DashboardConfig, requested: Option<&str>) -> Result<Ticker, AppError> {
    let raw = requested.unwrap_or(&dashboard.default_ticker);
    let ticker = Ticker::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if dashboard.ticker_input == TickerInput::Preset
        && !dashboard
            .tickers
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(ticker.as_str()))
    {
        return Err(AppError::BadRequest(format!(
            "ticker {} is not one of {}",
            ticker,
            dashboard.tickers.join(", ")
        )));
    }
    Ok(ticker)
}

fn select_horizon(dashboard: &DashboardConfig, requested: Option<u32>) -> Result<Horizon, AppError> {
    let years = requested.unwrap_or(dashboard.default_years);
    if !(dashboard.min_years..=dashboard.max_years).contains(&years) {
        return Err(AppError::BadRequest(format!(
            "years must be between {} and {}, got {}",
            dashboard.min_years, dashboard.max_years, years
        )));
    }
    Ok(Horizon::from_years(years))
}
