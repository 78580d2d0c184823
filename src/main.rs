use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod charts; // Plotly figure builders
mod cleaning; // Per-view row filtering and numeric coercion
mod config;
mod dashboard; // Render pass + HTTP handlers
mod error;
mod forecast; // Additive model and forecast pipeline
mod market_data; // Price sources, normalization, cache

use config::{Config, ProviderKind};
use market_data::{CsvSource, MarketData, PriceSource, YahooSource};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    market: Arc<MarketData>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn router(state: AppState) -> Router {
    let static_dir = state.config.service.static_dir.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/options", get(dashboard::handlers::get_options))
        .route("/api/dashboard", get(dashboard::handlers::get_dashboard))
        // Single-page front-end
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

fn price_source(config: &Config) -> Result<Arc<dyn PriceSource>> {
    let market = &config.market_data;
    let source: Arc<dyn PriceSource> = match market.provider {
        ProviderKind::Yahoo => Arc::new(YahooSource::new(
            market.base_url.clone(),
            &market.user_agent,
            Duration::from_secs(market.timeout_secs),
        )?),
        ProviderKind::Csv => Arc::new(CsvSource::new(&market.csv_dir)),
    };
    Ok(source)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origin_values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                None
            } else {
                HeaderValue::from_str(trimmed).ok()
            }
        })
        .collect();

    if origin_values.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origin_values)
            .allow_methods([Method::GET])
            .allow_headers(Any),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_forecast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stock forecast dashboard...");

    let config = Config::load()?;
    info!("Configuration loaded: {}", config.service.name);
    info!(
        "Market data from {:?} starting {}, tickers {:?} ({:?} input)",
        config.market_data.provider,
        config.market_data.start_date,
        config.dashboard.tickers,
        config.dashboard.ticker_input
    );

    let source = price_source(&config)?;
    let market = MarketData::new(
        source,
        config.market_data.start()?,
        config.market_data.cache_ttl(),
    );

    let addr = format!("{}:{}", config.service.host, config.service.port);
    let cors = cors_layer(&config.service.allowed_origins);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        market: Arc::new(market),
    };

    let mut app = router(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    let app = app.layer(tower_http::trace::TraceLayer::new_for_http());

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
