//! Plotly figure builders.
//!
//! Figures are plain `{data, layout}` documents that the page hands to
//! `Plotly.newPlot` unchanged.

pub mod candlestick;
pub mod forecast;
pub mod time_series;

pub use candlestick::candlestick_chart;
pub use forecast::{components_chart, forecast_chart};
pub use time_series::time_series_chart;

use crate::cleaning::CleanError;
use crate::market_data::ColumnNotFoundError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const BACKGROUND: &str = "#111111";
pub const FOREGROUND: &str = "#f2f5fa";
pub const GRID: &str = "#283442";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error(transparent)]
    MissingColumn(#[from] ColumnNotFoundError),
    #[error("no valid data for {0}")]
    NoData(String),
}

impl From<CleanError> for ChartError {
    fn from(e: CleanError) -> Self {
        match e {
            CleanError::MissingColumn(missing) => ChartError::MissingColumn(missing),
            CleanError::NoData(subject) => ChartError::NoData(subject),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub x: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increasing: Option<CandleStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decreasing: Option<CandleStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<String>,
}

impl Trace {
    /// A `scatter` trace over dates.
    pub fn scatter(name: &str, mode: &'static str, x: &[NaiveDate], y: Vec<f64>) -> Self {
        Self {
            kind: "scatter",
            name: Some(name.to_string()),
            mode: Some(mode),
            x: date_labels(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn with_line(mut self, color: &str, width: f64) -> Self {
        self.line = Some(Line {
            color: color.to_string(),
            width,
        });
        self
    }

    /// Place the trace on a numbered subplot (`1` is the default pair).
    pub fn on_panel(mut self, panel: usize) -> Self {
        if panel > 1 {
            self.xaxis = Some(format!("x{}", panel));
            self.yaxis = Some(format!("y{}", panel));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub color: String,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleStyle {
    pub line: Line,
    pub fillcolor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rangeselector: Option<RangeSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rangeslider: Option<RangeSlider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridcolor: Option<&'static str>,
}

impl Axis {
    pub fn titled(text: &str) -> Self {
        Self {
            title: Some(Title::new(text)),
            gridcolor: Some(GRID),
            ..Default::default()
        }
    }

    /// Date axis with the zoom buttons and the range slider underneath.
    pub fn zoomable_dates(text: &str) -> Self {
        Self {
            axis_type: Some("date"),
            rangeselector: Some(RangeSelector::standard()),
            rangeslider: Some(RangeSlider { visible: true }),
            ..Self::titled(text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSelector {
    pub buttons: Vec<RangeButton>,
    pub bgcolor: &'static str,
    pub activecolor: &'static str,
    pub font: Font,
}

impl RangeSelector {
    /// 1m, 3m, 6m, 1y, YTD and All.
    pub fn standard() -> Self {
        Self {
            buttons: vec![
                RangeButton::back(1, "1m", "month"),
                RangeButton::back(3, "3m", "month"),
                RangeButton::back(6, "6m", "month"),
                RangeButton::back(1, "1y", "year"),
                RangeButton {
                    count: Some(1),
                    label: "YTD",
                    step: "year",
                    stepmode: Some("todate"),
                },
                RangeButton {
                    count: None,
                    label: "All",
                    step: "all",
                    stepmode: None,
                },
            ],
            bgcolor: "#2a3f5f",
            activecolor: "#506784",
            font: Font {
                color: FOREGROUND.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeButton {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    pub label: &'static str,
    pub step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepmode: Option<&'static str>,
}

impl RangeButton {
    fn back(count: u32, label: &'static str, step: &'static str) -> Self {
        Self {
            count: Some(count),
            label,
            step,
            stepmode: Some("backward"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSlider {
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    /// Additional subplot axes keyed `xaxis2`, `yaxis2`, ...
    #[serde(flatten)]
    pub panels: BTreeMap<String, Axis>,
    pub paper_bgcolor: &'static str,
    pub plot_bgcolor: &'static str,
    pub font: Font,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub showlegend: bool,
}

impl Layout {
    /// Dark-themed layout.
    pub fn dark(title: impl Into<String>, xaxis: Axis, yaxis: Axis) -> Self {
        Self {
            title: Title::new(title),
            xaxis,
            yaxis,
            panels: BTreeMap::new(),
            paper_bgcolor: BACKGROUND,
            plot_bgcolor: BACKGROUND,
            font: Font {
                color: FOREGROUND.to_string(),
            },
            height: None,
            showlegend: true,
        }
    }
}

pub fn date_labels(dates: &[NaiveDate]) -> Vec<String> {
    dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_selector_buttons() {
        let value = serde_json::to_value(RangeSelector::standard()).unwrap();
        let labels: Vec<&str> = value["buttons"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["1m", "3m", "6m", "1y", "YTD", "All"]);
        assert_eq!(value["buttons"][4]["stepmode"], "todate");
        assert_eq!(value["buttons"][5], json!({"label": "All", "step": "all"}));
    }

    #[test]
    fn test_layout_flattens_panel_axes() {
        let mut layout = Layout::dark("t", Axis::titled("x"), Axis::titled("y"));
        layout.panels.insert(
            "yaxis2".to_string(),
            Axis {
                domain: Some([0.0, 0.5]),
                ..Axis::titled("weekly")
            },
        );
        let value = serde_json::to_value(&layout).unwrap();
        assert_eq!(value["yaxis2"]["domain"], json!([0.0, 0.5]));
        assert_eq!(value["title"]["text"], "t");
        assert!(value.get("panels").is_none());
    }

    #[test]
    fn test_trace_panel_assignment() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let trace = Trace::scatter("a", "lines", &[d], vec![1.0]).on_panel(3);
        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["xaxis"], "x3");
        assert_eq!(value["x"], json!(["2020-01-01"]));
        assert!(value.get("open").is_none());
    }
}
