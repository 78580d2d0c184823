use super::{Axis, Figure, Layout, Marker, Trace};
use crate::forecast::Forecast;
use chrono::NaiveDate;

pub const FORECAST_COLOR: &str = "#0072B2";
pub const BAND_COLOR: &str = "rgba(0, 114, 178, 0.2)";
pub const ACTUAL_COLOR: &str = "black";

const PANEL_HEIGHT: u32 = 300;
const PANEL_GAP: f64 = 0.08;

/// Upper edge drawn invisibly, lower edge filled up to it.
fn band(name: &str, dates: &[NaiveDate], lower: Vec<f64>, upper: Vec<f64>, panel: usize) -> [Trace; 2] {
    let mut top = Trace::scatter(name, "lines", dates, upper)
        .with_line("rgba(0, 0, 0, 0)", 0.0)
        .on_panel(panel);
    top.showlegend = Some(false);

    let mut bottom = Trace::scatter(name, "lines", dates, lower)
        .with_line("rgba(0, 0, 0, 0)", 0.0)
        .on_panel(panel);
    bottom.fill = Some("tonexty");
    bottom.fillcolor = Some(BAND_COLOR.to_string());

    [top, bottom]
}

/// Actuals, point forecast and uncertainty band over history plus horizon.
pub fn forecast_chart(forecast: &Forecast) -> Figure {
    let rows = &forecast.table.rows;
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.ds).collect();

    let actual_dates: Vec<NaiveDate> = forecast.training.points.iter().map(|p| p.ds).collect();
    let mut actuals = Trace::scatter(
        "Actual",
        "markers",
        &actual_dates,
        forecast.training.points.iter().map(|p| p.y).collect(),
    );
    actuals.marker = Some(Marker {
        color: ACTUAL_COLOR.to_string(),
        size: 4.0,
    });

    let [upper, lower] = band(
        "Uncertainty interval",
        &dates,
        rows.iter().map(|r| r.yhat_lower).collect(),
        rows.iter().map(|r| r.yhat_upper).collect(),
        1,
    );

    let predicted = Trace::scatter("Predicted", "lines", &dates, rows.iter().map(|r| r.yhat).collect())
        .with_line(FORECAST_COLOR, 2.0);

    Figure {
        data: vec![actuals, upper, lower, predicted],
        layout: Layout::dark(
            format!("Forecast plot for {} years", forecast.horizon.years),
            Axis::zoomable_dates("ds"),
            Axis::titled("y"),
        ),
    }
}

/// One stacked panel per component: trend, then weekly and yearly when fitted.
pub fn components_chart(forecast: &Forecast) -> Figure {
    let rows = &forecast.table.rows;
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.ds).collect();
    let profiles = &forecast.profiles;

    let show_weekly = forecast.table.weekly_enabled && !profiles.weekly.is_empty();
    let show_yearly = forecast.table.yearly_enabled && !profiles.yearly.is_empty();
    let count = 1 + usize::from(show_weekly) + usize::from(show_yearly);

    let mut data = Vec::new();
    let mut axes: Vec<(Axis, Axis)> = Vec::new();

    let [upper, lower] = band(
        "trend interval",
        &dates,
        rows.iter().map(|r| r.trend_lower).collect(),
        rows.iter().map(|r| r.trend_upper).collect(),
        1,
    );
    data.extend([upper, lower]);
    data.push(
        Trace::scatter("trend", "lines", &dates, rows.iter().map(|r| r.trend).collect())
            .with_line(FORECAST_COLOR, 2.0),
    );
    axes.push((
        Axis {
            axis_type: Some("date"),
            ..Axis::titled("ds")
        },
        Axis::titled("trend"),
    ));

    if show_weekly {
        let panel = axes.len() + 1;
        data.push(
            Trace {
                kind: "scatter",
                name: Some("weekly".to_string()),
                mode: Some("lines"),
                x: profiles.weekly.iter().map(|(day, _)| day.clone()).collect(),
                y: Some(profiles.weekly.iter().map(|(_, v)| *v).collect()),
                ..Default::default()
            }
            .with_line(FORECAST_COLOR, 2.0)
            .on_panel(panel),
        );
        axes.push((
            Axis {
                axis_type: Some("category"),
                ..Axis::titled("Day of week")
            },
            Axis::titled("weekly"),
        ));
    }

    if show_yearly {
        let panel = axes.len() + 1;
        let days: Vec<NaiveDate> = profiles.yearly.iter().map(|(d, _)| *d).collect();
        data.push(
            Trace::scatter("yearly", "lines", &days, profiles.yearly.iter().map(|(_, v)| *v).collect())
                .with_line(FORECAST_COLOR, 2.0)
                .on_panel(panel),
        );
        axes.push((
            Axis {
                axis_type: Some("date"),
                tickformat: Some("%B %e"),
                ..Axis::titled("Day of year")
            },
            Axis::titled("yearly"),
        ));
    }

    let mut panels = axes.into_iter().enumerate().map(|(i, (mut x, mut y))| {
        let top = 1.0 - i as f64 / count as f64;
        let bottom = 1.0 - (i + 1) as f64 / count as f64;
        let low = if i + 1 == count { 0.0 } else { bottom + PANEL_GAP / 2.0 };
        y.domain = Some([low, top]);
        if i > 0 {
            x.anchor = Some(format!("y{}", i + 1));
            y.anchor = Some(format!("x{}", i + 1));
        }
        (x, y)
    });

    let (xaxis, yaxis) = panels.next().unwrap_or_default();
    let mut layout = Layout::dark("Forecast components", xaxis, yaxis);
    for (i, (x, y)) in panels.enumerate() {
        layout.panels.insert(format!("xaxis{}", i + 2), x);
        layout.panels.insert(format!("yaxis{}", i + 2), y);
    }
    layout.height = Some(PANEL_HEIGHT * count as u32);
    layout.showlegend = false;

    Figure { data, layout }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{
        Forecast, ForecastRow, ForecastTable, Horizon, SeasonalProfiles, TrainingPoint, TrainingSeries,
    };

    fn forecast(weekly: bool, yearly: bool) -> Forecast {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let rows: Vec<ForecastRow> = (0..5)
            .map(|i| {
                let yhat = 10.0 + i as f64;
                ForecastRow {
                    ds: start + chrono::Duration::days(i),
                    trend: yhat,
                    trend_lower: yhat - 0.5,
                    trend_upper: yhat + 0.5,
                    weekly: 0.0,
                    yearly: 0.0,
                    additive_terms: 0.0,
                    yhat_lower: yhat - 1.0,
                    yhat_upper: yhat + 1.0,
                    yhat,
                }
            })
            .collect();

        let profiles = SeasonalProfiles {
            weekly: if weekly {
                vec![("Sunday".to_string(), 0.1), ("Monday".to_string(), -0.1)]
            } else {
                Vec::new()
            },
            yearly: if yearly { vec![(start, 0.2)] } else { Vec::new() },
        };

        Forecast {
            horizon: Horizon::from_years(3),
            training: TrainingSeries::new(vec![
                TrainingPoint { ds: start, y: 9.5 },
                TrainingPoint {
                    ds: start + chrono::Duration::days(1),
                    y: 11.2,
                },
            ]),
            table: ForecastTable {
                rows,
                weekly_enabled: weekly,
                yearly_enabled: yearly,
                interval_width: 0.8,
            },
            profiles,
        }
    }

    #[test]
    fn test_forecast_chart_passes_values_through() {
        let f = forecast(true, false);
        let figure = forecast_chart(&f);

        assert_eq!(figure.layout.title.text, "Forecast plot for 3 years");
        let predicted = figure.data.iter().find(|t| t.name.as_deref() == Some("Predicted")).unwrap();
        assert_eq!(
            predicted.y.as_ref().unwrap(),
            &f.table.rows.iter().map(|r| r.yhat).collect::<Vec<_>>()
        );
        assert_eq!(predicted.line.as_ref().unwrap().color, FORECAST_COLOR);

        let actual = &figure.data[0];
        assert_eq!(actual.mode, Some("markers"));
        assert_eq!(actual.y, Some(vec![9.5, 11.2]));

        let filled: Vec<&Trace> = figure.data.iter().filter(|t| t.fill.is_some()).collect();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].fillcolor.as_deref(), Some(BAND_COLOR));
        assert!(figure.layout.xaxis.rangeslider.is_some());
    }

    #[test]
    fn test_components_panels_follow_enabled_seasonalities() {
        let figure = components_chart(&forecast(true, true));
        assert_eq!(figure.layout.height, Some(900));
        assert!(figure.layout.panels.contains_key("yaxis2"));
        assert!(figure.layout.panels.contains_key("xaxis3"));
        assert_eq!(figure.layout.panels["xaxis3"].anchor.as_deref(), Some("y3"));
        assert_eq!(figure.layout.yaxis.domain.map(|d| d[1]), Some(1.0));
        assert_eq!(figure.layout.panels["yaxis3"].domain.map(|d| d[0]), Some(0.0));

        let trend_only = components_chart(&forecast(false, false));
        assert!(trend_only.layout.panels.is_empty());
        assert_eq!(trend_only.layout.yaxis.domain, Some([0.0, 1.0]));
        assert_eq!(trend_only.data.len(), 3);
    }

    #[test]
    fn test_weekly_panel_uses_day_names() {
        let figure = components_chart(&forecast(true, false));
        let weekly = figure.data.iter().find(|t| t.name.as_deref() == Some("weekly")).unwrap();
        assert_eq!(weekly.x, vec!["Sunday", "Monday"]);
        assert_eq!(weekly.yaxis.as_deref(), Some("y2"));
    }
}
