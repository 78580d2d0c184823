use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DAYS_PER_YEAR: u32 = 365;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ForecastError {
    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("model fit failed: {0}")]
    FitFailure(String),
    #[error("no valid data to fit: {0}")]
    EmptyInput(String),
}

/// Forecast length chosen by the user, in whole years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    pub years: u32,
    pub days: u32,
}

impl Horizon {
    /// Days are `years * 365`; leap days are not accounted for.
    pub fn from_years(years: u32) -> Self {
        Self {
            years,
            days: years * DAYS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingPoint {
    pub ds: NaiveDate,
    pub y: f64,
}

/// `(ds, y)` pairs in ascending date order, every `y` finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSeries {
    pub points: Vec<TrainingPoint>,
}

impl TrainingSeries {
    pub fn new(mut points: Vec<TrainingPoint>) -> Self {
        points.retain(|p| p.y.is_finite());
        points.sort_by_key(|p| p.ds);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.ds)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.ds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub trend: f64,
    pub trend_lower: f64,
    pub trend_upper: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub additive_terms: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub yhat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    pub rows: Vec<ForecastRow>,
    pub weekly_enabled: bool,
    pub yearly_enabled: bool,
    pub interval_width: f64,
}

impl ForecastTable {
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.ds).max()
    }
}

/// Seasonal shapes over one period, for the components chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfiles {
    /// Sunday through Saturday.
    pub weekly: Vec<(String, f64)>,
    /// One value per day of a non-leap reference year.
    pub yearly: Vec<(NaiveDate, f64)>,
}

/// Output of one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub horizon: Horizon,
    pub training: TrainingSeries,
    pub table: ForecastTable,
    pub profiles: SeasonalProfiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_days() {
        assert_eq!(Horizon::from_years(1).days, 365);
        assert_eq!(Horizon::from_years(4).days, 1460);
    }

    #[test]
    fn test_training_series_orders_and_filters() {
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let series = TrainingSeries::new(vec![
            TrainingPoint { ds: d(3), y: 3.0 },
            TrainingPoint { ds: d(1), y: 1.0 },
            TrainingPoint { ds: d(2), y: f64::NAN },
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(d(1)));
        assert_eq!(series.last_date(), Some(d(3)));
    }

    #[test]
    fn test_error_messages() {
        let err = ForecastError::MissingColumns(vec!["Date".into(), "Close".into()]);
        assert_eq!(err.to_string(), "missing columns: Date, Close");
    }
}
