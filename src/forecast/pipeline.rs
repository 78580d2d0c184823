use super::model::ForecastModel;
use super::types::{Forecast, ForecastError, Horizon, TrainingPoint, TrainingSeries};
use crate::cleaning::{self, CleanError};
use crate::market_data::{Field, PriceTable};
use chrono::{Duration, NaiveDate};

const TRAINING_FIELDS: [Field; 2] = [Field::Date, Field::Close];

/// Training input: `ds` from the date column, `y` from the close column.
pub fn training_series(table: &PriceTable) -> Result<TrainingSeries, ForecastError> {
    let series = cleaning::prepare(table, &TRAINING_FIELDS).map_err(|e| match e {
        CleanError::MissingColumn(_) => ForecastError::MissingColumns(
            TRAINING_FIELDS
                .iter()
                .filter(|field| table.column(**field).is_err())
                .map(|field| field.label().to_string())
                .collect(),
        ),
        CleanError::NoData(subject) => ForecastError::EmptyInput(subject),
    })?;

    let points = series
        .rows
        .iter()
        .filter_map(|bar| {
            Some(TrainingPoint {
                ds: bar.date?,
                y: bar.close.as_number()?,
            })
        })
        .collect();

    Ok(TrainingSeries::new(points))
}

/// Every historical date plus `periods` consecutive days after the last one.
pub fn future_dates(history: &TrainingSeries, periods: u32) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = history.points.iter().map(|p| p.ds).collect();
    dates.dedup();

    if let Some(last) = history.last_date() {
        dates.extend((1..=i64::from(periods)).map(|d| last + Duration::days(d)));
    }
    dates
}

/// Fit `model` on the training series and predict across history plus the horizon.
pub fn run_forecast(
    training: TrainingSeries,
    horizon: Horizon,
    model: &mut dyn ForecastModel,
) -> Result<Forecast, ForecastError> {
    if training.is_empty() {
        return Err(ForecastError::EmptyInput(
            "no rows with a date and numeric close".to_string(),
        ));
    }

    model.fit(&training)?;
    let dates = future_dates(&training, horizon.days);
    let table = model.predict(&dates)?;
    let profiles = model.profiles()?;

    tracing::debug!(
        "Forecast of {} rows through {:?} ({} training points)",
        table.rows.len(),
        table.last_date(),
        training.len()
    );

    Ok(Forecast {
        horizon,
        training,
        table,
        profiles,
    })
}
