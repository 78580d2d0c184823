use crate::market_data::{Cell, ColumnNotFoundError, Field, PriceBar, PriceTable};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CleanError {
    #[error(transparent)]
    MissingColumn(#[from] ColumnNotFoundError),
    #[error("no valid data for {0}")]
    NoData(String),
}

/// Rows of a price table restricted to what one consumer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSeries {
    pub fields: Vec<Field>,
    pub rows: Vec<PriceBar>,
}

impl CleanSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().filter_map(|bar| bar.date).collect()
    }

    /// Numeric values of `field`; only meaningful after `coerce_numeric`.
    pub fn values(&self, field: Field) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|bar| bar.cell(field).and_then(Cell::as_number))
            .collect()
    }
}

/// Keep only the rows with a value in every `required` field.
pub fn drop_missing(bars: &[PriceBar], required: &[Field]) -> CleanSeries {
    let rows = bars
        .iter()
        .filter(|bar| required.iter().all(|field| !bar.is_missing(*field)))
        .cloned()
        .collect();

    CleanSeries {
        fields: required.to_vec(),
        rows,
    }
}

/// Convert `field` to numbers, dropping rows whose value does not convert.
pub fn coerce_numeric(mut series: CleanSeries, field: Field) -> CleanSeries {
    series.rows.retain_mut(|bar| match bar.cell_mut(field) {
        Some(cell) => match cell.to_numeric() {
            Some(value) => {
                *cell = Cell::Number(value);
                true
            }
            None => false,
        },
        None => true,
    });
    series
}

/// Resolve, drop incomplete rows and coerce every price field in `required`.
pub fn prepare(table: &PriceTable, required: &[Field]) -> Result<CleanSeries, CleanError> {
    if table.is_empty() {
        return Err(CleanError::NoData(no_data_subject(table)));
    }
    table.require(required)?;

    let before = table.len();
    let mut series = drop_missing(&table.bars, required);
    for field in required.iter().filter(|f| **f != Field::Date) {
        series = coerce_numeric(series, *field);
    }

    tracing::debug!(
        "{}: kept {} of {} rows for {:?}",
        table.ticker,
        series.len(),
        before,
        required
    );

    if series.is_empty() {
        return Err(CleanError::NoData(no_data_subject(table)));
    }
    Ok(series)
}

fn no_data_subject(table: &PriceTable) -> String {
    match &table.fetch_error {
        Some(e) => format!("{} ({})", table.ticker, e),
        None => table.ticker.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{normalize, RawTable, Ticker};

    fn bar(day: u32, open: Cell, close: Cell) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2020, 1, day),
            open,
            high: Cell::Missing,
            low: Cell::Missing,
            close,
            volume: Cell::Missing,
        }
    }

    fn sample() -> Vec<PriceBar> {
        vec![
            bar(1, Cell::Number(1.0), Cell::Number(1.5)),
            bar(2, Cell::Missing, Cell::Number(2.5)),
            bar(3, Cell::Number(3.0), Cell::Text("oops".into())),
            bar(4, Cell::Number(4.0), Cell::Text("4.5".into())),
            bar(5, Cell::Number(5.0), Cell::Missing),
        ]
    }

    #[test]
    fn test_drop_missing_never_keeps_incomplete_rows() {
        let bars = sample();
        for required in [
            vec![Field::Date],
            vec![Field::Open],
            vec![Field::Close],
            vec![Field::Date, Field::Open, Field::Close],
            vec![Field::High],
        ] {
            let series = drop_missing(&bars, &required);
            assert!(series.len() <= bars.len());
            for row in &series.rows {
                for field in &required {
                    assert!(!row.is_missing(*field));
                }
            }
        }
        assert_eq!(drop_missing(&bars, &[Field::Open, Field::Close]).len(), 2);
        assert!(drop_missing(&bars, &[Field::High]).is_empty());
    }

    #[test]
    fn test_coerce_numeric_drops_only_unconvertible_rows() {
        let series = drop_missing(&sample(), &[Field::Close]);
        assert_eq!(series.len(), 4);

        let coerced = coerce_numeric(series, Field::Close);
        assert_eq!(coerced.values(Field::Close), vec![1.5, 2.5, 4.5]);
        assert_eq!(
            coerced.dates(),
            vec![
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 4).unwrap(),
            ]
        );
    }

    #[test]
    fn test_coerce_numeric_is_idempotent() {
        let once = coerce_numeric(drop_missing(&sample(), &[Field::Close]), Field::Close);
        let twice = coerce_numeric(once.clone(), Field::Close);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prepare_reports_empty_and_missing_columns() {
        let ticker = Ticker::parse("GOOG").unwrap();
        let empty = PriceTable::failed(ticker.clone(), "timeout");
        assert_eq!(
            prepare(&empty, &[Field::Date, Field::Close]),
            Err(CleanError::NoData("GOOG (timeout)".to_string()))
        );

        let mut raw = RawTable::new(vec!["Date".into(), "Close".into()]);
        raw.push_row(vec![Cell::Text("2020-01-02".into()), Cell::Text("n/a".into())]);
        let table = normalize(ticker, raw);

        assert!(matches!(
            prepare(&table, &[Field::Date, Field::Open]),
            Err(CleanError::MissingColumn(_))
        ));
        assert!(matches!(
            prepare(&table, &[Field::Date, Field::Close]),
            Err(CleanError::NoData(_))
        ));
    }
}
