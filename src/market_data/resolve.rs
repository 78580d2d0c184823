use super::types::{parse_date, Cell, ColumnNotFoundError, Field, PriceBar, PriceTable, RawTable, Ticker};
use std::collections::BTreeMap;

/// First column whose label contains `name` (case-sensitive).
///
/// Sources label the same series differently depending on how the request was
/// shaped ("Close", "Close_GOOG", "Price_Ticker_Date"), so lookups go by
/// substring rather than exact match.
pub fn resolve_column<'a>(
    columns: &'a [String],
    name: &str,
) -> Result<(usize, &'a str), ColumnNotFoundError> {
    columns
        .iter()
        .enumerate()
        .find(|(_, label)| label.contains(name))
        .map(|(idx, label)| (idx, label.as_str()))
        .ok_or_else(|| ColumnNotFoundError {
            name: name.to_string(),
            available: columns.to_vec(),
        })
}

// TRUST BOUNDARY:
// Everything downstream of this function works on `PriceBar`s and never looks
// at source column labels again.
/// Map a raw source table onto the fixed daily-bar record.
pub fn normalize(ticker: Ticker, raw: RawTable) -> PriceTable {
    let mut resolved = BTreeMap::new();
    let mut positions = BTreeMap::new();

    for field in Field::ALL {
        match resolve_column(&raw.columns, field.label()) {
            Ok((idx, label)) => {
                resolved.insert(field, label.to_string());
                positions.insert(field, idx);
            }
            Err(e) => {
                tracing::debug!("{}: {}", ticker, e);
            }
        }
    }

    let take = |row: &[Cell], field: Field| -> Cell {
        positions
            .get(&field)
            .and_then(|idx| row.get(*idx))
            .cloned()
            .unwrap_or(Cell::Missing)
    };

    let mut bars: Vec<PriceBar> = raw
        .rows
        .iter()
        .map(|row| PriceBar {
            date: date_of(&take(row, Field::Date)),
            open: take(row, Field::Open),
            high: take(row, Field::High),
            low: take(row, Field::Low),
            close: take(row, Field::Close),
            volume: take(row, Field::Volume),
        })
        .collect();

    // Undated rows sort last; the sort is stable so source order is kept otherwise.
    bars.sort_by_key(|bar| (bar.date.is_none(), bar.date));

    tracing::debug!(
        "Normalized {} rows for {} ({} of {} fields resolved)",
        bars.len(),
        ticker,
        resolved.len(),
        Field::ALL.len()
    );

    PriceTable {
        ticker,
        columns: raw.columns,
        resolved,
        bars,
        fetch_error: None,
    }
}

fn date_of(cell: &Cell) -> Option<chrono::NaiveDate> {
    match cell {
        Cell::Text(text) => parse_date(text),
        _ => None,
    }
}
